//! Generic authenticated HTTP client bound to one upstream API.
//!
//! Performs exactly one attempt per call: no retries and no timeout beyond
//! the transport default. Successful responses come back as raw JSON; each
//! integration client decodes only the fields it needs.

use super::config::Secret;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// User agent sent with every upstream request.
pub const USER_AGENT: &str = concat!("saas-mcp/", env!("CARGO_PKG_VERSION"));

/// Upstream call failures.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream answered with a non-success status (or an explicit
    /// rejection inside a 2xx body).
    #[error("{service} API error ({status}): {body}")]
    Api {
        /// Upstream name.
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The request never produced a response.
    #[error("{service} request failed: {source}")]
    Transport {
        /// Upstream name.
        service: &'static str,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// A 2xx response could not be decoded.
    #[error("Invalid {service} response: {message}")]
    InvalidResponse {
        /// Upstream name.
        service: &'static str,
        /// Decoding error.
        message: String,
    },

    /// The client could not be constructed.
    #[error("{service} client setup failed: {message}")]
    Setup {
        /// Upstream name.
        service: &'static str,
        /// Error message.
        message: String,
    },
}

impl UpstreamError {
    /// HTTP status carried by an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure happened below the HTTP layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, UpstreamError::Transport { .. })
    }
}

/// Builder collecting the auth headers for an [`UpstreamClient`].
pub struct UpstreamClientBuilder {
    service: &'static str,
    base_url: String,
    headers: Vec<(&'static str, String, bool)>,
}

impl UpstreamClientBuilder {
    /// Attach `Authorization: Bearer <token>`.
    pub fn bearer(mut self, token: &Secret) -> Self {
        self.headers
            .push(("authorization", format!("Bearer {}", token.expose()), true));
        self
    }

    /// Attach a credential-bearing header.
    pub fn secret_header(mut self, name: &'static str, value: &Secret) -> Self {
        self.headers.push((name, value.expose().to_string(), true));
        self
    }

    /// Attach a plain header.
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into(), false));
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<UpstreamClient, UpstreamError> {
        let service = self.service;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        for (name, value, sensitive) in self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| UpstreamError::Setup {
                service,
                message: format!("invalid header name '{}'", name),
            })?;
            let mut value = HeaderValue::from_str(&value).map_err(|_| UpstreamError::Setup {
                service,
                message: format!("invalid value for header '{}'", name),
            })?;
            value.set_sensitive(sensitive);
            headers.insert(name, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| UpstreamError::Setup {
                service,
                message: e.to_string(),
            })?;

        Ok(UpstreamClient {
            client,
            service,
            base_url: self.base_url,
        })
    }
}

/// HTTP client bound to one upstream API.
#[derive(Clone)]
pub struct UpstreamClient {
    /// HTTP client instance with auth headers preinstalled.
    client: Client,

    /// Upstream name used in errors and logs.
    service: &'static str,

    /// Base URL for every request.
    base_url: String,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("service", &self.service)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl UpstreamClient {
    /// Start building a client for `service` rooted at `base_url`.
    pub fn builder(service: &'static str, base_url: impl Into<String>) -> UpstreamClientBuilder {
        UpstreamClientBuilder {
            service,
            base_url: base_url.into(),
            headers: Vec::new(),
        }
    }

    /// Upstream name.
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Build a full URL by appending a path to the base URL.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// `GET path?query`.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, UpstreamError> {
        self.send::<Value>(Method::GET, path, query, None).await
    }

    /// `POST path` with a JSON body.
    pub async fn post<B>(&self, path: &str, body: &B) -> Result<Value, UpstreamError>
    where
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    /// Issue one request and normalize the outcome.
    #[instrument(skip(self, query, body), fields(service = self.service))]
    pub async fn send<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Value, UpstreamError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        debug!(%method, %url, "Sending upstream request");

        let mut request = self.client.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|source| UpstreamError::Transport {
            service: self.service,
            source,
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| UpstreamError::Transport {
            service: self.service,
            source,
        })?;

        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                "{} API returned non-success status", self.service
            );
            return Err(UpstreamError::Api {
                service: self.service,
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| UpstreamError::InvalidResponse {
            service: self.service,
            message: e.to_string(),
        })
    }

    /// Decode a raw response into a typed view; unknown fields are ignored.
    pub fn decode<T>(&self, value: Value) -> Result<T, UpstreamError>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(value).map_err(|e| UpstreamError::InvalidResponse {
            service: self.service,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> UpstreamClient {
        UpstreamClient::builder("Example", base_url)
            .bearer(&Secret::new("token-123"))
            .secret_header("x-account-token", &Secret::new("acct-456"))
            .header("x-api-version", "2024-01-01")
            .build()
            .unwrap()
    }

    #[test]
    fn test_url_joining() {
        let client = client("https://api.example.com/");
        assert_eq!(client.url("/v1/items"), "https://api.example.com/v1/items");
        assert_eq!(client.url("v1/items"), "https://api.example.com/v1/items");
    }

    #[test]
    fn test_invalid_header_value_is_setup_error() {
        let result = UpstreamClient::builder("Example", "http://localhost")
            .bearer(&Secret::new("bad\ntoken"))
            .build();
        assert!(matches!(result, Err(UpstreamError::Setup { .. })));
    }

    #[test]
    fn test_debug_hides_credentials() {
        let client = client("http://localhost");
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("token-123"));
        assert!(!rendered.contains("acct-456"));
    }

    #[tokio::test]
    async fn test_get_attaches_headers_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("limit", "5"))
            .and(header("authorization", "Bearer token-123"))
            .and(header("x-account-token", "acct-456"))
            .and(header("x-api-version", "2024-01-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [1, 2, 3],
                "unexpected": "ignored by callers"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(&server.uri())
            .get("/items", &[("limit", "5".to_string())])
            .await
            .unwrap();
        assert_eq!(value["items"], serde_json::json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/items"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({"name": "widget"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 9})))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(&server.uri())
            .post("/items", &serde_json::json!({"name": "widget"}))
            .await
            .unwrap();
        assert_eq!(value["id"], 9);
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"message":"Not Found"}"#))
            .mount(&server)
            .await;

        let err = client(&server.uri()).get("/missing", &[]).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_transport());
        let message = err.to_string();
        assert!(message.contains("404"));
        assert!(message.contains("Not Found"));
    }

    #[tokio::test]
    async fn test_empty_success_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/noop"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let value = client(&server.uri())
            .post("/noop", &serde_json::json!({}))
            .await
            .unwrap();
        assert!(value.is_null());
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).get("/html", &[]).await.unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let err = client("http://127.0.0.1:9").get("/", &[]).await.unwrap_err();
        assert!(err.is_transport());
    }
}
