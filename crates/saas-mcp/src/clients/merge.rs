//! Merge unified CRM service client.

use super::config::MergeConfig;
use super::upstream::{UpstreamClient, UpstreamError};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Page size used when fetching contacts for local filtering.
pub const CONTACT_SCAN_PAGE_SIZE: u32 = 100;

/// Merge CRM service client.
#[derive(Debug, Clone)]
pub struct MergeClient {
    /// Authenticated upstream client.
    upstream: UpstreamClient,
}

impl MergeClient {
    /// Create a new Merge CRM client.
    pub fn new(config: &MergeConfig) -> Result<Self, UpstreamError> {
        let upstream = UpstreamClient::builder("Merge", config.api_url.clone())
            .bearer(&config.api_key)
            .secret_header("x-account-token", &config.account_token)
            .build()?;

        Ok(Self { upstream })
    }

    /// Linked account details; doubles as the connectivity probe.
    #[instrument(skip(self))]
    pub async fn account_details(&self) -> Result<AccountDetails, UpstreamError> {
        let value = self.upstream.get("/account-details", &[]).await?;
        self.upstream.decode(value)
    }

    /// One page of CRM accounts.
    #[instrument(skip(self))]
    pub async fn list_accounts(
        &self,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<Paginated<Account>, UpstreamError> {
        let value = self
            .upstream
            .get("/accounts", &page_query(page_size, cursor))
            .await?;
        self.upstream.decode(value)
    }

    /// One page of contacts.
    #[instrument(skip(self))]
    pub async fn list_contacts(&self, page_size: u32) -> Result<Paginated<Contact>, UpstreamError> {
        let value = self
            .upstream
            .get("/contacts", &page_query(page_size, None))
            .await?;
        self.upstream.decode(value)
    }

    /// Create a contact.
    #[instrument(skip(self, contact))]
    pub async fn create_contact(&self, contact: &ContactInput) -> Result<Contact, UpstreamError> {
        debug!("Creating CRM contact");
        let value = self
            .upstream
            .post("/contacts", &ModelEnvelope { model: contact })
            .await?;
        let created: ModelEnvelope<Contact> = self.upstream.decode(value)?;
        Ok(created.model)
    }

    /// Create an opportunity.
    #[instrument(skip(self, opportunity), fields(name = %opportunity.name))]
    pub async fn create_opportunity(
        &self,
        opportunity: &OpportunityInput,
    ) -> Result<Opportunity, UpstreamError> {
        debug!("Creating CRM opportunity");
        let value = self
            .upstream
            .post("/opportunities", &ModelEnvelope { model: opportunity })
            .await?;
        let created: ModelEnvelope<Opportunity> = self.upstream.decode(value)?;
        Ok(created.model)
    }

    /// One page of opportunities, optionally filtered by status.
    #[instrument(skip(self))]
    pub async fn list_opportunities(
        &self,
        page_size: u32,
        cursor: Option<&str>,
        status: Option<OpportunityStatus>,
    ) -> Result<Paginated<Opportunity>, UpstreamError> {
        let mut query = page_query(page_size, cursor);
        if let Some(status) = status {
            query.push(("status", status.as_str().to_string()));
        }

        let value = self.upstream.get("/opportunities", &query).await?;
        self.upstream.decode(value)
    }
}

fn page_query(page_size: u32, cursor: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = vec![("page_size", page_size.to_string())];
    if let Some(cursor) = cursor {
        query.push(("cursor", cursor.to_string()));
    }
    query
}

/// Merge wraps write payloads and results in `{"model": ...}`.
#[derive(Debug, Serialize, Deserialize)]
struct ModelEnvelope<T> {
    model: T,
}

/// Cursor-paginated list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Cursor for the next page.
    #[serde(default)]
    pub next: Option<String>,

    /// Page entries.
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// `/account-details` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDetails {
    /// Linked account ID.
    #[serde(default)]
    pub id: Option<String>,

    /// Integration display name (e.g. "HubSpot").
    #[serde(default)]
    pub integration: Option<String>,

    /// End-user organization name.
    #[serde(default)]
    pub end_user_organization_name: Option<String>,
}

/// A CRM account (company).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Merge ID.
    pub id: String,

    /// Company name.
    #[serde(default)]
    pub name: Option<String>,

    /// Industry.
    #[serde(default)]
    pub industry: Option<String>,

    /// Website.
    #[serde(default)]
    pub website: Option<String>,

    /// Headcount.
    #[serde(default)]
    pub number_of_employees: Option<u64>,
}

/// Email address kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EmailAddressType {
    Work,
    Personal,
    Other,
}

/// Phone number kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PhoneNumberType {
    Home,
    Work,
    Mobile,
    Skype,
    Other,
}

/// A contact email address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Address; Merge allows null here.
    #[serde(default)]
    pub email_address: Option<String>,

    /// Kind; upstream data may carry values outside the enum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address_type: Option<String>,
}

/// A contact phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneNumber {
    /// Number; may be null.
    #[serde(default)]
    pub phone_number: Option<String>,

    /// Kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number_type: Option<String>,
}

/// A CRM contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Merge ID.
    pub id: String,

    /// First name.
    #[serde(default)]
    pub first_name: Option<String>,

    /// Last name.
    #[serde(default)]
    pub last_name: Option<String>,

    /// Account ID.
    #[serde(default)]
    pub account: Option<String>,

    /// Email addresses.
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,

    /// Phone numbers.
    #[serde(default)]
    pub phone_numbers: Vec<PhoneNumber>,
}

impl Contact {
    /// "First Last", or "(no name)" when both are blank.
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            "(no name)".to_string()
        } else {
            name
        }
    }

    /// Case-insensitive substring match on names and email addresses.
    ///
    /// `needle` must already be lowercase. An empty needle matches.
    pub fn matches(&self, needle: &str) -> bool {
        let hit = |field: &str| field.to_lowercase().contains(needle);
        self.first_name.as_deref().is_some_and(hit)
            || self.last_name.as_deref().is_some_and(hit)
            || self.emails().any(hit)
            || needle.is_empty()
    }

    /// Non-null email addresses.
    pub fn emails(&self) -> impl Iterator<Item = &str> {
        self.email_addresses
            .iter()
            .filter_map(|email| email.email_address.as_deref())
    }

    /// Non-null phone numbers.
    pub fn phones(&self) -> impl Iterator<Item = &str> {
        self.phone_numbers
            .iter()
            .filter_map(|phone| phone.phone_number.as_deref())
    }
}

/// Contact creation payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInput {
    /// First name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    /// Last name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    /// Email addresses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<EmailAddressInput>,

    /// Phone numbers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phone_numbers: Vec<PhoneNumberInput>,

    /// Account ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

/// Email address on a contact creation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAddressInput {
    /// Address.
    pub email_address: String,

    /// Kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address_type: Option<EmailAddressType>,
}

/// Phone number on a contact creation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneNumberInput {
    /// Number.
    pub phone_number: String,

    /// Kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number_type: Option<PhoneNumberType>,
}

/// Opportunity status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpportunityStatus {
    #[default]
    Open,
    Won,
    Lost,
}

impl OpportunityStatus {
    /// Wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityStatus::Open => "OPEN",
            OpportunityStatus::Won => "WON",
            OpportunityStatus::Lost => "LOST",
        }
    }
}

/// A CRM opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    /// Merge ID.
    pub id: String,

    /// Name.
    #[serde(default)]
    pub name: Option<String>,

    /// Description.
    #[serde(default)]
    pub description: Option<String>,

    /// Amount.
    #[serde(default)]
    pub amount: Option<i64>,

    /// Account ID.
    #[serde(default)]
    pub account: Option<String>,

    /// Stage ID.
    #[serde(default)]
    pub stage: Option<String>,

    /// Status as reported upstream.
    #[serde(default)]
    pub status: Option<String>,

    /// Expected close date.
    #[serde(default)]
    pub close_date: Option<String>,
}

/// Opportunity creation payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpportunityInput {
    /// Name.
    pub name: String,

    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,

    /// Account ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    /// Owner user ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Stage ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    /// Status.
    #[serde(default)]
    pub status: OpportunityStatus,

    /// Expected close date (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(first: &str, last: &str, email: &str) -> Contact {
        Contact {
            id: "c1".to_string(),
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            account: None,
            email_addresses: vec![EmailAddress {
                email_address: Some(email.to_string()),
                email_address_type: Some("WORK".to_string()),
            }],
            phone_numbers: Vec::new(),
        }
    }

    #[test]
    fn test_contact_matching() {
        let alice = contact("Alice", "Smith", "alice@acme.io");
        assert!(alice.matches("alice"));
        assert!(alice.matches("smi"));
        assert!(alice.matches("acme.io"));
        assert!(alice.matches(""));
        assert!(!alice.matches("bob"));
    }

    #[test]
    fn test_contact_with_null_address() {
        let bob: Contact = serde_json::from_value(serde_json::json!({
            "id": "c-bob",
            "first_name": "Bob",
            "email_addresses": [{"email_address": null, "email_address_type": "WORK"}],
            "phone_numbers": [{"phone_number": null}, {"phone_number": "+1555"}]
        }))
        .unwrap();
        assert_eq!(bob.emails().count(), 0);
        assert_eq!(bob.phones().collect::<Vec<_>>(), vec!["+1555"]);
        assert!(bob.matches("bob"));
        assert!(!bob.matches("alice"));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(contact("Alice", "Smith", "a@x").display_name(), "Alice Smith");

        let mut nameless = contact("", "", "a@x");
        nameless.first_name = None;
        assert_eq!(nameless.display_name(), "(no name)");
    }

    #[test]
    fn test_opportunity_payload_defaults_status() {
        let input = OpportunityInput {
            name: "Big deal".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(ModelEnvelope { model: &input }).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"model": {"name": "Big deal", "status": "OPEN"}})
        );
    }

    #[test]
    fn test_contact_payload_enums() {
        let input: ContactInput = serde_json::from_value(serde_json::json!({
            "first_name": "Alice",
            "email_addresses": [{"email_address": "alice@acme.io", "email_address_type": "WORK"}],
            "phone_numbers": [{"phone_number": "+1555", "phone_number_type": "MOBILE"}]
        }))
        .unwrap();
        assert_eq!(
            input.phone_numbers[0].phone_number_type,
            Some(PhoneNumberType::Mobile)
        );

        let bad: Result<ContactInput, _> = serde_json::from_value(serde_json::json!({
            "email_addresses": [{"email_address": "a@x", "email_address_type": "BUSINESS"}]
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_paginated_tolerates_missing_fields() {
        let page: Paginated<Opportunity> =
            serde_json::from_value(serde_json::json!({"results": []})).unwrap();
        assert!(page.next.is_none());
        assert!(page.results.is_empty());
    }
}
