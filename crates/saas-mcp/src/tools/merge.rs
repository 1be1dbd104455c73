//! Merge CRM MCP tools
//!
//! CRM tools for one Merge linked account: accounts, contacts and
//! opportunities. Write payloads are wrapped in Merge's `{"model": ...}`
//! envelope by the client.

use crate::clients::config::MergeConfig;
use crate::clients::merge::{
    Account, Contact, ContactInput, MergeClient, Opportunity, OpportunityInput, OpportunityStatus,
    CONTACT_SCAN_PAGE_SIZE,
};
use crate::clients::UpstreamError;
use crate::gateway::GatewayError;
use crate::integration::Integration;
use crate::server::{parse_args, McpServerError, McpServerResult, Tool, ToolContext};
use crate::types::{ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Page size cap for list tools.
const MAX_PAGE: u32 = 100;

/// Tool to list CRM accounts.
pub struct GetAccountsTool {
    client: Arc<MergeClient>,
}

#[async_trait]
impl Tool for GetAccountsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_crm_accounts", "List accounts (companies) in the CRM")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_PAGE,
                        "description": "Maximum number of accounts to return",
                        "default": 10
                    },
                    "cursor": {
                        "type": "string",
                        "description": "Pagination cursor from a previous call"
                    }
                },
                "required": []
            }))
    }

    #[instrument(skip(self, args, context), fields(tool = "get_crm_accounts", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: PageParams = parse_args(args)?;
        let page = self
            .client
            .list_accounts(params.limit.clamp(1, MAX_PAGE), params.cursor.as_deref())
            .await?;

        if page.results.is_empty() {
            return Ok(ToolResult::text("No accounts found."));
        }

        let mut text = format!("Found {} accounts:\n", page.results.len());
        for account in &page.results {
            text.push('\n');
            text.push_str(&account_entry(account));
        }
        push_cursor(&mut text, page.next.as_deref());
        Ok(ToolResult::text(text))
    }
}

#[derive(Debug, Deserialize)]
struct PageParams {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    cursor: Option<String>,
}

fn default_limit() -> u32 {
    10
}

/// Tool to find contacts by name or email.
pub struct SearchContactsTool {
    client: Arc<MergeClient>,
}

#[async_trait]
impl Tool for SearchContactsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "search_crm_contacts",
            "Search CRM contacts by name or email. Best-effort: only the first 100 contacts \
             are fetched and matched locally by case-insensitive substring on first name, \
             last name and email address.",
        )
        .with_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to look for; empty matches every contact"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_PAGE,
                    "description": "Maximum number of contacts to return",
                    "default": 10
                }
            },
            "required": ["query"]
        }))
    }

    #[instrument(skip(self, args, context), fields(tool = "search_crm_contacts", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: SearchParams = parse_args(args)?;
        let page = self.client.list_contacts(CONTACT_SCAN_PAGE_SIZE).await?;

        let needle = params.query.trim().to_lowercase();
        let matches: Vec<&Contact> = page
            .results
            .iter()
            .filter(|contact| contact.matches(&needle))
            .take(params.limit.clamp(1, MAX_PAGE) as usize)
            .collect();
        debug!(
            scanned = page.results.len(),
            matched = matches.len(),
            "Filtered CRM contacts"
        );

        if matches.is_empty() {
            return Ok(ToolResult::text(format!(
                "No contacts found matching '{}'",
                params.query
            )));
        }

        let mut text = format!(
            "Found {} contacts matching '{}':\n",
            matches.len(),
            params.query
        );
        for contact in matches {
            text.push('\n');
            text.push_str(&contact_entry(contact));
        }
        Ok(ToolResult::text(text))
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default = "default_limit")]
    limit: u32,
}

/// Tool to create a contact.
pub struct CreateContactTool {
    client: Arc<MergeClient>,
}

#[async_trait]
impl Tool for CreateContactTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("create_crm_contact", "Create a new contact in the CRM")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "first_name": {
                        "type": "string",
                        "description": "First name"
                    },
                    "last_name": {
                        "type": "string",
                        "description": "Last name"
                    },
                    "email_addresses": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "email_address": {"type": "string"},
                                "email_address_type": {
                                    "type": "string",
                                    "enum": ["WORK", "PERSONAL", "OTHER"]
                                }
                            },
                            "required": ["email_address"]
                        },
                        "description": "Email addresses"
                    },
                    "phone_numbers": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "phone_number": {"type": "string"},
                                "phone_number_type": {
                                    "type": "string",
                                    "enum": ["HOME", "WORK", "MOBILE", "SKYPE", "OTHER"]
                                }
                            },
                            "required": ["phone_number"]
                        },
                        "description": "Phone numbers"
                    },
                    "account": {
                        "type": "string",
                        "description": "ID of the account the contact belongs to"
                    }
                },
                "required": []
            }))
    }

    #[instrument(skip(self, args, context), fields(tool = "create_crm_contact", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let input: ContactInput = parse_args(args)?;
        let contact = self.client.create_contact(&input).await?;
        info!(id = %contact.id, "Created CRM contact");

        let mut text = format!("Created contact: {}\nID: {}", contact.display_name(), contact.id);
        if let Some(email) = contact.emails().next() {
            text.push_str(&format!("\nEmail: {}", email));
        }
        if let Some(account) = &contact.account {
            text.push_str(&format!("\nAccount: {}", account));
        }
        Ok(ToolResult::text(text))
    }
}

/// Tool to create an opportunity.
pub struct CreateOpportunityTool {
    client: Arc<MergeClient>,
}

#[async_trait]
impl Tool for CreateOpportunityTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "create_crm_opportunity",
            "Create a new opportunity (deal) in the CRM. A `contact` argument is accepted \
             but not sent: Merge links opportunities to contacts only through their account.",
        )
        .with_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Opportunity name"
                },
                "description": {
                    "type": "string",
                    "description": "Opportunity description"
                },
                "amount": {
                    "type": "integer",
                    "description": "Deal value"
                },
                "account": {
                    "type": "string",
                    "description": "ID of the associated account"
                },
                "owner": {
                    "type": "string",
                    "description": "ID of the owning user"
                },
                "stage": {
                    "type": "string",
                    "description": "ID of the pipeline stage"
                },
                "status": {
                    "type": "string",
                    "enum": ["OPEN", "WON", "LOST"],
                    "description": "Opportunity status",
                    "default": "OPEN"
                },
                "close_date": {
                    "type": "string",
                    "description": "Expected close date (ISO 8601)"
                },
                "contact": {
                    "type": "string",
                    "description": "Contact ID; accepted for compatibility and ignored"
                }
            },
            "required": ["name"]
        }))
    }

    #[instrument(skip(self, args, context), fields(tool = "create_crm_opportunity", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: CreateOpportunityParams = parse_args(args)?;
        if params.model.name.trim().is_empty() {
            return Err(McpServerError::InvalidParams("name must not be empty".to_string()));
        }
        if params.contact.is_some() {
            debug!("Ignoring 'contact': opportunities are linked through their account");
        }

        let opportunity = self.client.create_opportunity(&params.model).await?;
        info!(id = %opportunity.id, "Created CRM opportunity");

        let mut text = format!(
            "Created opportunity: {}\nID: {}",
            opportunity.name.as_deref().unwrap_or(&params.model.name),
            opportunity.id
        );
        let status = opportunity
            .status
            .as_deref()
            .unwrap_or_else(|| params.model.status.as_str());
        text.push_str(&format!("\nStatus: {}", status));
        if let Some(amount) = opportunity.amount.or(params.model.amount) {
            text.push_str(&format!("\nAmount: {}", amount));
        }
        Ok(ToolResult::text(text))
    }
}

#[derive(Debug, Deserialize)]
struct CreateOpportunityParams {
    #[serde(flatten)]
    model: OpportunityInput,
    #[serde(default)]
    contact: Option<String>,
}

/// Tool to list opportunities.
pub struct ListOpportunitiesTool {
    client: Arc<MergeClient>,
}

#[async_trait]
impl Tool for ListOpportunitiesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("list_crm_opportunities", "List opportunities (deals) in the CRM")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_PAGE,
                        "description": "Maximum number of opportunities to return",
                        "default": 10
                    },
                    "cursor": {
                        "type": "string",
                        "description": "Pagination cursor from a previous call"
                    },
                    "status": {
                        "type": "string",
                        "enum": ["OPEN", "WON", "LOST"],
                        "description": "Only return opportunities with this status"
                    }
                },
                "required": []
            }))
    }

    #[instrument(skip(self, args, context), fields(tool = "list_crm_opportunities", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: ListOpportunitiesParams = parse_args(args)?;
        let page = self
            .client
            .list_opportunities(
                params.limit.clamp(1, MAX_PAGE),
                params.cursor.as_deref(),
                params.status,
            )
            .await?;

        if page.results.is_empty() {
            return Ok(ToolResult::text("No opportunities found."));
        }

        let mut text = format!("Found {} opportunities:\n", page.results.len());
        for opportunity in &page.results {
            text.push('\n');
            text.push_str(&opportunity_entry(opportunity));
        }
        push_cursor(&mut text, page.next.as_deref());
        Ok(ToolResult::text(text))
    }
}

#[derive(Debug, Deserialize)]
struct ListOpportunitiesParams {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    status: Option<OpportunityStatus>,
}

fn account_entry(account: &Account) -> String {
    let mut entry = format!(
        "{} (ID: {})",
        account.name.as_deref().unwrap_or("(unnamed)"),
        account.id
    );
    if let Some(industry) = &account.industry {
        entry.push_str(&format!("\n  Industry: {}", industry));
    }
    if let Some(website) = &account.website {
        entry.push_str(&format!("\n  Website: {}", website));
    }
    if let Some(employees) = account.number_of_employees {
        entry.push_str(&format!("\n  Employees: {}", employees));
    }
    entry
}

fn contact_entry(contact: &Contact) -> String {
    let mut entry = format!("{} (ID: {})", contact.display_name(), contact.id);
    let emails: Vec<&str> = contact.emails().collect();
    if !emails.is_empty() {
        entry.push_str(&format!("\n  Email: {}", emails.join(", ")));
    }
    let phones: Vec<&str> = contact.phones().collect();
    if !phones.is_empty() {
        entry.push_str(&format!("\n  Phone: {}", phones.join(", ")));
    }
    entry
}

fn opportunity_entry(opportunity: &Opportunity) -> String {
    let mut entry = format!(
        "{} (ID: {})",
        opportunity.name.as_deref().unwrap_or("(unnamed)"),
        opportunity.id
    );
    if let Some(status) = &opportunity.status {
        entry.push_str(&format!("\n  Status: {}", status));
    }
    if let Some(amount) = opportunity.amount {
        entry.push_str(&format!("\n  Amount: {}", amount));
    }
    if let Some(close_date) = &opportunity.close_date {
        entry.push_str(&format!("\n  Close date: {}", close_date));
    }
    entry
}

fn push_cursor(text: &mut String, cursor: Option<&str>) {
    if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
        text.push_str(&format!("\n\nMore results available (cursor: {})", cursor));
    }
}

/// Get all Merge CRM tools.
pub fn merge_tools(client: Arc<MergeClient>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(GetAccountsTool { client: Arc::clone(&client) }),
        Arc::new(SearchContactsTool { client: Arc::clone(&client) }),
        Arc::new(CreateContactTool { client: Arc::clone(&client) }),
        Arc::new(CreateOpportunityTool { client: Arc::clone(&client) }),
        Arc::new(ListOpportunitiesTool { client }),
    ]
}

/// The Merge CRM gateway integration.
pub struct MergeIntegration {
    client: Arc<MergeClient>,
}

impl MergeIntegration {
    /// Build the integration from explicit configuration.
    pub fn new(config: &MergeConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: Arc::new(MergeClient::new(config)?),
        })
    }
}

#[async_trait]
impl Integration for MergeIntegration {
    const SERVICE: &'static str = "merge-mcp-server";
    const DEFAULT_PORT: u16 = 8002;

    fn from_env() -> Result<Self, GatewayError> {
        let config = MergeConfig::from_env()?;
        info!(
            api_url = %config.api_url,
            api_key = %config.api_key.masked(),
            account_token = %config.account_token.masked(),
            "Loaded Merge configuration"
        );
        Self::new(&config).map_err(GatewayError::Setup)
    }

    fn description(&self) -> &'static str {
        "Merge unified CRM tools over MCP"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        merge_tools(Arc::clone(&self.client))
    }

    async fn probe(&self) -> Result<Map<String, Value>, UpstreamError> {
        let details = self.client.account_details().await?;

        let mut fields = Map::new();
        fields.insert(
            "integration".to_string(),
            details.integration.map(Value::from).unwrap_or(Value::Null),
        );
        fields.insert(
            "account_id".to_string(),
            details.id.map(Value::from).unwrap_or(Value::Null),
        );
        fields.insert(
            "organization".to_string(),
            details
                .end_user_organization_name
                .map(Value::from)
                .unwrap_or(Value::Null),
        );
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::config::Secret;

    fn client() -> Arc<MergeClient> {
        Arc::new(
            MergeClient::new(&MergeConfig {
                api_url: "http://localhost:3000".to_string(),
                api_key: Secret::new("merge-key"),
                account_token: Secret::new("acct-token"),
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_merge_tools_count() {
        assert_eq!(merge_tools(client()).len(), 5, "Expected 5 Merge tools");
    }

    #[test]
    fn test_search_description_states_limitation() {
        let def = SearchContactsTool { client: client() }.definition();
        assert!(def.description.contains("first 100"));
        assert_eq!(def.input_schema["required"], serde_json::json!(["query"]));
    }

    #[test]
    fn test_opportunity_params_accept_and_ignore_contact() {
        let params: CreateOpportunityParams = parse_args(serde_json::json!({
            "name": "Acme renewal",
            "amount": 5000,
            "contact": "c_123"
        }))
        .unwrap();
        assert_eq!(params.model.name, "Acme renewal");
        assert_eq!(params.model.status, OpportunityStatus::Open);
        assert_eq!(params.contact.as_deref(), Some("c_123"));

        let payload = serde_json::to_value(&params.model).unwrap();
        assert!(payload.get("contact").is_none());
    }

    #[test]
    fn test_opportunity_description_states_contact_is_ignored() {
        let def = CreateOpportunityTool { client: client() }.definition();
        assert!(def.description.contains("`contact`"));
        assert!(def.description.contains("not sent"));
        assert!(def.input_schema["properties"]["contact"].is_object());
        assert_eq!(def.input_schema["required"], serde_json::json!(["name"]));
    }

    #[test]
    fn test_opportunity_status_enum() {
        let bad: McpServerResult<CreateOpportunityParams> =
            parse_args(serde_json::json!({"name": "x", "status": "PENDING"}));
        assert!(matches!(bad, Err(McpServerError::InvalidParams(_))));
    }

    #[test]
    fn test_push_cursor_skips_empty() {
        let mut text = String::from("Found 1 accounts:");
        push_cursor(&mut text, Some(""));
        assert_eq!(text, "Found 1 accounts:");

        push_cursor(&mut text, Some("cD0yMDIx"));
        assert!(text.ends_with("More results available (cursor: cD0yMDIx)"));
    }

    #[test]
    fn test_opportunity_entry() {
        let opportunity: Opportunity = serde_json::from_value(serde_json::json!({
            "id": "o1",
            "name": "Acme renewal",
            "status": "OPEN",
            "amount": 5000,
            "remote_data": null
        }))
        .unwrap();
        assert_eq!(
            opportunity_entry(&opportunity),
            "Acme renewal (ID: o1)\n  Status: OPEN\n  Amount: 5000"
        );
    }
}
