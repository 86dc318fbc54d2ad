//! Zoho Desk connector implementation
//!
//! Lists tickets of one department with an OAuth access token and the
//! `orgId` header, sorted by modification time. A single page of 100 tickets
//! is fetched unless `ZOHO_MAX_PAGES` raises the cap, in which case later
//! pages are requested with `from`.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use crate::connectors::mapping::{lookup, non_blank, parse_config, parse_timestamp, require};
use crate::connectors::trait_::ensure_success;
use crate::connectors::{AuthType, Connector, ConnectorError, ProviderMetadata, RawItem};
use crate::models::{
    FeedbackDraft, FeedbackStatus, Priority, Source, integration::Model as Integration,
};

pub const PAGE_LIMIT: u64 = 100;

pub const PRIORITY_TABLE: &[(&str, Priority)] = &[
    ("Low", Priority::Low),
    ("Medium", Priority::Medium),
    ("High", Priority::High),
    ("Urgent", Priority::Critical),
    ("Critical", Priority::Critical),
];

pub const STATUS_TABLE: &[(&str, FeedbackStatus)] = &[
    ("Open", FeedbackStatus::New),
    ("In Progress", FeedbackStatus::InProgress),
    ("On Hold", FeedbackStatus::InProgress),
    ("Closed", FeedbackStatus::Closed),
    ("Resolved", FeedbackStatus::Resolved),
];

/// Settings stored in `Integration.config` for Zoho Desk integrations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZohoDeskConfig {
    #[serde(default, alias = "access_token")]
    pub access_token: String,
    #[serde(default, alias = "org_id")]
    pub org_id: String,
    #[serde(default, alias = "department_id")]
    pub department_id: String,
}

impl ZohoDeskConfig {
    fn from_integration(integration: &Integration) -> Result<Self, ConnectorError> {
        let config: ZohoDeskConfig = parse_config(integration)?;
        require("accessToken", &config.access_token)?;
        require("orgId", &config.org_id)?;
        require("departmentId", &config.department_id)?;
        Ok(config)
    }
}

#[derive(Debug, Default, Deserialize)]
struct TicketPage {
    #[serde(default)]
    data: Vec<Value>,
}

pub struct ZohoDeskConnector {
    http: reqwest::Client,
    api_base: String,
    max_pages: u32,
}

impl ZohoDeskConnector {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, max_pages: u32) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            max_pages: max_pages.max(1),
        }
    }

    fn tickets_url(&self, config: &ZohoDeskConfig, from: Option<u64>) -> Result<Url, ConnectorError> {
        let mut url = Url::parse(&format!("{}/api/v1/tickets", self.api_base)).map_err(|err| {
            ConnectorError::configuration(format!("Zoho Desk API base is invalid: {}", err))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("departmentId", config.department_id.trim());
            query.append_pair("sortBy", "modifiedTime");
            query.append_pair("limit", &PAGE_LIMIT.to_string());
            if let Some(from) = from {
                query.append_pair("from", &from.to_string());
            }
        }
        Ok(url)
    }

    async fn fetch_page(
        &self,
        config: &ZohoDeskConfig,
        from: Option<u64>,
    ) -> Result<TicketPage, ConnectorError> {
        let response = self
            .http
            .get(self.tickets_url(config, from)?)
            .header(
                AUTHORIZATION,
                format!("Zoho-oauthtoken {}", config.access_token.trim()),
            )
            .header("orgId", config.org_id.trim())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| ConnectorError::network(Source::Zoho, err))?;

        let response = ensure_success(Source::Zoho, response).await?;
        // No tickets in the department
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(TicketPage::default());
        }
        response
            .json::<TicketPage>()
            .await
            .map_err(|err| ConnectorError::malformed(Source::Zoho, err.to_string()))
    }
}

#[async_trait]
impl Connector for ZohoDeskConnector {
    fn source(&self) -> Source {
        Source::Zoho
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata::polling(Source::Zoho, AuthType::OAuth2, self.max_pages > 1)
    }

    fn validate_config(&self, integration: &Integration) -> Result<(), ConnectorError> {
        ZohoDeskConfig::from_integration(integration).map(|_| ())
    }

    async fn fetch(&self, integration: &Integration) -> Result<Vec<RawItem>, ConnectorError> {
        let config = ZohoDeskConfig::from_integration(integration)?;
        info!(
            integration_id = %integration.id,
            department_id = %config.department_id,
            "Listing Zoho Desk tickets"
        );

        let mut items = Vec::new();
        let mut offset: u64 = 0;
        for page_index in 0..self.max_pages {
            let page = self
                .fetch_page(&config, (page_index > 0).then_some(offset))
                .await?;
            let fetched = page.data.len() as u64;
            items.extend(page.data.into_iter().map(RawItem));
            offset += fetched;

            debug!(
                integration_id = %integration.id,
                page = page_index,
                fetched,
                "Fetched Zoho Desk ticket page"
            );

            if fetched < PAGE_LIMIT {
                break;
            }
        }

        Ok(items)
    }

    fn map_to_feedback(
        &self,
        raw: &RawItem,
        integration: &Integration,
    ) -> Result<FeedbackDraft, ConnectorError> {
        let ticket = raw.as_json();
        let id = match ticket.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(ConnectorError::mapping("Zoho Desk ticket has no id")),
        };
        let title = non_blank(ticket.get("subject").and_then(Value::as_str)).ok_or_else(|| {
            ConnectorError::mapping(format!("Zoho Desk ticket {} has no subject", id))
        })?;

        let priority_name = ticket.get("priority").and_then(Value::as_str);
        let status_name = ticket.get("status").and_then(Value::as_str);

        let mut draft = FeedbackDraft::new(integration.owner_id, Source::Zoho, title);
        draft.integration_id = Some(integration.id);
        draft.external_id = Some(id.clone());
        draft.description = non_blank(ticket.get("description").and_then(Value::as_str));
        draft.priority = priority_name.map(|p| lookup(PRIORITY_TABLE, Some(p), Priority::Medium));
        draft.status = Some(lookup(STATUS_TABLE, status_name, FeedbackStatus::New));
        draft.customer_name = ticket.get("contact").and_then(contact_name);
        draft.external_created_at = ticket
            .get("createdTime")
            .and_then(Value::as_str)
            .and_then(parse_timestamp);
        draft.external_updated_at = ticket
            .get("modifiedTime")
            .and_then(Value::as_str)
            .and_then(parse_timestamp);
        draft.metadata = json!({
            "zoho_ticket_id": id,
            "ticket_number": ticket.get("ticketNumber").cloned(),
            "zoho_priority": priority_name,
            "zoho_status": status_name,
            "channel": ticket.get("channel").cloned(),
            "web_url": ticket.get("webUrl").cloned(),
        });

        Ok(draft)
    }
}

/// "First Last" when both parts are present, otherwise whichever one is.
fn contact_name(contact: &Value) -> Option<String> {
    let part = |key: &str| non_blank(contact.get(key).and_then(Value::as_str));
    match (part("firstName"), part("lastName")) {
        (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
        (first, last) => first.or(last),
    }
}
