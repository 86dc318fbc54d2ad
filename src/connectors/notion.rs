//! Notion connector implementation
//!
//! Queries one Notion database with a bearer integration token, following
//! `has_more` / `next_cursor` until the database is exhausted or the page cap
//! is reached. Pages are requested newest-edit first.
//!
//! Property mapping is by type and key name: the first `title` property is the
//! title, a `rich_text` property (preferably one named like "description") is
//! the description, and `select`/`status` properties whose key contains
//! "priority" or "status" feed those fields. Tags come from a `multi_select`
//! property whose key contains "tag".

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::connectors::mapping::{lookup, non_blank, parse_config, parse_timestamp, require};
use crate::connectors::trait_::ensure_success;
use crate::connectors::{AuthType, Connector, ConnectorError, ProviderMetadata, RawItem};
use crate::models::{
    FeedbackDraft, FeedbackStatus, Priority, Source, integration::Model as Integration,
};

pub const NOTION_VERSION: &str = "2022-06-28";
pub const PAGE_SIZE: u32 = 100;

const UNTITLED: &str = "Untitled";

pub const PRIORITY_TABLE: &[(&str, Priority)] = &[
    ("Low", Priority::Low),
    ("Medium", Priority::Medium),
    ("High", Priority::High),
    ("Urgent", Priority::Critical),
    ("Critical", Priority::Critical),
];

pub const STATUS_TABLE: &[(&str, FeedbackStatus)] = &[
    ("New", FeedbackStatus::New),
    ("Not started", FeedbackStatus::New),
    ("To Do", FeedbackStatus::New),
    ("In progress", FeedbackStatus::InProgress),
    ("In_progress", FeedbackStatus::InProgress),
    ("Done", FeedbackStatus::Resolved),
    ("Resolved", FeedbackStatus::Resolved),
    ("Closed", FeedbackStatus::Closed),
];

/// Settings stored in `Integration.config` for Notion integrations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotionConfig {
    #[serde(default, alias = "api_token")]
    pub api_token: String,
    #[serde(default, alias = "database_id")]
    pub database_id: String,
}

impl NotionConfig {
    fn from_integration(integration: &Integration) -> Result<Self, ConnectorError> {
        let config: NotionConfig = parse_config(integration)?;
        require("apiToken", &config.api_token)?;
        require("databaseId", &config.database_id)?;
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    start_cursor: Option<&'a str>,
    page_size: u32,
    sorts: Value,
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

pub struct NotionConnector {
    http: reqwest::Client,
    api_base: String,
    max_pages: u32,
}

impl NotionConnector {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, max_pages: u32) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            max_pages: max_pages.max(1),
        }
    }

    fn query_url(&self, database_id: &str) -> String {
        format!("{}/v1/databases/{}/query", self.api_base, database_id.trim())
    }

    async fn query_page(
        &self,
        config: &NotionConfig,
        cursor: Option<&str>,
    ) -> Result<QueryPage, ConnectorError> {
        let body = QueryBody {
            start_cursor: cursor,
            page_size: PAGE_SIZE,
            sorts: json!([{"property": "last_edited_time", "direction": "descending"}]),
        };

        let response = self
            .http
            .post(self.query_url(&config.database_id))
            .header(AUTHORIZATION, format!("Bearer {}", config.api_token.trim()))
            .header("Notion-Version", NOTION_VERSION)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|err| ConnectorError::network(Source::Notion, err))?;

        ensure_success(Source::Notion, response)
            .await?
            .json::<QueryPage>()
            .await
            .map_err(|err| ConnectorError::malformed(Source::Notion, err.to_string()))
    }
}

#[async_trait]
impl Connector for NotionConnector {
    fn source(&self) -> Source {
        Source::Notion
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata::polling(Source::Notion, AuthType::Bearer, true)
    }

    fn validate_config(&self, integration: &Integration) -> Result<(), ConnectorError> {
        NotionConfig::from_integration(integration).map(|_| ())
    }

    async fn fetch(&self, integration: &Integration) -> Result<Vec<RawItem>, ConnectorError> {
        let config = NotionConfig::from_integration(integration)?;
        info!(
            integration_id = %integration.id,
            database_id = %config.database_id,
            "Querying Notion database"
        );

        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        for page_index in 0..self.max_pages {
            let page = self.query_page(&config, cursor.as_deref()).await?;
            debug!(
                integration_id = %integration.id,
                page = page_index,
                fetched = page.results.len(),
                has_more = page.has_more,
                "Fetched Notion query page"
            );
            items.extend(page.results.into_iter().map(RawItem));

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                (true, None) => {
                    return Err(ConnectorError::malformed(
                        Source::Notion,
                        "has_more is true but next_cursor is missing",
                    ));
                }
                (false, _) => return Ok(items),
            }
        }

        warn!(
            integration_id = %integration.id,
            max_pages = self.max_pages,
            "Stopped Notion pagination at the page cap"
        );
        Ok(items)
    }

    fn map_to_feedback(
        &self,
        raw: &RawItem,
        integration: &Integration,
    ) -> Result<FeedbackDraft, ConnectorError> {
        let page = raw.as_json();
        let id = page
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ConnectorError::mapping("Notion page has no id"))?;
        let properties = page
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ConnectorError::mapping(format!("Notion page {} has no properties", id))
            })?;

        let title = find_by_type(properties, "title")
            .and_then(|(_, prop)| non_blank(Some(&plain_text(prop, "title"))))
            .unwrap_or_else(|| UNTITLED.to_string());

        let description = properties
            .iter()
            .filter(|(_, prop)| prop_type(prop) == Some("rich_text"))
            .max_by_key(|(key, _)| key.to_lowercase().contains("description"))
            .and_then(|(_, prop)| non_blank(Some(&plain_text(prop, "rich_text"))));

        let priority_name = named_choice(properties, "priority");
        let status_name = named_choice(properties, "status");

        let tags = properties
            .iter()
            .find(|(key, prop)| {
                prop_type(prop) == Some("multi_select") && key.to_lowercase().contains("tag")
            })
            .and_then(|(_, prop)| prop.get("multi_select").and_then(Value::as_array))
            .map(|options| {
                options
                    .iter()
                    .filter_map(|o| o.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut draft = FeedbackDraft::new(integration.owner_id, Source::Notion, title);
        draft.integration_id = Some(integration.id);
        draft.external_id = Some(id.to_string());
        draft.description = description;
        draft.priority = Some(lookup(
            PRIORITY_TABLE,
            priority_name.as_deref(),
            Priority::Medium,
        ));
        draft.status = Some(lookup(
            STATUS_TABLE,
            status_name.as_deref(),
            FeedbackStatus::New,
        ));
        draft.tags = tags;
        draft.external_created_at = page
            .get("created_time")
            .and_then(Value::as_str)
            .and_then(parse_timestamp);
        draft.external_updated_at = page
            .get("last_edited_time")
            .and_then(Value::as_str)
            .and_then(parse_timestamp);
        draft.metadata = json!({
            "notion_page_id": id,
            "notion_url": page.get("url").cloned(),
            "notion_priority": priority_name,
            "notion_status": status_name,
        });

        Ok(draft)
    }
}

fn prop_type(prop: &Value) -> Option<&str> {
    prop.get("type").and_then(Value::as_str)
}

fn find_by_type<'a>(properties: &'a Map<String, Value>, ty: &str) -> Option<(&'a String, &'a Value)> {
    properties.iter().find(|(_, prop)| prop_type(prop) == Some(ty))
}

/// Concatenated `plain_text` of a title or rich_text property.
fn plain_text(prop: &Value, field: &str) -> String {
    prop.get(field)
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("plain_text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Option name of the first select or status property whose key contains
/// `needle`, case-insensitively.
fn named_choice(properties: &Map<String, Value>, needle: &str) -> Option<String> {
    properties
        .iter()
        .filter(|(key, _)| key.to_lowercase().contains(needle))
        .find_map(|(_, prop)| match prop_type(prop) {
            Some(ty @ ("select" | "status")) => prop
                .get(ty)
                .and_then(|choice| choice.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn integration() -> Integration {
        let now = Utc::now().fixed_offset();
        Integration {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            source: "notion".into(),
            name: "Roadmap DB".into(),
            config: json!({"apiToken": "secret_abc", "databaseId": "db1"}),
            is_active: true,
            sync_frequency: "daily".into(),
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn connector() -> NotionConnector {
        NotionConnector::new(reqwest::Client::new(), "https://api.notion.com/", 50)
    }

    fn page() -> Value {
        json!({
            "id": "page-1",
            "created_time": "2024-02-01T09:00:00.000Z",
            "last_edited_time": "2024-02-03T10:30:00.000Z",
            "url": "https://www.notion.so/page-1",
            "properties": {
                "Name": {"type": "title", "title": [
                    {"plain_text": "Export "}, {"plain_text": "is slow"}
                ]},
                "Notes": {"type": "rich_text", "rich_text": [{"plain_text": "side note"}]},
                "Description": {"type": "rich_text", "rich_text": [{"plain_text": "Takes 2 min"}]},
                "Priority Level": {"type": "select", "select": {"name": "High"}},
                "Status": {"type": "status", "status": {"name": "In progress"}},
                "Tags": {"type": "multi_select", "multi_select": [
                    {"name": "perf"}, {"name": "export"}
                ]}
            }
        })
    }

    fn page_with(priority: &str, status: &str) -> RawItem {
        let mut page = page();
        page["properties"]["Priority Level"]["select"]["name"] = json!(priority);
        page["properties"]["Status"]["status"]["name"] = json!(status);
        RawItem(page)
    }

    #[test]
    fn priority_table_is_total() {
        let expected = [
            ("Low", Priority::Low),
            ("Medium", Priority::Medium),
            ("High", Priority::High),
            ("Urgent", Priority::Critical),
            ("Critical", Priority::Critical),
            ("P0", Priority::Medium),
        ];
        let integration = integration();
        for (name, canonical) in expected {
            let draft = connector()
                .map_to_feedback(&page_with(name, "New"), &integration)
                .unwrap();
            assert_eq!(draft.priority, Some(canonical), "priority {name}");
        }
    }

    #[test]
    fn status_table_is_total() {
        let expected = [
            ("New", FeedbackStatus::New),
            ("Not started", FeedbackStatus::New),
            ("To Do", FeedbackStatus::New),
            ("In progress", FeedbackStatus::InProgress),
            ("In_progress", FeedbackStatus::InProgress),
            ("Done", FeedbackStatus::Resolved),
            ("Resolved", FeedbackStatus::Resolved),
            ("Closed", FeedbackStatus::Closed),
            ("Blocked", FeedbackStatus::New),
        ];
        let integration = integration();
        for (name, canonical) in expected {
            let draft = connector()
                .map_to_feedback(&page_with("Low", name), &integration)
                .unwrap();
            assert_eq!(draft.status, Some(canonical), "status {name}");
        }
    }

    #[test]
    fn query_url_trims_trailing_slash() {
        assert_eq!(
            connector().query_url("db1"),
            "https://api.notion.com/v1/databases/db1/query"
        );
    }

    #[test]
    fn maps_page_properties_by_type_and_name() {
        let integration = integration();
        let draft = connector()
            .map_to_feedback(&RawItem(page()), &integration)
            .unwrap();

        assert_eq!(draft.external_id.as_deref(), Some("page-1"));
        assert_eq!(draft.title, "Export is slow");
        assert_eq!(draft.description.as_deref(), Some("Takes 2 min"));
        assert_eq!(draft.priority, Some(Priority::High));
        assert_eq!(draft.status, Some(FeedbackStatus::InProgress));
        assert_eq!(draft.tags, vec!["perf".to_string(), "export".to_string()]);
        assert_eq!(
            draft.external_updated_at,
            Some(Utc.with_ymd_and_hms(2024, 2, 3, 10, 30, 0).unwrap())
        );
        assert_eq!(draft.metadata["notion_priority"], "High");
    }

    #[test]
    fn unmatched_properties_fall_back_to_defaults() {
        let integration = integration();
        let raw = RawItem(json!({
            "id": "page-2",
            "properties": {
                "Urgency": {"type": "select", "select": {"name": "High"}},
                "Title": {"type": "title", "title": []}
            }
        }));
        let draft = connector().map_to_feedback(&raw, &integration).unwrap();
        assert_eq!(draft.title, UNTITLED);
        assert_eq!(draft.priority, Some(Priority::Medium));
        assert_eq!(draft.status, Some(FeedbackStatus::New));
        assert!(draft.tags.is_empty());
        assert!(draft.description.is_none());
    }

    #[test]
    fn page_without_properties_is_a_mapping_error() {
        let raw = RawItem(json!({"id": "page-3"}));
        assert!(matches!(
            connector().map_to_feedback(&raw, &integration()),
            Err(ConnectorError::Mapping { .. })
        ));
    }

    #[test]
    fn missing_database_id_fails_validation() {
        let mut integration = integration();
        integration.config = json!({"apiToken": "secret_abc"});
        let err = connector().validate_config(&integration).unwrap_err();
        assert!(err.to_string().contains("databaseId"));
    }

    #[test]
    fn query_body_omits_cursor_on_first_page() {
        let body = QueryBody {
            start_cursor: None,
            page_size: PAGE_SIZE,
            sorts: json!([]),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("start_cursor").is_none());
        assert_eq!(json["page_size"], 100);
    }
}
