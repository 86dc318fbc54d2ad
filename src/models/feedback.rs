//! Feedback entity model and the canonical record every connector produces.

use chrono::{DateTime, Utc};
use sea_orm::ActiveModelBehavior;
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::enums::{FeedbackStatus, Priority, Source};

/// Stored feedback row
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "feedback")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub owner_id: Uuid,

    /// Identifier in the source system; `None` for manual entries
    pub external_id: Option<String>,

    pub source: String,

    /// Weak reference to the integration that produced the row
    pub integration_id: Option<Uuid>,

    pub title: String,

    pub description: Option<String>,

    pub priority: Option<String>,

    pub status: Option<String>,

    /// JSON array of strings, compared as a set
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: JsonValue,

    /// Source-specific raw fields kept for audit
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: JsonValue,

    /// Enrichment output `{sentiment, summary, tags}`; `None` until analyzed
    #[sea_orm(column_type = "JsonBinary")]
    pub analysis: Option<JsonValue>,

    pub customer_name: Option<String>,

    pub interviewee_name: Option<String>,

    pub conversation_at: Option<DateTimeWithTimeZone>,

    pub external_created_at: Option<DateTimeWithTimeZone>,

    pub external_updated_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Identity used to decide between insert and update.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub source: Source,
    pub owner_id: Uuid,
    pub integration_id: Option<Uuid>,
    pub external_id: String,
}

/// Canonical feedback record before persistence.
///
/// Connectors build these from raw source items; the reconciler turns them
/// into inserts or full-overwrite updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackDraft {
    pub owner_id: Uuid,
    pub source: Source,
    pub integration_id: Option<Uuid>,
    pub external_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    /// `None` leaves the stored status untouched; new rows default to `new`
    pub status: Option<FeedbackStatus>,
    pub tags: Vec<String>,
    pub metadata: JsonValue,
    pub customer_name: Option<String>,
    pub interviewee_name: Option<String>,
    pub conversation_at: Option<DateTime<Utc>>,
    pub external_created_at: Option<DateTime<Utc>>,
    pub external_updated_at: Option<DateTime<Utc>>,
}

impl FeedbackDraft {
    /// Minimal draft for `source`; callers fill in the rest.
    pub fn new(owner_id: Uuid, source: Source, title: impl Into<String>) -> Self {
        Self {
            owner_id,
            source,
            integration_id: None,
            external_id: None,
            title: title.into(),
            description: None,
            priority: None,
            status: None,
            tags: Vec::new(),
            metadata: JsonValue::Object(Default::default()),
            customer_name: None,
            interviewee_name: None,
            conversation_at: None,
            external_created_at: None,
            external_updated_at: None,
        }
    }

    pub fn natural_key(&self) -> Option<NaturalKey> {
        self.external_id.as_ref().map(|external_id| NaturalKey {
            source: self.source,
            owner_id: self.owner_id,
            integration_id: self.integration_id,
            external_id: external_id.clone(),
        })
    }

    /// Active model for a brand new row.
    pub fn to_new_active_model(&self, now: DateTime<Utc>) -> ActiveModel {
        let now = now.fixed_offset();
        let mut active = ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(self.owner_id),
            source: Set(self.source.as_str().to_string()),
            integration_id: Set(self.integration_id),
            external_id: Set(self.external_id.clone()),
            status: Set(Some(
                self.status.unwrap_or(FeedbackStatus::New).as_str().to_string(),
            )),
            analysis: Set(None),
            created_at: Set(now),
            ..Default::default()
        };
        self.write_mapped_fields(&mut active, now);
        active
    }

    /// Overwrites every mapped field of an existing row. Fields the source
    /// cleared are cleared here too.
    pub fn apply_to(&self, active: &mut ActiveModel, now: DateTime<Utc>) {
        active.owner_id = Set(self.owner_id);
        active.integration_id = Set(self.integration_id);
        if let Some(status) = self.status {
            active.status = Set(Some(status.as_str().to_string()));
        }
        self.write_mapped_fields(active, now.fixed_offset());
    }

    fn write_mapped_fields(&self, active: &mut ActiveModel, now: DateTimeWithTimeZone) {
        active.title = Set(self.title.clone());
        active.description = Set(self.description.clone());
        active.priority = Set(self.priority.map(|p| p.as_str().to_string()));
        active.tags = Set(JsonValue::from(normalize_tags(&self.tags)));
        active.metadata = Set(self.metadata.clone());
        active.customer_name = Set(self.customer_name.clone());
        active.interviewee_name = Set(self.interviewee_name.clone());
        active.conversation_at = Set(self.conversation_at.map(|t| t.fixed_offset()));
        active.external_created_at = Set(self.external_created_at.map(|t| t.fixed_offset()));
        active.external_updated_at = Set(self.external_updated_at.map(|t| t.fixed_offset()));
        active.updated_at = Set(now);
    }
}

/// Trims, drops blanks and duplicates, and sorts so tag sets compare equal
/// regardless of source order.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut out: Vec<String> = tags
        .iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::ActiveValue;

    #[test]
    fn normalize_tags_is_order_insensitive() {
        assert_eq!(
            normalize_tags(&[" ui", "bug", "", "bug"]),
            vec!["bug".to_string(), "ui".to_string()]
        );
        assert_eq!(normalize_tags(&["b", "a"]), normalize_tags(&["a", "b"]));
    }

    #[test]
    fn natural_key_requires_external_id() {
        let owner = Uuid::new_v4();
        let mut draft = FeedbackDraft::new(owner, Source::Manual, "Call notes");
        assert!(draft.natural_key().is_none());

        draft.external_id = Some("PROJ-1".into());
        let key = draft.natural_key().unwrap();
        assert_eq!(key.external_id, "PROJ-1");
        assert_eq!(key.owner_id, owner);
    }

    #[test]
    fn new_rows_default_to_new_status() {
        let draft = FeedbackDraft::new(Uuid::new_v4(), Source::Zapier, "Hi");
        let active = draft.to_new_active_model(Utc::now());
        assert_eq!(active.status, ActiveValue::Set(Some("new".to_string())));
        assert_eq!(active.analysis, ActiveValue::Set(None));
    }

    #[test]
    fn apply_clears_priority_but_keeps_status_when_unset() {
        let mut draft = FeedbackDraft::new(Uuid::new_v4(), Source::Jira, "Bug");
        draft.priority = Some(Priority::High);
        let mut active = draft.to_new_active_model(Utc::now());

        draft.priority = None;
        draft.status = None;
        draft.apply_to(&mut active, Utc::now());

        assert_eq!(active.priority, ActiveValue::Set(None));
        assert_eq!(active.status, ActiveValue::Set(Some("new".to_string())));
    }
}
