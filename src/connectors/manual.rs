//! Manual import rows
//!
//! Rows parsed client-side (typically from CSV) are stamped `source = manual`,
//! `status = new` and always inserted as new records.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::connectors::ConnectorError;
use crate::connectors::mapping::{non_blank, parse_timestamp};
use crate::models::{FeedbackDraft, FeedbackStatus, Source};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ManualImportRow {
    pub title: String,
    pub description: Option<String>,
    pub customer_name: Option<String>,
    pub interviewee_name: Option<String>,
    /// RFC 3339 or `YYYY-MM-DD HH:MM:SS`
    pub conversation_at: Option<String>,
}

impl ManualImportRow {
    pub fn to_draft(
        &self,
        owner_id: Uuid,
        integration_id: Option<Uuid>,
    ) -> Result<FeedbackDraft, ConnectorError> {
        let title = non_blank(Some(&self.title))
            .ok_or_else(|| ConnectorError::mapping("import row has an empty title"))?;
        let conversation_at = match non_blank(self.conversation_at.as_deref()) {
            Some(raw) => Some(parse_timestamp(&raw).ok_or_else(|| {
                ConnectorError::mapping(format!("conversation_at '{}' is not a timestamp", raw))
            })?),
            None => None,
        };

        let mut draft = FeedbackDraft::new(owner_id, Source::Manual, title);
        draft.integration_id = integration_id;
        draft.status = Some(FeedbackStatus::New);
        draft.description = non_blank(self.description.as_deref());
        draft.customer_name = non_blank(self.customer_name.as_deref());
        draft.interviewee_name = non_blank(self.interviewee_name.as_deref());
        draft.conversation_at = conversation_at;
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(title: &str, conversation_at: Option<&str>) -> ManualImportRow {
        ManualImportRow {
            title: title.into(),
            description: Some("Notes from call".into()),
            customer_name: Some("Acme".into()),
            interviewee_name: Some(" ".into()),
            conversation_at: conversation_at.map(str::to_string),
        }
    }

    #[test]
    fn stamps_manual_source_and_new_status() {
        let owner = Uuid::new_v4();
        let draft = row("Wants SSO", Some("2024-06-01 14:00:00"))
            .to_draft(owner, None)
            .unwrap();
        assert_eq!(draft.source, Source::Manual);
        assert_eq!(draft.status, Some(FeedbackStatus::New));
        assert_eq!(draft.owner_id, owner);
        assert!(draft.external_id.is_none());
        assert!(draft.interviewee_name.is_none());
        assert!(draft.conversation_at.is_some());
    }

    #[test]
    fn rejects_blank_title_and_bad_dates() {
        assert!(row("", None).to_draft(Uuid::new_v4(), None).is_err());
        let err = row("x", Some("last tuesday"))
            .to_draft(Uuid::new_v4(), None)
            .unwrap_err();
        assert!(err.to_string().contains("last tuesday"));
    }
}
