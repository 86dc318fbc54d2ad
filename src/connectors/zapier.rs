//! Zapier push payloads
//!
//! Zapier delivers pre-shaped feedback in batches to
//! `POST /zapier-sync/{integrationId}`. There is no fetch step: items are
//! mapped here and bulk-upserted by the reconciler on
//! `(integration_id, external_id)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::connectors::ConnectorError;
use crate::connectors::mapping::{non_blank, parse_timestamp};
use crate::models::{FeedbackDraft, Source, integration::Model as Integration};

/// Inbound webhook body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ZapierPayload {
    #[serde(default)]
    pub feedbacks: Vec<ZapierItem>,
}

/// One pre-shaped feedback item
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ZapierItem {
    pub external_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub customer_name: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// RFC 3339 timestamp from the upstream app
    pub created_at: Option<String>,
}

impl ZapierItem {
    pub fn to_draft(&self, integration: &Integration) -> Result<FeedbackDraft, ConnectorError> {
        let title = non_blank(Some(&self.title))
            .ok_or_else(|| ConnectorError::mapping("Zapier item has an empty title"))?;
        let created_at: Option<DateTime<Utc>> =
            self.created_at.as_deref().and_then(parse_timestamp);

        let mut draft = FeedbackDraft::new(integration.owner_id, Source::Zapier, title);
        draft.integration_id = Some(integration.id);
        draft.external_id = non_blank(self.external_id.as_deref());
        draft.description = non_blank(self.description.as_deref());
        draft.customer_name = non_blank(self.customer_name.as_deref());
        draft.tags = self.tags.clone().unwrap_or_default();
        draft.external_created_at = created_at;
        draft.metadata = json!({"zapier_created_at": self.created_at});
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn integration() -> Integration {
        let now = Utc::now().fixed_offset();
        Integration {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            source: "zapier".into(),
            name: "Typeform zap".into(),
            config: json!({}),
            is_active: true,
            sync_frequency: "manual".into(),
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn payload_accepts_minimal_items() {
        let payload: ZapierPayload =
            serde_json::from_str(r#"{"feedbacks":[{"title":"Love it"}]}"#).unwrap();
        let integration = integration();
        let draft = payload.feedbacks[0].to_draft(&integration).unwrap();
        assert_eq!(draft.source, Source::Zapier);
        assert_eq!(draft.integration_id, Some(integration.id));
        assert!(draft.external_id.is_none());
        assert!(draft.status.is_none());
    }

    #[test]
    fn maps_all_fields() {
        let item = ZapierItem {
            external_id: Some(" resp-9 ".into()),
            title: "Checkout bug".into(),
            description: Some("".into()),
            customer_name: Some("Dana".into()),
            tags: Some(vec!["billing".into()]),
            created_at: Some("2024-04-01T12:00:00Z".into()),
        };
        let draft = item.to_draft(&integration()).unwrap();
        assert_eq!(draft.external_id.as_deref(), Some("resp-9"));
        assert!(draft.description.is_none());
        assert_eq!(draft.customer_name.as_deref(), Some("Dana"));
        assert_eq!(draft.tags, vec!["billing".to_string()]);
        assert!(draft.external_created_at.is_some());
    }

    #[test]
    fn blank_title_is_rejected() {
        let item = ZapierItem {
            external_id: None,
            title: "  ".into(),
            description: None,
            customer_name: None,
            tags: None,
            created_at: None,
        };
        assert!(item.to_draft(&integration()).is_err());
    }
}
