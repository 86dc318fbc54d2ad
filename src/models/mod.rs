//! # Data Models
//!
//! SeaORM entities for feedback, integrations and sync logs, plus the domain
//! enums stored in their text columns.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod enums;
pub mod feedback;
pub mod integration;
pub mod sync_log;

pub use enums::{FeedbackStatus, Priority, Source, SyncFrequency, SyncStatus, UnknownVariant};
pub use feedback::{Entity as Feedback, FeedbackDraft, NaturalKey};
pub use integration::Entity as Integration;
pub use sync_log::Entity as SyncLog;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "feedback-sync".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
