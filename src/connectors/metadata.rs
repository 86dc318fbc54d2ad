//! Source metadata types
//!
//! Describes how each source authenticates and how its items arrive.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Source;

/// Authentication scheme used against the source API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// `Authorization: Basic base64(email:token)`
    Basic,
    /// `Authorization: Bearer <token>`
    Bearer,
    /// OAuth access token in a vendor-specific header
    OAuth2,
    /// Items are pushed to us or imported; no outbound auth
    None,
}

/// How items from a source reach the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Pulled by a connector on schedule or on demand
    Polling,
    /// Pushed by the source through a webhook
    Push,
    /// Uploaded by a user
    Import,
}

/// Metadata about a feedback source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProviderMetadata {
    pub source: Source,
    pub auth_type: AuthType,
    pub delivery: Delivery,
    /// Whether a run follows more than one page of results
    pub paginated: bool,
}

impl ProviderMetadata {
    pub fn polling(source: Source, auth_type: AuthType, paginated: bool) -> Self {
        Self {
            source,
            auth_type,
            delivery: Delivery::Polling,
            paginated,
        }
    }

    pub fn push(source: Source) -> Self {
        Self {
            source,
            auth_type: AuthType::None,
            delivery: Delivery::Push,
            paginated: false,
        }
    }

    pub fn import(source: Source) -> Self {
        Self {
            source,
            auth_type: AuthType::None,
            delivery: Delivery::Import,
            paginated: false,
        }
    }
}
