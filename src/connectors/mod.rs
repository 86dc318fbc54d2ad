//! Connectors module
//!
//! Source connectors and the pieces they share:
//! - The `Connector` trait implemented by every polling source
//! - Source metadata and the registry used for lookup by [`Source`](crate::models::Source)
//! - Jira, Notion and Zoho Desk polling connectors
//! - Zapier push payloads and manual import rows, which bypass `fetch`

pub mod jira;
pub mod manual;
pub mod mapping;
pub mod metadata;
pub mod notion;
pub mod registry;
pub mod trait_;
pub mod zapier;
pub mod zoho_desk;

pub use jira::{JiraConfig, JiraConnector};
pub use manual::ManualImportRow;
pub use metadata::{AuthType, Delivery, ProviderMetadata};
pub use notion::{NotionConfig, NotionConnector};
pub use registry::{Registry, RegistryError};
pub use trait_::{Connector, ConnectorError, RawItem};
pub use zapier::{ZapierItem, ZapierPayload};
pub use zoho_desk::{ZohoDeskConfig, ZohoDeskConnector};
