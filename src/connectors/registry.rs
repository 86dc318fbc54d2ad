//! Connector registry
//!
//! Maps each [`Source`] to its connector. Built once at startup from the
//! application config and passed to the components that need it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::connectors::{
    Connector, JiraConnector, NotionConnector, ProviderMetadata, ZohoDeskConnector,
};
use crate::models::Source;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("source '{source_name}' has no polling connector")]
    NotPolling { source_name: Source },
    #[error("failed to build HTTP client: {details}")]
    HttpClient { details: String },
}

#[derive(Clone, Default)]
pub struct Registry {
    connectors: HashMap<Source, Arc<dyn Connector>>,
    metadata: HashMap<Source, ProviderMetadata>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in source, sharing one HTTP client.
    pub fn from_config(config: &AppConfig) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .user_agent(concat!("feedback-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| RegistryError::HttpClient {
                details: err.to_string(),
            })?;

        let settings = &config.connectors;
        let mut registry = Self::new();
        registry.register(Arc::new(JiraConnector::new(
            http.clone(),
            settings.jira_max_pages,
        )));
        registry.register(Arc::new(NotionConnector::new(
            http.clone(),
            settings.notion_api_base.clone(),
            settings.notion_max_pages,
        )));
        registry.register(Arc::new(ZohoDeskConnector::new(
            http,
            settings.zoho_desk_api_base.clone(),
            settings.zoho_max_pages,
        )));
        registry.register_metadata(ProviderMetadata::push(Source::Zapier));
        registry.register_metadata(ProviderMetadata::import(Source::Manual));
        Ok(registry)
    }

    /// Registers a polling connector under its own source.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        let source = connector.source();
        self.metadata.insert(source, connector.metadata());
        self.connectors.insert(source, connector);
    }

    /// Registers metadata for a source that has no polling connector.
    pub fn register_metadata(&mut self, metadata: ProviderMetadata) {
        self.metadata.insert(metadata.source, metadata);
    }

    pub fn get(&self, source: Source) -> Result<Arc<dyn Connector>, RegistryError> {
        self.connectors
            .get(&source)
            .cloned()
            .ok_or(RegistryError::NotPolling {
                source_name: source,
            })
    }

    /// Metadata for all sources, ordered by source name.
    pub fn list_metadata(&self) -> Vec<ProviderMetadata> {
        let mut metadata: Vec<_> = self.metadata.values().cloned().collect();
        metadata.sort_by_key(|m| m.source.as_str());
        metadata
    }
}
