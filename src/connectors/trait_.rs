//! Connector trait definition
//!
//! Every polling source implements [`Connector`]: an I/O `fetch` that returns
//! raw items and a pure `map_to_feedback` that turns one raw item into the
//! canonical record.

use async_trait::async_trait;
use reqwest::{Response, StatusCode, header::RETRY_AFTER};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connectors::ProviderMetadata;
use crate::error::body_snippet;
use crate::models::{FeedbackDraft, Source, integration::Model as Integration};

/// Connector failures. Everything except [`ConnectorError::Mapping`] aborts
/// the run for the integration.
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    /// Credentials or settings are missing or still placeholders
    #[error("configuration error: {details}")]
    Configuration { details: String },

    /// Non-2xx from the source API
    #[error("{provider} API error: {status} {status_text}{}", fmt_body(.body))]
    Http {
        provider: Source,
        status: u16,
        status_text: String,
        body: Option<String>,
    },

    /// 401/403 from the source API
    #[error("{provider} rejected credentials: {status} {status_text}")]
    Authentication {
        provider: Source,
        status: u16,
        status_text: String,
    },

    /// 429 from the source API
    #[error("{provider} rate limit exceeded{}", fmt_retry_after(.retry_after))]
    RateLimited {
        provider: Source,
        retry_after: Option<u64>,
    },

    /// Connection, TLS or request timeout failures
    #[error("{provider} request failed: {details}")]
    Network {
        provider: Source,
        details: String,
        retryable: bool,
    },

    /// 2xx response that could not be decoded
    #[error("{provider} returned a malformed response: {details}")]
    MalformedResponse { provider: Source, details: String },

    /// One raw item could not be mapped; the item is skipped
    #[error("could not map item: {details}")]
    Mapping { details: String },
}

fn fmt_body(body: &Option<String>) -> String {
    match body.as_deref().map(str::trim) {
        Some(b) if !b.is_empty() => format!(" - {}", body_snippet(b)),
        _ => String::new(),
    }
}

fn fmt_retry_after(retry_after: &Option<u64>) -> String {
    retry_after
        .map(|secs| format!(" (retry after {}s)", secs))
        .unwrap_or_default()
}

impl ConnectorError {
    pub fn configuration(details: impl Into<String>) -> Self {
        Self::Configuration {
            details: details.into(),
        }
    }

    pub fn mapping(details: impl Into<String>) -> Self {
        Self::Mapping {
            details: details.into(),
        }
    }

    pub fn malformed(provider: Source, details: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider,
            details: details.into(),
        }
    }

    pub fn network(provider: Source, err: reqwest::Error) -> Self {
        let retryable = err.is_timeout() || err.is_connect() || err.is_request();
        Self::Network {
            provider,
            details: err.to_string(),
            retryable,
        }
    }

    /// Upstream HTTP status, when the failure came from a response.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } | Self::Authentication { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Network { retryable, .. } => *retryable,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// One item exactly as the source API returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawItem(pub serde_json::Value);

impl RawItem {
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for RawItem {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Fetch and map capability of one polling source.
#[async_trait]
pub trait Connector: Send + Sync {
    fn source(&self) -> Source;

    fn metadata(&self) -> ProviderMetadata;

    /// Checks credentials and settings without touching the network.
    fn validate_config(&self, integration: &Integration) -> Result<(), ConnectorError>;

    /// Fetches raw items changed since `integration.last_synced_at`, in the
    /// order the source returns them.
    async fn fetch(&self, integration: &Integration) -> Result<Vec<RawItem>, ConnectorError>;

    /// Maps one raw item into the canonical record. Must not perform I/O.
    fn map_to_feedback(
        &self,
        raw: &RawItem,
        integration: &Integration,
    ) -> Result<FeedbackDraft, ConnectorError>;
}

/// Turns any non-2xx response into the matching [`ConnectorError`].
pub(crate) async fn ensure_success(
    provider: Source,
    response: Response,
) -> Result<Response, ConnectorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let status_text = status.canonical_reason().unwrap_or("").to_string();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ConnectorError::Authentication {
            provider,
            status: status.as_u16(),
            status_text,
        }),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            Err(ConnectorError::RateLimited {
                provider,
                retry_after,
            })
        }
        _ => {
            let body = response.text().await.ok().filter(|b| !b.is_empty());
            Err(ConnectorError::Http {
                provider,
                status: status.as_u16(),
                status_text,
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_message_includes_status_and_text() {
        let err = ConnectorError::Http {
            provider: Source::Jira,
            status: 500,
            status_text: "Internal Server Error".into(),
            body: Some("{\"errorMessages\":[\"boom\"]}".into()),
        };
        assert_eq!(
            err.to_string(),
            "jira API error: 500 Internal Server Error - {\"errorMessages\":[\"boom\"]}"
        );
        assert!(err.is_retryable());
        assert_eq!(err.upstream_status(), Some(500));
    }

    #[test]
    fn rate_limit_message_mentions_retry_after() {
        let err = ConnectorError::RateLimited {
            provider: Source::Zoho,
            retry_after: Some(30),
        };
        assert_eq!(err.to_string(), "zoho rate limit exceeded (retry after 30s)");
        assert_eq!(err.upstream_status(), Some(429));
    }

    #[test]
    fn configuration_errors_are_not_retryable() {
        let err = ConnectorError::configuration("api_token is missing");
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "configuration error: api_token is missing");
    }

    #[test]
    fn raw_item_is_transparent_json() {
        let raw: RawItem = serde_json::from_str(r#"{"id":"1"}"#).unwrap();
        assert_eq!(raw.as_json()["id"], "1");
    }
}
