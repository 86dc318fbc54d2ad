//! Domain enumerations stored as text columns.
//!
//! Every enum round-trips through [`as_str`](Source::as_str) and
//! [`FromStr`], which is how the SeaORM entities persist them.

use std::{fmt, str::FromStr};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Returned when a stored or submitted value is not a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// External system a feedback item or integration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Jira,
    Notion,
    Zoho,
    Manual,
    Zapier,
}

text_enum!(Source, "source", {
    Jira => "jira",
    Notion => "notion",
    Zoho => "zoho",
    Manual => "manual",
    Zapier => "zapier",
});

impl Source {
    /// Sources whose items are pulled by a connector. Zapier pushes and
    /// manual rows are written directly and never scheduled.
    pub const fn is_polling(self) -> bool {
        matches!(self, Source::Jira | Source::Notion | Source::Zoho)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

text_enum!(Priority, "priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    New,
    InProgress,
    Resolved,
    Closed,
}

text_enum!(FeedbackStatus, "feedback status", {
    New => "new",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

/// How often the scheduler should run an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncFrequency {
    Manual,
    Hourly,
    TwiceDaily,
    Daily,
}

text_enum!(SyncFrequency, "sync frequency", {
    Manual => "manual",
    Hourly => "hourly",
    TwiceDaily => "twice_daily",
    Daily => "daily",
});

impl SyncFrequency {
    /// Minimum time between two scheduled runs; `None` means never scheduled.
    pub fn threshold(self) -> Option<Duration> {
        match self {
            SyncFrequency::Manual => None,
            SyncFrequency::Hourly => Some(Duration::hours(1)),
            SyncFrequency::TwiceDaily => Some(Duration::hours(12)),
            SyncFrequency::Daily => Some(Duration::hours(24)),
        }
    }
}

/// Sync log state machine: `running -> {success, error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Running,
    Success,
    Error,
}

text_enum!(SyncStatus, "sync status", {
    Running => "running",
    Success => "success",
    Error => "error",
});
