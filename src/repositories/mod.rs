//! # Repository Layer
//!
//! SeaORM-backed data access for feedback, integrations and sync logs.

pub mod feedback;
pub mod integration;
pub mod sync_log;

pub use feedback::{FeedbackFilter, FeedbackRepository, FeedbackStore};
pub use integration::{IntegrationRepository, NewIntegration};
pub use sync_log::SyncLogRepository;
