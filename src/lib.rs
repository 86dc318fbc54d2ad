//! # Feedback Sync Library
//!
//! Pulls customer feedback from Jira, Notion and Zoho Desk, accepts Zapier
//! pushes and manual imports, and reconciles everything into one feedback
//! store. Includes the HTTP surface, the scheduler and the run tracker.

pub mod auth;
pub mod config;
pub mod connectors;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod reconciler;
pub mod repositories;
pub mod scheduler;
pub mod server;
pub mod telemetry;
pub mod tracker;
pub use migration;
