//! # quotabar-core
//!
//! Core logic of the Claude usage monitor, shared by the CLI and any tray
//! front end.
//!
//! This crate provides:
//! - Usage fetching, polling, alerts and status projection (`services::quota`)
//! - Application configuration (`config` module)
//! - Unified error handling (`error` module)
//! - Time formatting helpers (`utils` module)

pub mod config;
pub mod error;
pub mod services;
pub mod utils;

// Re-exports for convenience
pub use config::AppConfig;
pub use error::{Error, Result};

// Re-export commonly used types from services
pub use services::{
    project, Alert, AlertEvent, ClaudeUsageClient, FetchError, PollScheduler,
    PollSchedulerConfig, PollSnapshot, SchedulerHandle, StatusTag, ThresholdNotifier,
    UsageSample, UsageSource,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}
