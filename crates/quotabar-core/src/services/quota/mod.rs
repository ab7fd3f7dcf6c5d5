//! Claude usage monitoring
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ PollScheduler (timer)                                   │
//! │   - fetch on every tick, backoff on failure             │
//! │   - publishes PollSnapshot, emits Alert                 │
//! └─────────────────────────────────────────────────────────┘
//!          │                    │                    │
//!          ▼                    ▼                    ▼
//! ┌──────────────┐   ┌───────────────────┐   ┌──────────────┐
//! │ UsageSource  │   │ ThresholdNotifier │   │ project()    │
//! │  (provider)  │   │  edge-triggered   │   │  status ->   │
//! │              │   │  alert events     │   │  descriptor  │
//! └──────────────┘   └───────────────────┘   └──────────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │ ClaudeUsageClient│
//! │ GET /usage       │
//! └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use quotabar_core::config::AppConfig;
//! use quotabar_core::services::quota::{ClaudeUsageClient, PollScheduler, PollSchedulerConfig};
//!
//! let config = AppConfig::load(&path)?;
//! let client = ClaudeUsageClient::from_config(&config)?;
//! let (handle, mut alerts, join) =
//!     PollScheduler::spawn(Arc::new(client), PollSchedulerConfig::from_app_config(&config));
//!
//! while let Some(alert) = alerts.recv().await {
//!     println!("{}", alert.title());
//! }
//! ```

pub mod claude;
pub mod notifier;
pub mod projector;
pub mod provider;
pub mod timer;
pub mod types;

// Re-export main types
pub use types::{
    Alert, AlertEvent, ColorClass, PresentationDescriptor, StatusTag, UsageLevel, UsageSample,
    UsageWindow, UsageWindowKind,
};

// Re-export source trait and error
pub use provider::{FailureKind, FetchError, UsageSource};

// Re-export client
pub use claude::{ClaudeUsageClient, Credential};

pub use notifier::{crossed_thresholds, ThresholdNotifier, ThresholdState, DEFAULT_THRESHOLDS};
pub use projector::project;

// Re-export timer types
pub use timer::{
    AlertReceiver, PollMachine, PollScheduler, PollSchedulerConfig, PollSnapshot, PollState,
    SchedulerHandle, AUTH_RETRY_SECS, DEFAULT_BASE_INTERVAL_SECS, MAX_BACKOFF_SECS,
    MAX_RETRY_AFTER_SECS, RATE_LIMIT_DEFAULT_SECS,
};
