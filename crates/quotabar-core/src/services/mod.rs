//! Services module

pub mod quota;

pub use quota::{
    project, Alert, AlertEvent, ClaudeUsageClient, FetchError, PollScheduler,
    PollSchedulerConfig, PollSnapshot, SchedulerHandle, StatusTag, ThresholdNotifier,
    UsageSample, UsageSource,
};
