//! Usage source trait and fetch error types
//!
//! Defines the interface the polling timer calls once per tick.

use async_trait::async_trait;
use thiserror::Error;

use super::types::UsageSample;

// ============================================================================
// Error Types
// ============================================================================

/// Outcome classes of a failed fetch
///
/// Closed on purpose: the polling timer matches on every variant, so a new
/// kind of failure has to be handled there before it compiles.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Credential invalid or expired (HTTP 401/403)
    #[error("Unauthorized: session cookie expired or invalid")]
    Unauthorized,

    /// Server asked us to back off (HTTP 429)
    #[error("Rate limited by server")]
    RateLimited { retry_after_seconds: Option<u64> },

    /// Connection, timeout, DNS or unexpected HTTP status
    #[error("Network error: {cause}")]
    NetworkFailure { cause: String },

    /// 200 response whose body could not be understood
    #[error("Malformed response: {detail}")]
    MalformedResponse { detail: String },
}

/// How a failure is handled by the retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Not retried at a short interval; surfaced once as an alert
    AuthFailure,
    /// Retried after the server-provided delay; never alerted
    RateLimit,
    /// Retried with exponential backoff; never alerted
    Transient,
}

impl FetchError {
    pub fn network(cause: impl Into<String>) -> Self {
        FetchError::NetworkFailure {
            cause: cause.into(),
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        FetchError::MalformedResponse {
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Unauthorized => FailureKind::AuthFailure,
            FetchError::RateLimited { .. } => FailureKind::RateLimit,
            FetchError::NetworkFailure { .. } | FetchError::MalformedResponse { .. } => {
                FailureKind::Transient
            }
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::network("Request timed out")
        } else if err.is_connect() {
            FetchError::network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            FetchError::malformed(err.to_string())
        } else {
            FetchError::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::malformed(err.to_string())
    }
}

// ============================================================================
// Source Trait
// ============================================================================

/// Anything that can produce a fresh usage sample
///
/// Implementations perform exactly one attempt per call. Retry policy lives
/// entirely in the polling timer.
///
/// # Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
/// use quotabar_core::services::quota::{FetchError, UsageSample, UsageSource};
///
/// struct FixedSource;
///
/// #[async_trait]
/// impl UsageSource for FixedSource {
///     async fn fetch(&self) -> Result<UsageSample, FetchError> {
///         Ok(UsageSample::from_utilization(42.0, 10.0))
///     }
/// }
/// ```
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Fetch current usage
    ///
    /// # Errors
    ///
    /// Returns `FetchError` classified as auth, rate-limit, network or
    /// malformed-response failure.
    async fn fetch(&self) -> Result<UsageSample, FetchError>;

    /// Identifier used in log lines
    fn source_id(&self) -> &'static str {
        "usage"
    }
}

// ============================================================================
// Tests
// ============================================================================
