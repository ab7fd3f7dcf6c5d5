//! Claude.ai usage client
//!
//! Implements the UsageSource trait against the claude.ai organization usage
//! endpoint.
//!
//! # Overview
//!
//! One call to [`UsageSource::fetch`] performs exactly one
//! `GET <base>/organizations/{org_id}/usage` request, bounded by a timeout,
//! and classifies the outcome:
//!
//! | Response                         | Outcome                          |
//! |----------------------------------|----------------------------------|
//! | 200 with a JSON object           | `Ok(UsageSample)`                |
//! | 200 with anything else           | `MalformedResponse`              |
//! | 401 / 403                        | `Unauthorized`                   |
//! | 429                              | `RateLimited { Retry-After }`    |
//! | other status, connect, timeout   | `NetworkFailure`                 |
//!
//! # Quota Windows
//!
//! The payload carries independent optional windows. Only `five_hour` and
//! `seven_day` are read; `seven_day_oauth_apps`, `seven_day_opus` and
//! `seven_day_sonnet` are ignored. A window that is `null` or absent counts
//! as 0% with no reset time.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, COOKIE, RETRY_AFTER, USER_AGENT};
use reqwest::Client;
use serde_json::Value;

use super::provider::{FetchError, UsageSource};
use super::types::{UsageSample, UsageWindow, UsageWindowKind};
use crate::config::AppConfig;
use crate::utils::truncate_for_log;

// ============================================================================
// Constants
// ============================================================================

/// Default claude.ai API base
pub const DEFAULT_API_BASE_URL: &str = "https://claude.ai/api";

/// Default HTTP request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Browser-like user agent; the web API rejects obvious bots
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Max characters of a response body written to the debug log
const LOG_BODY_CHARS: usize = 200;

// ============================================================================
// Credentials
// ============================================================================

/// How requests are authenticated
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// `sessionKey` cookie copied from a browser session
    SessionCookie(String),
    /// Bearer token sent in the Authorization header
    Bearer(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::SessionCookie(_) => write!(f, "SessionCookie(****)"),
            Credential::Bearer(_) => write!(f, "Bearer(****)"),
        }
    }
}

impl Credential {
    /// Pick the credential from config; a non-blank bearer token wins over
    /// the cookie
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let token = config.access_token.as_deref().map(str::trim).unwrap_or_default();
        if !token.is_empty() {
            return Some(Credential::Bearer(token.to_string()));
        }
        let cookie = config.session_cookie.trim();
        if !cookie.is_empty() {
            return Some(Credential::SessionCookie(cookie.to_string()));
        }
        None
    }
}

// ============================================================================
// ClaudeUsageClient
// ============================================================================

/// Usage client for claude.ai
pub struct ClaudeUsageClient {
    /// HTTP client with the request timeout applied
    client: Client,

    /// API base, without trailing slash
    base_url: String,

    /// Organization whose usage is read
    organization_id: String,

    credential: Credential,
}

impl ClaudeUsageClient {
    /// Create a client against the default API base
    pub fn new(organization_id: impl Into<String>, credential: Credential) -> Self {
        Self::with_settings(
            DEFAULT_API_BASE_URL,
            organization_id,
            credential,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Create a client with an explicit base URL and timeout
    pub fn with_settings(
        base_url: impl Into<String>,
        organization_id: impl Into<String>,
        credential: Credential,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            organization_id: organization_id.into(),
            credential,
        }
    }

    /// Build a client from the application config
    pub fn from_config(config: &AppConfig) -> crate::Result<Self> {
        let organization_id = config.organization_id.trim();
        if organization_id.is_empty() {
            return Err(crate::Error::config("organization_id is not set"));
        }
        let credential = Credential::from_config(config).ok_or_else(|| {
            crate::Error::config("neither session_cookie nor access_token is set")
        })?;

        Ok(Self::with_settings(
            config.api_base_url.clone(),
            organization_id,
            credential,
            Duration::from_secs(config.request_timeout_seconds),
        ))
    }

    /// Full URL of the usage endpoint
    pub fn usage_url(&self) -> String {
        format!(
            "{}/organizations/{}/usage",
            self.base_url, self.organization_id
        )
    }

    async fn call_usage_api(&self) -> Result<UsageSample, FetchError> {
        let url = self.usage_url();
        log::debug!("[quota:client] Fetching usage from {}", url);

        let request = self
            .client
            .get(&url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, "application/json")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9");

        let request = match &self.credential {
            Credential::SessionCookie(cookie) => {
                request.header(COOKIE, format!("sessionKey={}", cookie))
            }
            Credential::Bearer(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
        };

        let response = request.send().await.map_err(|e| {
            log::warn!("[quota:client] Request failed: {}", e);
            FetchError::from(e)
        })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        log::debug!("[quota:client] API response status: {}", status);

        let body = response.text().await?;
        log::debug!(
            "[quota:client] API response body: {}",
            truncate_for_log(&body, LOG_BODY_CHARS)
        );

        classify_response(status, retry_after.as_deref(), &body, Utc::now())
    }
}

// ============================================================================
// Response classification
// ============================================================================

/// Map an HTTP status, Retry-After header and body to a fetch outcome
pub fn classify_response(
    status: u16,
    retry_after: Option<&str>,
    body: &str,
    fetched_at: DateTime<Utc>,
) -> Result<UsageSample, FetchError> {
    match status {
        401 | 403 => {
            log::warn!("[quota:client] Authentication failed: HTTP {}", status);
            Err(FetchError::Unauthorized)
        }
        429 => {
            let retry_after_seconds = retry_after.and_then(parse_retry_after);
            log::warn!(
                "[quota:client] Rate limited, retry after {:?}s",
                retry_after_seconds
            );
            Err(FetchError::RateLimited {
                retry_after_seconds,
            })
        }
        200..=299 => parse_usage_body(body, fetched_at),
        _ => {
            log::error!(
                "[quota:client] API error: HTTP {} - {}",
                status,
                truncate_for_log(body, LOG_BODY_CHARS)
            );
            Err(FetchError::network(format!("HTTP {}", status)))
        }
    }
}

/// Parse a Retry-After header given in delta-seconds
///
/// HTTP-date values are not supported and yield `None`.
pub fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

/// Parse a usage payload into a sample
///
/// Only structurally broken JSON or a non-object top level is rejected. Every
/// window degrades independently: absent, `null` or non-object windows count
/// as 0%, and a non-numeric utilization inside a present window counts as 0%.
pub fn parse_usage_body(body: &str, fetched_at: DateTime<Utc>) -> Result<UsageSample, FetchError> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        log::error!("[quota:client] Failed to parse API response: {}", e);
        FetchError::from(e)
    })?;

    let object = value.as_object().ok_or_else(|| {
        log::error!("[quota:client] API response is not a JSON object");
        FetchError::malformed("top-level value is not an object")
    })?;

    let five_hour = parse_window(object.get(UsageWindowKind::FiveHour.api_key()), UsageWindowKind::FiveHour);
    let weekly = parse_window(object.get(UsageWindowKind::Weekly.api_key()), UsageWindowKind::Weekly);

    log::info!(
        "[quota:client] Usage fetched: 5-hour {:.1}%, weekly {:.1}%",
        five_hour.utilization,
        weekly.utilization
    );

    Ok(UsageSample::new(five_hour, weekly, fetched_at))
}

fn parse_window(value: Option<&Value>, kind: UsageWindowKind) -> UsageWindow {
    let Some(window) = value.and_then(Value::as_object) else {
        if matches!(value, Some(v) if !v.is_null()) {
            log::warn!("[quota:client] Window {} is not an object, treating as 0%", kind.api_key());
        }
        return UsageWindow::missing();
    };

    let utilization = match window.get("utilization").and_then(Value::as_f64) {
        Some(u) => u,
        None => {
            log::warn!(
                "[quota:client] Window {} has no numeric utilization, treating as 0%",
                kind.api_key()
            );
            0.0
        }
    };

    let resets_at = window
        .get("resets_at")
        .and_then(Value::as_str)
        .and_then(|raw| match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(_) => {
                log::warn!("[quota:client] Failed to parse resets_at: {}", raw);
                None
            }
        });

    UsageWindow::new(utilization, resets_at)
}

// ============================================================================
// UsageSource Implementation
// ============================================================================

#[async_trait]
impl UsageSource for ClaudeUsageClient {
    async fn fetch(&self) -> Result<UsageSample, FetchError> {
        self.call_usage_api().await
    }

    fn source_id(&self) -> &'static str {
        "claude"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 1, 5, 0, 0).unwrap()
    }

    const SAMPLE_BODY: &str = r#"{
        "five_hour": {
            "utilization": 47.0,
            "resets_at": "2025-12-01T07:00:00.171939+00:00"
        },
        "seven_day": {
            "utilization": 25.0,
            "resets_at": "2025-12-02T00:00:00.171962+00:00"
        },
        "seven_day_oauth_apps": {"utilization": 0.0, "resets_at": null},
        "seven_day_opus": null,
        "seven_day_sonnet": {"utilization": 1.0, "resets_at": "2025-12-02T04:00:00+00:00"},
        "iguana_necktie": null,
        "extra_usage": null
    }"#;

    // =========================================================================
    // Body parsing
    // =========================================================================

    #[test]
    fn test_parse_usage_response() {
        let sample = parse_usage_body(SAMPLE_BODY, fetched_at()).unwrap();

        assert_eq!(sample.five_hour.utilization, 47.0);
        assert_eq!(sample.weekly.utilization, 25.0);
        assert_eq!(
            sample.five_hour.resets_at,
            Some(Utc.with_ymd_and_hms(2025, 12, 1, 7, 0, 0).unwrap() + chrono::Duration::microseconds(171939))
        );
        assert!(sample.weekly.resets_at.is_some());
        assert_eq!(sample.fetched_at, fetched_at());
    }

    #[test]
    fn test_parse_clamps_out_of_range() {
        let body = r#"{"five_hour": {"utilization": 130.5}, "seven_day": {"utilization": -4}}"#;
        let sample = parse_usage_body(body, fetched_at()).unwrap();
        assert_eq!(sample.five_hour.utilization, 100.0);
        assert_eq!(sample.weekly.utilization, 0.0);
    }

    #[test]
    fn test_parse_missing_windows_are_zero() {
        let sample = parse_usage_body(r#"{"five_hour": null}"#, fetched_at()).unwrap();
        assert_eq!(sample.five_hour, UsageWindow::missing());
        assert_eq!(sample.weekly, UsageWindow::missing());
        assert_eq!(sample.max_utilization(), 0.0);
    }

    #[test]
    fn test_parse_non_numeric_utilization() {
        let body = r#"{"five_hour": {"utilization": "lots", "resets_at": "2025-12-01T07:00:00Z"}, "seven_day": {"utilization": 12}}"#;
        let sample = parse_usage_body(body, fetched_at()).unwrap();
        assert_eq!(sample.five_hour.utilization, 0.0);
        assert!(sample.five_hour.resets_at.is_some());
        assert_eq!(sample.weekly.utilization, 12.0);
    }

    #[test]
    fn test_parse_bad_reset_time_is_dropped() {
        let body = r#"{"five_hour": {"utilization": 10, "resets_at": "tomorrow"}}"#;
        let sample = parse_usage_body(body, fetched_at()).unwrap();
        assert_eq!(sample.five_hour.utilization, 10.0);
        assert!(sample.five_hour.resets_at.is_none());
    }

    #[test]
    fn test_parse_window_wrong_type_is_zero() {
        let sample = parse_usage_body(r#"{"five_hour": "n/a", "seven_day": 3}"#, fetched_at()).unwrap();
        assert_eq!(sample.max_utilization(), 0.0);
    }

    #[test]
    fn test_parse_broken_json_is_malformed() {
        let result = parse_usage_body("<html>maintenance</html>", fetched_at());
        assert!(matches!(result, Err(FetchError::MalformedResponse { .. })));
    }

    #[test]
    fn test_parse_non_object_is_malformed() {
        for body in ["[]", "null", "42", "\"text\""] {
            let result = parse_usage_body(body, fetched_at());
            assert!(
                matches!(result, Err(FetchError::MalformedResponse { .. })),
                "body {} should be malformed",
                body
            );
        }
    }

    // =========================================================================
    // Status classification
    // =========================================================================

    #[test]
    fn test_classify_success() {
        let sample = classify_response(200, None, SAMPLE_BODY, fetched_at()).unwrap();
        assert_eq!(sample.max_utilization(), 47.0);
    }

    #[test]
    fn test_classify_auth_errors() {
        assert_eq!(
            classify_response(401, None, "", fetched_at()),
            Err(FetchError::Unauthorized)
        );
        assert_eq!(
            classify_response(403, None, "forbidden", fetched_at()),
            Err(FetchError::Unauthorized)
        );
    }

    #[test]
    fn test_classify_rate_limit_with_header() {
        assert_eq!(
            classify_response(429, Some("90"), "", fetched_at()),
            Err(FetchError::RateLimited {
                retry_after_seconds: Some(90)
            })
        );
    }

    #[test]
    fn test_classify_rate_limit_without_header() {
        assert_eq!(
            classify_response(429, None, "", fetched_at()),
            Err(FetchError::RateLimited {
                retry_after_seconds: None
            })
        );
        assert_eq!(
            classify_response(429, Some("Wed, 21 Oct 2015 07:28:00 GMT"), "", fetched_at()),
            Err(FetchError::RateLimited {
                retry_after_seconds: None
            })
        );
    }

    #[test]
    fn test_classify_server_error_is_network_failure() {
        let result = classify_response(500, None, "oops", fetched_at());
        assert_eq!(result, Err(FetchError::network("HTTP 500")));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(" 120 "), Some(120));
        assert_eq!(parse_retry_after("0"), Some(0));
        assert_eq!(parse_retry_after("-5"), None);
        assert_eq!(parse_retry_after("soon"), None);
    }

    // =========================================================================
    // Client construction
    // =========================================================================

    #[test]
    fn test_usage_url() {
        let client = ClaudeUsageClient::with_settings(
            "https://claude.ai/api/",
            "org-123",
            Credential::SessionCookie("abc".to_string()),
            Duration::from_secs(5),
        );
        assert_eq!(
            client.usage_url(),
            "https://claude.ai/api/organizations/org-123/usage"
        );
    }

    #[test]
    fn test_credential_from_config() {
        let mut config = AppConfig::default();
        assert!(Credential::from_config(&config).is_none());

        config.session_cookie = "cookie".to_string();
        assert_eq!(
            Credential::from_config(&config),
            Some(Credential::SessionCookie("cookie".to_string()))
        );

        config.access_token = Some("token".to_string());
        assert_eq!(
            Credential::from_config(&config),
            Some(Credential::Bearer("token".to_string()))
        );
    }

    #[test]
    fn test_credential_blank_token_falls_back_to_cookie() {
        let config = AppConfig {
            session_cookie: "valid-cookie".to_string(),
            access_token: Some("   ".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(
            Credential::from_config(&config),
            Some(Credential::SessionCookie("valid-cookie".to_string()))
        );
    }

    #[test]
    fn test_credential_blank_values_are_missing() {
        let config = AppConfig {
            organization_id: "org-1".to_string(),
            session_cookie: " \t".to_string(),
            access_token: Some(String::new()),
            ..AppConfig::default()
        };
        assert!(Credential::from_config(&config).is_none());
        assert!(!config.is_configured());
        assert!(ClaudeUsageClient::from_config(&config).is_err());
    }

    #[test]
    fn test_credential_trims_surrounding_whitespace() {
        let config = AppConfig {
            session_cookie: "  cookie\n".to_string(),
            access_token: Some(" token ".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(
            Credential::from_config(&config),
            Some(Credential::Bearer("token".to_string()))
        );
    }

    #[test]
    fn test_credential_agrees_with_is_configured() {
        let cases = [
            ("", None),
            ("   ", None),
            ("cookie", None),
            ("", Some("token")),
            ("", Some("  ")),
            ("   ", Some("  ")),
        ];
        for (cookie, token) in cases {
            let config = AppConfig {
                organization_id: "org-1".to_string(),
                session_cookie: cookie.to_string(),
                access_token: token.map(str::to_string),
                ..AppConfig::default()
            };
            assert_eq!(
                Credential::from_config(&config).is_some(),
                config.is_configured(),
                "cookie {:?}, token {:?}",
                cookie,
                token
            );
        }
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let debug = format!("{:?}", Credential::SessionCookie("sk-secret".to_string()));
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn test_from_config_requires_org_and_credential() {
        let mut config = AppConfig::default();
        assert!(ClaudeUsageClient::from_config(&config).is_err());

        config.organization_id = "org-1".to_string();
        assert!(ClaudeUsageClient::from_config(&config).is_err());

        config.session_cookie = "cookie".to_string();
        let client = ClaudeUsageClient::from_config(&config).unwrap();
        assert!(client.usage_url().ends_with("/organizations/org-1/usage"));
        assert_eq!(client.source_id(), "claude");
    }

    // =========================================================================
    // Live responses
    // =========================================================================

    /// Answer a single request with `response`; the join handle yields the
    /// raw request text
    async fn serve_once(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{}", addr), server)
    }

    fn local_client(base_url: &str, credential: Credential) -> ClaudeUsageClient {
        ClaudeUsageClient::with_settings(base_url, "org-1", credential, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_fetch_live_unauthorized() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 401 Unauthorized\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let client = local_client(&base_url, Credential::SessionCookie("sk-cookie".to_string()));

        assert_eq!(client.fetch().await, Err(FetchError::Unauthorized));

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /organizations/org-1/usage "));
        assert!(request.contains("cookie: sessionkey=sk-cookie"));
        assert!(!request.contains("authorization:"));
    }

    #[tokio::test]
    async fn test_fetch_live_rate_limited_reads_retry_after() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 429 Too Many Requests\r\nretry-after: 42\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let client = local_client(&base_url, Credential::Bearer("tok".to_string()));

        assert_eq!(
            client.fetch().await,
            Err(FetchError::RateLimited {
                retry_after_seconds: Some(42)
            })
        );

        let request = server.await.unwrap().to_lowercase();
        assert!(request.contains("authorization: bearer tok"));
    }

    #[tokio::test]
    async fn test_fetch_live_success() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 67\r\nconnection: close\r\n\r\n{\"five_hour\": {\"utilization\": 47}, \"seven_day\": {\"utilization\": 9}}",
        )
        .await;
        let client = local_client(&base_url, Credential::SessionCookie("c".to_string()));

        let sample = client.fetch().await.unwrap();
        assert_eq!(sample.five_hour.utilization, 47.0);
        assert_eq!(sample.weekly.utilization, 9.0);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_network_failure() {
        let client = ClaudeUsageClient::with_settings(
            "http://127.0.0.1:9",
            "org-1",
            Credential::SessionCookie("cookie".to_string()),
            Duration::from_secs(2),
        );
        let result = client.fetch().await;
        assert!(matches!(result, Err(FetchError::NetworkFailure { .. })));
    }
}
