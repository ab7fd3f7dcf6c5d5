//! Application configuration
//!
//! JSON file in the data directory. Missing keys fall back to defaults and
//! unknown keys are ignored, so older files keep loading after upgrades.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::services::quota::claude::{DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::services::quota::notifier::DEFAULT_THRESHOLDS;
use crate::services::quota::timer::DEFAULT_BASE_INTERVAL_SECS;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "QUOTABAR_DATA";

/// File name of the config inside the data directory
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub organization_id: String,
    pub session_cookie: String,
    /// Bearer token used instead of the session cookie when set
    pub access_token: Option<String>,
    pub api_base_url: String,
    pub poll_interval_seconds: u64,
    pub notification_thresholds: Vec<f64>,
    pub request_timeout_seconds: u64,
    pub debug_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            organization_id: String::new(),
            session_cookie: String::new(),
            access_token: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval_seconds: DEFAULT_BASE_INTERVAL_SECS,
            notification_thresholds: DEFAULT_THRESHOLDS.to_vec(),
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECS,
            debug_mode: false,
        }
    }
}

impl AppConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!(
                "[config] No config at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&raw).map_err(|e| {
            Error::config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        log::debug!("[config] Loaded {}", path.display());
        Ok(config.validate())
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("[config] Saved {}", path.display());
        Ok(())
    }

    /// Organization id and at least one credential are present
    pub fn is_configured(&self) -> bool {
        let has_token = self
            .access_token
            .as_ref()
            .map_or(false, |t| !t.trim().is_empty());
        !self.organization_id.trim().is_empty()
            && (has_token || !self.session_cookie.trim().is_empty())
    }

    /// Normalize intervals and thresholds into their valid ranges
    pub fn validate(mut self) -> Self {
        if self.poll_interval_seconds == 0 {
            log::warn!("[config] poll_interval_seconds must be >= 1, using 1");
            self.poll_interval_seconds = 1;
        }
        if self.request_timeout_seconds == 0 {
            log::warn!("[config] request_timeout_seconds must be >= 1, using 1");
            self.request_timeout_seconds = 1;
        }

        let before = self.notification_thresholds.len();
        self.notification_thresholds
            .retain(|t| *t > 0.0 && *t <= 100.0);
        if self.notification_thresholds.len() != before {
            log::warn!("[config] Dropped thresholds outside (0, 100]");
        }
        self.notification_thresholds.sort_by(|a, b| a.total_cmp(b));
        self.notification_thresholds.dedup();

        self
    }
}

// ============================================================================
// Paths
// ============================================================================

/// Directory holding the config file
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(DATA_DIR_ENV) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    if let Some(dir) = dirs::data_local_dir() {
        return Ok(dir.join("quotabar"));
    }

    dirs::home_dir()
        .map(|home| home.join(".quotabar"))
        .ok_or_else(|| Error::config("Could not determine a data directory"))
}

/// Default config file location
pub fn default_config_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(CONFIG_FILE_NAME))
}

// ============================================================================
// Tests
// ============================================================================
