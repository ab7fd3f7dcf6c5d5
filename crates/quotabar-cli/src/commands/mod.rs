//! CLI commands module
//!
//! Contains all CLI command implementations.

pub mod config;
pub mod run;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use quotabar_core::AppConfig;

use crate::output::OutputFormat;

/// Shared context for all commands
pub struct Context {
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Context {
    /// Load the config file, falling back to defaults when it does not exist
    pub fn load_config(&self) -> Result<AppConfig> {
        AppConfig::load(&self.config_path)
            .with_context(|| format!("Failed to load {}", self.config_path.display()))
    }

    /// Load the config and require organization id plus a credential
    pub fn load_configured(&self) -> Result<AppConfig> {
        let config = self.load_config()?;
        if !config.is_configured() {
            anyhow::bail!(
                "Quotabar is not configured. Run `quotabar config init`, then set \
                 organization_id and session_cookie in {}",
                self.config_path.display()
            );
        }
        Ok(config)
    }
}
