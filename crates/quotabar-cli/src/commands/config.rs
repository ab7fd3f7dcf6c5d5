//! Config commands
//!
//! Commands for inspecting and creating the config file.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use quotabar_core::config::DATA_DIR_ENV;
use quotabar_core::AppConfig;

use super::Context;
use crate::output::{print_info, print_output, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Config row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

pub async fn execute(ctx: &Context, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(ctx),
        ConfigAction::Path => show_path(ctx),
        ConfigAction::Init { force } => init_config(ctx, force),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;
    let rows = config_rows(&config);
    print_output(&rows, ctx.format)?;

    if !config.is_configured() {
        print_info(
            "\nNot configured yet: set organization_id and session_cookie.",
            ctx.quiet || ctx.format == OutputFormat::Json,
        );
    }
    Ok(())
}

fn show_path(ctx: &Context) -> Result<()> {
    match ctx.format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "config_path": ctx.config_path,
                "exists": ctx.config_path.exists(),
                "data_dir_env": std::env::var(DATA_DIR_ENV).ok(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => println!("{}", ctx.config_path.display()),
    }
    Ok(())
}

fn init_config(ctx: &Context, force: bool) -> Result<()> {
    if ctx.config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {} (use --force to overwrite)",
            ctx.config_path.display()
        );
    }

    AppConfig::default().save(&ctx.config_path)?;

    print_success(
        &format!("Wrote default config to {}", ctx.config_path.display()),
        ctx.quiet,
    );
    print_info(
        "Set organization_id and session_cookie (the sessionKey cookie from claude.ai), \
         then run `quotabar status`.",
        ctx.quiet,
    );
    Ok(())
}

fn config_rows(config: &AppConfig) -> Vec<ConfigRow> {
    let thresholds = config
        .notification_thresholds
        .iter()
        .map(|t| format!("{}%", t))
        .collect::<Vec<_>>()
        .join(", ");

    vec![
        row("organization_id", or_dash(&config.organization_id)),
        row("session_cookie", mask_token(&Some(config.session_cookie.clone()))),
        row("access_token", mask_token(&config.access_token)),
        row("api_base_url", config.api_base_url.clone()),
        row(
            "poll_interval_seconds",
            config.poll_interval_seconds.to_string(),
        ),
        row("notification_thresholds", or_dash(&thresholds)),
        row(
            "request_timeout_seconds",
            config.request_timeout_seconds.to_string(),
        ),
        row("debug_mode", config.debug_mode.to_string()),
    ]
}

fn row(key: &str, value: String) -> ConfigRow {
    ConfigRow {
        key: key.to_string(),
        value,
    }
}

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

fn mask_token(token: &Option<String>) -> String {
    match token {
        Some(t) if !t.is_empty() => "****".to_string(),
        _ => "-".to_string(),
    }
}
