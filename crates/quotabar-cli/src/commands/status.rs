//! Status command
//!
//! One fetch against the usage endpoint, printed as a table or JSON.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use quotabar_core::services::quota::{
    project, ClaudeUsageClient, StatusTag, UsageLevel, UsageSample, UsageSource, UsageWindowKind,
};
use quotabar_core::utils::{format_local_time, format_relative_time};

use super::Context;
use crate::output::{paint, print_output, OutputFormat};

/// One usage window for table display
#[derive(Debug, Serialize, Tabled)]
pub struct WindowRow {
    #[tabled(rename = "Window")]
    pub window: String,
    #[tabled(rename = "Usage")]
    pub usage: String,
    #[tabled(rename = "Level")]
    pub level: String,
    #[tabled(rename = "Resets")]
    pub resets: String,
    #[tabled(rename = "Resets In")]
    pub resets_in: String,
}

pub async fn execute(ctx: &Context) -> Result<()> {
    let config = ctx.load_configured()?;
    let client = ClaudeUsageClient::from_config(&config)?;

    let sample = client.fetch().await?;

    match ctx.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&sample)?);
        }
        OutputFormat::Table => {
            if !ctx.quiet {
                let descriptor = project(StatusTag::Healthy, Some(&sample));
                println!(
                    "{} Peak usage {:.0}% ({})",
                    paint("●", descriptor.color_class),
                    sample.max_utilization(),
                    sample.peak_window()
                );
            }
            print_output(&window_rows(&sample, Utc::now()), ctx.format)?;
        }
    }

    Ok(())
}

fn window_rows(sample: &UsageSample, now: DateTime<Utc>) -> Vec<WindowRow> {
    [UsageWindowKind::FiveHour, UsageWindowKind::Weekly]
        .into_iter()
        .map(|kind| {
            let window = sample.window(kind);
            WindowRow {
                window: kind.to_string(),
                usage: format!("{:.1}%", window.utilization),
                level: UsageLevel::from_utilization(window.utilization).to_string(),
                resets: format_local_time(window.resets_at),
                resets_in: format_relative_time(window.resets_at, now),
            }
        })
        .collect()
}
