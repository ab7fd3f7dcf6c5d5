//! Output formatting module
//!
//! Provides table and JSON output formatting for CLI commands, plus the
//! colored status line and alert banners used by `quotabar run`.

use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use quotabar_core::services::quota::{Alert, ColorClass, PresentationDescriptor};
use serde::Serialize;
use std::fmt::Display;
use tabled::{Table, Tabled};

/// Output format enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {}. Use 'table' or 'json'", s)),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Print data in the specified format
pub fn print_output<T>(data: &[T], format: OutputFormat) -> anyhow::Result<()>
where
    T: Serialize + Tabled,
{
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("No items found.");
            } else {
                let table = Table::new(data).to_string();
                println!("{}", table);
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data)?;
            println!("{}", json);
        }
    }
    Ok(())
}

/// Print any serializable value as one compact JSON line
pub fn print_json_line<T: Serialize>(data: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(data)?);
    Ok(())
}

/// Print a success message (respects quiet mode)
pub fn print_success(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message.green());
    }
}

/// Print an info message (respects quiet mode)
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message);
    }
}

// ============================================================================
// Status rendering
// ============================================================================

/// Paint text in the icon color of a class
pub fn paint(text: &str, color: ColorClass) -> ColoredString {
    let (r, g, b) = color.rgb();
    text.truecolor(r, g, b)
}

/// Print a descriptor as a colored dot followed by its tooltip
pub fn print_descriptor(descriptor: &PresentationDescriptor) {
    let mut lines = descriptor.tooltip_text.lines();
    let first = lines.next().unwrap_or_default();
    println!("{} {}", paint("●", descriptor.color_class), first.bold());
    for line in lines {
        println!("  {}", line);
    }
}

/// Print an alert banner; urgent alerts are highlighted
pub fn print_alert(alert: &Alert, now: DateTime<Utc>) {
    let title = if alert.is_urgent() {
        alert.title().red().bold()
    } else {
        alert.title().yellow().bold()
    };
    println!("{} {}", "[alert]".bold(), title);
    for line in alert.message(now).lines() {
        println!("        {}", line);
    }
}
