//! Status projector
//!
//! Pure mapping from the poll status and the latest sample to what the tray
//! displays.

use super::types::{
    ColorClass, PresentationDescriptor, StatusTag, UsageLevel, UsageSample, UsageWindowKind,
};
use crate::utils::format_local_time;

pub const LOADING_TOOLTIP: &str = "Loading usage data...";
pub const AUTH_ERROR_TOOLTIP: &str = "Auth Error: Cookie expired";
pub const NETWORK_ERROR_TOOLTIP: &str = "Connection Error";
pub const RATE_LIMITED_TOOLTIP: &str = "Rate limited, retrying...";

/// Header line of the healthy tooltip
const TOOLTIP_TITLE: &str = "Claude Usage Monitor";

/// Compute the descriptor for a status and the last sample
///
/// `Healthy` without a sample cannot come out of the polling timer; it is
/// shown as loading rather than inventing a 0% reading.
pub fn project(status: StatusTag, sample: Option<&UsageSample>) -> PresentationDescriptor {
    match (status, sample) {
        (StatusTag::Initializing, _) | (StatusTag::Healthy, None) => {
            descriptor(ColorClass::LoadingGray, LOADING_TOOLTIP)
        }
        (StatusTag::AuthError, _) => descriptor(ColorClass::Blue, AUTH_ERROR_TOOLTIP),
        (StatusTag::NetworkError, _) => descriptor(ColorClass::Gray, NETWORK_ERROR_TOOLTIP),
        (StatusTag::RateLimited, _) => descriptor(ColorClass::Gray, RATE_LIMITED_TOOLTIP),
        (StatusTag::Healthy, Some(sample)) => PresentationDescriptor {
            color_class: ColorClass::for_utilization(sample.max_utilization()),
            tooltip_text: healthy_tooltip(sample),
        },
    }
}

fn descriptor(color_class: ColorClass, text: &str) -> PresentationDescriptor {
    PresentationDescriptor {
        color_class,
        tooltip_text: text.to_string(),
    }
}

fn healthy_tooltip(sample: &UsageSample) -> String {
    let mut lines = vec![TOOLTIP_TITLE.to_string(), String::new()];

    for kind in [UsageWindowKind::FiveHour, UsageWindowKind::Weekly] {
        let window = sample.window(kind);
        lines.push(format!(
            "{:<8} {:.0}% [{}]",
            format!("{}:", kind),
            window.utilization,
            UsageLevel::from_utilization(window.utilization)
        ));
        lines.push(format!("  Resets {}", format_local_time(window.resets_at)));
    }

    lines.join("\n")
}

// ============================================================================
// Tests
// ============================================================================
