//! Quota tracking types
//!
//! Types shared by the usage client, the polling timer, the threshold
//! notifier and the status projector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::format_relative_time;

/// Upper bound of a utilization percentage
pub const MAX_UTILIZATION: f64 = 100.0;

/// Thresholds at or above this value produce urgent alerts
pub const URGENT_THRESHOLD: f64 = 90.0;

// ============================================================================
// Window Types
// ============================================================================

/// Quota window tracked by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageWindowKind {
    /// 5-hour rolling window
    FiveHour,
    /// 7-day rolling window (all models)
    Weekly,
}

impl UsageWindowKind {
    /// Key of this window in the usage API payload
    pub fn api_key(&self) -> &'static str {
        match self {
            UsageWindowKind::FiveHour => "five_hour",
            UsageWindowKind::Weekly => "seven_day",
        }
    }
}

impl std::fmt::Display for UsageWindowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageWindowKind::FiveHour => write!(f, "5-hour"),
            UsageWindowKind::Weekly => write!(f, "Weekly"),
        }
    }
}

// ============================================================================
// Samples
// ============================================================================

/// Clamp a raw utilization value into `[0, 100]`
///
/// NaN collapses to 0 so a bad number can never poison comparisons.
pub fn clamp_utilization(raw: f64) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, MAX_UTILIZATION)
}

/// One quota window as observed in a single fetch
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageWindow {
    /// Percentage of the window consumed, always within `[0, 100]`
    pub utilization: f64,
    /// When the window resets
    pub resets_at: Option<DateTime<Utc>>,
}

impl UsageWindow {
    /// Create a window, clamping the utilization
    pub fn new(utilization: f64, resets_at: Option<DateTime<Utc>>) -> Self {
        Self {
            utilization: clamp_utilization(utilization),
            resets_at,
        }
    }

    /// A window the API reported as absent
    pub fn missing() -> Self {
        Self::default()
    }
}

/// Immutable snapshot of one successful fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSample {
    /// 5-hour rolling window
    pub five_hour: UsageWindow,
    /// 7-day rolling window
    pub weekly: UsageWindow,
    /// When this sample was fetched
    pub fetched_at: DateTime<Utc>,
}

impl UsageSample {
    pub fn new(five_hour: UsageWindow, weekly: UsageWindow, fetched_at: DateTime<Utc>) -> Self {
        Self {
            five_hour,
            weekly,
            fetched_at,
        }
    }

    /// Sample without reset times, fetched now
    pub fn from_utilization(five_hour: f64, weekly: f64) -> Self {
        Self::new(
            UsageWindow::new(five_hour, None),
            UsageWindow::new(weekly, None),
            Utc::now(),
        )
    }

    pub fn window(&self, kind: UsageWindowKind) -> &UsageWindow {
        match kind {
            UsageWindowKind::FiveHour => &self.five_hour,
            UsageWindowKind::Weekly => &self.weekly,
        }
    }

    /// The higher of the two utilizations
    pub fn max_utilization(&self) -> f64 {
        self.five_hour.utilization.max(self.weekly.utilization)
    }

    /// The window that drives `max_utilization`; ties go to the 5-hour window
    pub fn peak_window(&self) -> UsageWindowKind {
        if self.weekly.utilization > self.five_hour.utilization {
            UsageWindowKind::Weekly
        } else {
            UsageWindowKind::FiveHour
        }
    }
}

/// Per-window level label shown in the tooltip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLevel {
    Ok,
    High,
    Critical,
}

impl UsageLevel {
    pub fn from_utilization(utilization: f64) -> Self {
        if utilization >= 90.0 {
            UsageLevel::Critical
        } else if utilization >= 75.0 {
            UsageLevel::High
        } else {
            UsageLevel::Ok
        }
    }
}

impl std::fmt::Display for UsageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageLevel::Ok => write!(f, "OK"),
            UsageLevel::High => write!(f, "HIGH"),
            UsageLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

// ============================================================================
// Status
// ============================================================================

/// Status of the polling loop, derived from the latest poll outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTag {
    /// No poll has completed yet
    Initializing,
    /// Last poll returned usage data
    Healthy,
    /// Credential rejected (401/403)
    AuthError,
    /// Server asked us to slow down (429)
    RateLimited,
    /// Transport failure or unparseable body
    NetworkError,
}

impl std::fmt::Display for StatusTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusTag::Initializing => write!(f, "initializing"),
            StatusTag::Healthy => write!(f, "healthy"),
            StatusTag::AuthError => write!(f, "auth_error"),
            StatusTag::RateLimited => write!(f, "rate_limited"),
            StatusTag::NetworkError => write!(f, "network_error"),
        }
    }
}

// ============================================================================
// Presentation
// ============================================================================

/// Icon color class handed to the tray renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorClass {
    Green,
    Yellow,
    Orange,
    Red,
    Blue,
    Gray,
    LoadingGray,
}

impl ColorClass {
    /// Band color for a max-utilization value
    ///
    /// Bands are `[0,50)`, `[50,75)`, `[75,90)` and `[90,100]`.
    pub fn for_utilization(max_utilization: f64) -> Self {
        if max_utilization >= 90.0 {
            ColorClass::Red
        } else if max_utilization >= 75.0 {
            ColorClass::Orange
        } else if max_utilization >= 50.0 {
            ColorClass::Yellow
        } else {
            ColorClass::Green
        }
    }

    /// RGB fill used when drawing the icon
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            ColorClass::Green => (76, 175, 80),
            ColorClass::Yellow => (255, 193, 7),
            ColorClass::Orange => (255, 152, 0),
            ColorClass::Red => (244, 67, 54),
            ColorClass::Blue => (33, 150, 243),
            ColorClass::Gray | ColorClass::LoadingGray => (158, 158, 158),
        }
    }
}

impl std::fmt::Display for ColorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorClass::Green => write!(f, "green"),
            ColorClass::Yellow => write!(f, "yellow"),
            ColorClass::Orange => write!(f, "orange"),
            ColorClass::Red => write!(f, "red"),
            ColorClass::Blue => write!(f, "blue"),
            ColorClass::Gray => write!(f, "gray"),
            ColorClass::LoadingGray => write!(f, "loading_gray"),
        }
    }
}

/// What the tray should display; recomputed every tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationDescriptor {
    pub color_class: ColorClass,
    pub tooltip_text: String,
}

// ============================================================================
// Alerts
// ============================================================================

/// A configured threshold crossed upward by the max utilization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Threshold that was crossed
    pub threshold: f64,
    /// Max utilization at the time of the crossing
    pub current_utilization: f64,
    /// Window that produced the max utilization
    pub window: UsageWindowKind,
    /// Reset time of that window
    pub resets_at: Option<DateTime<Utc>>,
}

impl AlertEvent {
    pub fn is_urgent(&self) -> bool {
        self.threshold >= URGENT_THRESHOLD
    }

    pub fn title(&self) -> String {
        format!("Claude Usage: {}%", self.current_utilization as u32)
    }

    /// Toast body, e.g. "5-hour limit at 92%\nResets in 2h 15m"
    pub fn message(&self, now: DateTime<Utc>) -> String {
        let head = format!("{} limit at {}%", self.window, self.current_utilization as u32);
        match self.resets_at {
            Some(resets_at) => format!("{}\nResets {}", head, format_relative_time(Some(resets_at), now)),
            None => head,
        }
    }
}

/// Event emitted to the notification collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    /// A usage threshold was crossed
    Threshold(AlertEvent),
    /// The credential stopped working; sent once per transition into AuthError
    AuthExpired,
}

impl Alert {
    pub fn is_urgent(&self) -> bool {
        match self {
            Alert::Threshold(event) => event.is_urgent(),
            Alert::AuthExpired => true,
        }
    }

    pub fn title(&self) -> String {
        match self {
            Alert::Threshold(event) => event.title(),
            Alert::AuthExpired => "Claude Monitor: Auth Error".to_string(),
        }
    }

    pub fn message(&self, now: DateTime<Utc>) -> String {
        match self {
            Alert::Threshold(event) => event.message(now),
            Alert::AuthExpired => {
                "Session cookie expired. Please update your cookie in the config file.".to_string()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
