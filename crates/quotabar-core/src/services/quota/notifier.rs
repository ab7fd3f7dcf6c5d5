//! Threshold notifier
//!
//! Turns a stream of max-utilization values into edge-triggered alert
//! events. A threshold fires once when the max utilization moves from below
//! it to at-or-above it, and re-arms only after the max drops back below it.
//! There is no cool-down timer.

use serde::{Deserialize, Serialize};

use super::types::{AlertEvent, UsageSample};

/// Default notification thresholds (percent)
pub const DEFAULT_THRESHOLDS: [f64; 3] = [50.0, 75.0, 90.0];

/// Thresholds crossed upward between two observations, in ascending order
///
/// `thresholds` must be sorted ascending. A threshold `t` is returned when
/// `new_max >= t` and the previous max was absent or below `t`.
pub fn crossed_thresholds(previous_max: Option<f64>, new_max: f64, thresholds: &[f64]) -> Vec<f64> {
    thresholds
        .iter()
        .copied()
        .filter(|&t| new_max >= t && previous_max.map_or(true, |prev| prev < t))
        .collect()
}

/// Armed/disarmed state of every configured threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdState {
    /// Ascending, deduplicated thresholds
    thresholds: Vec<f64>,
    /// `armed[i]` is true while the last known max is below `thresholds[i]`
    armed: Vec<bool>,
}

impl ThresholdState {
    /// All thresholds start armed
    pub fn new(thresholds: &[f64]) -> Self {
        let mut sorted: Vec<f64> = thresholds.iter().copied().filter(|t| t.is_finite()).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted.dedup();
        let armed = vec![true; sorted.len()];
        Self {
            thresholds: sorted,
            armed,
        }
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn is_armed(&self, threshold: f64) -> bool {
        self.thresholds
            .iter()
            .position(|&t| t == threshold)
            .map(|i| self.armed[i])
            .unwrap_or(false)
    }

    /// Record a new max and return the thresholds that fired, ascending
    pub fn observe(&mut self, new_max: f64) -> Vec<f64> {
        let mut fired = Vec::new();
        for (threshold, armed) in self.thresholds.iter().zip(self.armed.iter_mut()) {
            let above = new_max >= *threshold;
            if above && *armed {
                fired.push(*threshold);
            }
            *armed = !above;
        }
        fired
    }
}

/// Emits alert events for threshold crossings of successive samples
#[derive(Debug, Clone)]
pub struct ThresholdNotifier {
    state: ThresholdState,
}

impl ThresholdNotifier {
    pub fn new(thresholds: &[f64]) -> Self {
        Self {
            state: ThresholdState::new(thresholds),
        }
    }

    pub fn state(&self) -> &ThresholdState {
        &self.state
    }

    /// Feed a fresh sample; returns one event per newly crossed threshold
    pub fn observe_sample(&mut self, sample: &UsageSample) -> Vec<AlertEvent> {
        let max = sample.max_utilization();
        let window = sample.peak_window();
        let resets_at = sample.window(window).resets_at;

        let events: Vec<AlertEvent> = self
            .state
            .observe(max)
            .into_iter()
            .map(|threshold| AlertEvent {
                threshold,
                current_utilization: max,
                window,
                resets_at,
            })
            .collect();

        for event in &events {
            log::info!(
                "[quota:notify] Threshold {}% crossed ({} at {:.1}%)",
                event.threshold,
                event.window,
                event.current_utilization
            );
        }

        events
    }
}

impl Default for ThresholdNotifier {
    fn default() -> Self {
        Self::new(&DEFAULT_THRESHOLDS)
    }
}

// ============================================================================
// Tests
// ============================================================================
