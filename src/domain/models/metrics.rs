//! Metric snapshot models and trend classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Point-in-time fleet utilization.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FleetUtilization {
    pub total_polecats: usize,
    pub active_sessions: usize,
    pub idle_polecats: usize,
    /// Active sessions as a percentage of the fleet
    pub utilization_percent: f64,
}

impl FleetUtilization {
    pub fn new(total_polecats: usize, active_sessions: usize) -> Self {
        let idle_polecats = total_polecats.saturating_sub(active_sessions);
        let utilization_percent = if total_polecats > 0 {
            (active_sessions as f64 / total_polecats as f64) * 100.0
        } else {
            0.0
        };
        Self {
            total_polecats,
            active_sessions,
            idle_polecats,
            utilization_percent,
        }
    }
}

/// Bead population broken down by status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BeadStatusCounts {
    pub backlog: usize,
    pub queued: usize,
    pub assigned: usize,
    pub in_progress: usize,
    pub verifying: usize,
    pub requeued: usize,
    pub completed: usize,
    pub failed: usize,
}

impl BeadStatusCounts {
    pub fn total(&self) -> usize {
        self.backlog
            + self.queued
            + self.assigned
            + self.in_progress
            + self.verifying
            + self.requeued
            + self.completed
            + self.failed
    }
}

/// Convoy population and aggregate progress.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConvoySummary {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    /// Mean percent-complete across all convoys
    pub average_percent_complete: f64,
}

/// A timestamped aggregate of fleet, bead, and convoy health plus the
/// events observed since the previous snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub timestamp: DateTime<Utc>,
    pub fleet: FleetUtilization,
    pub beads: BeadStatusCounts,
    pub convoys: ConvoySummary,
    pub events_since_last: u64,
    pub events_by_type: HashMap<String, u64>,
}

/// One extracted point of a metric time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Direction a windowed metric is moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Stable => "stable",
        }
    }

    /// Arrow glyph for report rendering.
    pub fn arrow(&self) -> &'static str {
        match self {
            Self::Rising => "↑",
            Self::Falling => "↓",
            Self::Stable => "→",
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a trend query over a metric window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    /// Raw least-squares slope per sample step
    pub slope: f64,
    /// Fitted change across the window relative to the value range
    pub normalized_slope: f64,
    /// Points the fit was computed over
    pub samples: usize,
}

impl Trend {
    pub fn stable(samples: usize) -> Self {
        Self {
            direction: TrendDirection::Stable,
            slope: 0.0,
            normalized_slope: 0.0,
            samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_percent_from_counts() {
        let fleet = FleetUtilization::new(4, 3);
        assert!((fleet.utilization_percent - 75.0).abs() < 1e-9);
        assert_eq!(fleet.idle_polecats, 1);
    }

    #[test]
    fn empty_fleet_is_zero_utilized() {
        let fleet = FleetUtilization::new(0, 0);
        assert!((fleet.utilization_percent - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn counts_total_sums_all_statuses() {
        let counts = BeadStatusCounts {
            backlog: 1,
            queued: 2,
            assigned: 3,
            in_progress: 4,
            verifying: 5,
            requeued: 6,
            completed: 7,
            failed: 8,
        };
        assert_eq!(counts.total(), 36);
    }
}
