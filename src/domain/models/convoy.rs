//! Convoy domain model.
//!
//! A convoy is a named bundle of beads. Its status and progress are
//! always derived from the aggregate of its beads, never set directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bead::BeadStatus;

/// Who asked for this convoy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Originator {
    System,
    Human,
}

impl Default for Originator {
    fn default() -> Self {
        Self::System
    }
}

impl Originator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Human => "human",
        }
    }
}

/// Derived lifecycle status of a convoy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvoyStatus {
    /// All beads are still in the backlog
    Forming,
    /// At least one bead is queued or in flight
    Active,
    /// Every bead is terminal and at least one completed
    Completed,
    /// Every bead is terminal and all of them failed
    Failed,
}

impl Default for ConvoyStatus {
    fn default() -> Self {
        Self::Forming
    }
}

impl ConvoyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forming => "forming",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Aggregate progress across a convoy's beads.
///
/// Invariant: `completed + failed + in_progress + queued == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvoyProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub in_progress: usize,
    pub queued: usize,
    pub percent_complete: f64,
}

impl ConvoyProgress {
    /// Derive progress from the current statuses of the convoy's beads.
    ///
    /// `queued` counts everything waiting for dispatch (backlog, queued,
    /// requeued); `in_progress` counts everything a polecat currently
    /// holds (assigned, in progress, verifying).
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = BeadStatus>,
    {
        let mut progress = Self::default();
        for status in statuses {
            progress.total += 1;
            match status {
                BeadStatus::Completed => progress.completed += 1,
                BeadStatus::Failed => progress.failed += 1,
                BeadStatus::Assigned | BeadStatus::InProgress | BeadStatus::Verifying => {
                    progress.in_progress += 1;
                }
                BeadStatus::Backlog | BeadStatus::Queued | BeadStatus::Requeued => {
                    progress.queued += 1;
                }
            }
        }
        if progress.total > 0 {
            progress.percent_complete =
                (progress.completed as f64 / progress.total as f64) * 100.0;
        }
        progress
    }

}

impl ConvoyStatus {
    /// Derive the convoy status from its beads' current statuses.
    ///
    /// A convoy forms until any bead leaves the backlog, is active while
    /// any bead is queued or in flight, and resolves terminal once every
    /// bead is terminal (completed if anything succeeded, failed if
    /// nothing did).
    pub fn derive<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = BeadStatus>,
    {
        let mut total = 0usize;
        let mut completed = 0usize;
        let mut failed = 0usize;
        let mut backlog = 0usize;
        for status in statuses {
            total += 1;
            match status {
                BeadStatus::Completed => completed += 1,
                BeadStatus::Failed => failed += 1,
                BeadStatus::Backlog => backlog += 1,
                _ => {}
            }
        }
        if total == 0 || backlog == total {
            Self::Forming
        } else if completed + failed == total {
            if completed > 0 {
                Self::Completed
            } else {
                Self::Failed
            }
        } else {
            Self::Active
        }
    }
}

/// A named bundle of beads with derived aggregate state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Convoy {
    pub id: Uuid,
    pub name: String,
    /// Member beads, in registration order
    pub bead_ids: Vec<Uuid>,
    /// Derived; refreshed from bead statuses by the store
    pub status: ConvoyStatus,
    pub originator: Originator,
    /// Derived; refreshed from bead statuses by the store
    pub progress: ConvoyProgress,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Convoy {
    pub fn new(name: impl Into<String>, originator: Originator) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            bead_ids: Vec::new(),
            status: ConvoyStatus::Forming,
            originator,
            progress: ConvoyProgress::default(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_beads(mut self, bead_ids: Vec<Uuid>) -> Self {
        self.bead_ids = bead_ids;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_counts_partition_total() {
        let statuses = [
            BeadStatus::Completed,
            BeadStatus::Failed,
            BeadStatus::InProgress,
            BeadStatus::Verifying,
            BeadStatus::Queued,
            BeadStatus::Backlog,
            BeadStatus::Requeued,
            BeadStatus::Assigned,
        ];
        let p = ConvoyProgress::from_statuses(statuses);
        assert_eq!(p.total, 8);
        assert_eq!(p.completed + p.failed + p.in_progress + p.queued, p.total);
        assert_eq!(p.completed, 1);
        assert_eq!(p.failed, 1);
        assert_eq!(p.in_progress, 3);
        assert_eq!(p.queued, 3);
    }

    #[test]
    fn all_completed_yields_100_percent() {
        let p = ConvoyProgress::from_statuses([BeadStatus::Completed, BeadStatus::Completed]);
        assert!((p.percent_complete - 100.0).abs() < f64::EPSILON);
        let s = ConvoyStatus::derive([BeadStatus::Completed, BeadStatus::Completed]);
        assert_eq!(s, ConvoyStatus::Completed);
    }

    #[test]
    fn all_failed_yields_failed_status() {
        let s = ConvoyStatus::derive([BeadStatus::Failed, BeadStatus::Failed]);
        assert_eq!(s, ConvoyStatus::Failed);
    }

    #[test]
    fn mixed_terminal_counts_as_completed() {
        let s = ConvoyStatus::derive([BeadStatus::Completed, BeadStatus::Failed]);
        assert_eq!(s, ConvoyStatus::Completed);
    }

    #[test]
    fn in_flight_bead_makes_convoy_active() {
        let s = ConvoyStatus::derive([BeadStatus::InProgress, BeadStatus::Backlog]);
        assert_eq!(s, ConvoyStatus::Active);
    }

    #[test]
    fn queued_bead_makes_convoy_active() {
        let s = ConvoyStatus::derive([BeadStatus::Queued, BeadStatus::Backlog]);
        assert_eq!(s, ConvoyStatus::Active);
    }

    #[test]
    fn all_backlog_is_forming() {
        let s = ConvoyStatus::derive([BeadStatus::Backlog, BeadStatus::Backlog]);
        assert_eq!(s, ConvoyStatus::Forming);
        assert_eq!(ConvoyStatus::derive(std::iter::empty::<BeadStatus>()), ConvoyStatus::Forming);
    }
}
