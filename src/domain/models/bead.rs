//! Bead domain model.
//!
//! Beads are the atomic units of work dispatched to polecats. Each bead
//! carries a role requirement, a dependency set on other beads, and a
//! retry budget, and moves through a validated state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default retry budget for a bead when none is given.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Status of a bead in the scheduling pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeadStatus {
    /// Registered but not yet eligible for dispatch
    Backlog,
    /// Eligible for dispatch once dependencies complete
    Queued,
    /// Claimed by a polecat, session not yet started
    Assigned,
    /// A polecat session is actively working it
    InProgress,
    /// Execution finished, verification verdict pending
    Verifying,
    /// Attempt consumed, waiting to re-enter the queue
    Requeued,
    /// Finished with a passing verification
    Completed,
    /// Retry budget exhausted
    Failed,
}

impl Default for BeadStatus {
    fn default() -> Self {
        Self::Backlog
    }
}

impl BeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Queued => "queued",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Verifying => "verifying",
            Self::Requeued => "requeued",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "backlog" => Some(Self::Backlog),
            "queued" => Some(Self::Queued),
            "assigned" => Some(Self::Assigned),
            "in_progress" => Some(Self::InProgress),
            "verifying" => Some(Self::Verifying),
            "requeued" => Some(Self::Requeued),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check if a polecat is currently responsible for the bead.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress | Self::Verifying)
    }

    /// Valid transitions from this status. This table is the single
    /// source of truth for what can happen to a bead next; every store
    /// mutation is validated against it.
    pub fn valid_transitions(&self) -> &'static [BeadStatus] {
        match self {
            Self::Backlog => &[Self::Queued],
            Self::Queued => &[Self::Assigned, Self::Backlog],
            Self::Assigned => &[Self::InProgress, Self::Queued],
            Self::InProgress => &[Self::Verifying, Self::Failed, Self::Requeued],
            Self::Verifying => &[Self::Completed, Self::Requeued, Self::Failed],
            Self::Requeued => &[Self::Queued],
            Self::Completed | Self::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for BeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Priority level for beads. Ready-queue ordering is highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeadPriority {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Default for BeadPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl BeadPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "normal" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Summary of changes produced by a completed attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub files_changed: u32,
    pub lines_changed: u64,
}

/// Outcome returned by the completion service for one attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeadResult {
    /// Whether the attempt itself succeeded
    pub success: bool,
    /// Free-form output from the worker
    pub output: String,
    /// Changes made to the workspace, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<ChangeSummary>,
    /// Error description when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Verdict from the verification pass, kept distinct from the execution
/// result so a "ran fine but wrong" outcome is representable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationVerdict {
    pub passed: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl VerificationVerdict {
    pub fn passing() -> Self {
        Self {
            passed: true,
            errors: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn failing(errors: Vec<String>) -> Self {
        Self {
            passed: false,
            errors,
            suggestions: Vec::new(),
        }
    }
}

/// An atomic unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bead {
    /// Unique identifier
    pub id: Uuid,
    /// Short human title
    pub title: String,
    /// Longer description handed to the completion service
    pub description: String,
    /// Capability required to work this bead (e.g. "backend")
    pub role: String,
    /// Scheduling priority
    pub priority: BeadPriority,
    /// Beads that must complete before this one may be assigned
    pub dependencies: Vec<Uuid>,
    /// Current state-machine position
    pub status: BeadStatus,
    /// Polecat currently responsible, if any
    pub assigned_polecat: Option<Uuid>,
    /// Convoy this bead belongs to, if any
    pub convoy_id: Option<Uuid>,
    /// Result of the most recent attempt
    pub last_result: Option<BeadResult>,
    /// Verification verdict of the most recent attempt
    pub last_verification: Option<VerificationVerdict>,
    /// Attempts consumed so far
    pub attempt: u32,
    /// Retry budget ceiling
    pub max_attempts: u32,
    /// When registered
    pub created_at: DateTime<Utc>,
    /// When it reached `Completed`
    pub completed_at: Option<DateTime<Utc>>,
}

impl Bead {
    /// Create a new backlog bead with default priority and retry budget.
    pub fn new(title: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            role: role.into(),
            priority: BeadPriority::default(),
            dependencies: Vec::new(),
            status: BeadStatus::Backlog,
            assigned_polecat: None,
            convoy_id: None,
            last_result: None,
            last_verification: None,
            attempt: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: BeadPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Uuid>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_convoy(mut self, convoy_id: Uuid) -> Self {
        self.convoy_id = Some(convoy_id);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }

    /// Whether the retry budget is spent.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backlog_only_promotes_to_queued() {
        assert!(BeadStatus::Backlog.can_transition_to(BeadStatus::Queued));
        assert!(!BeadStatus::Backlog.can_transition_to(BeadStatus::Assigned));
        assert!(!BeadStatus::Backlog.can_transition_to(BeadStatus::Completed));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(BeadStatus::Completed.valid_transitions().is_empty());
        assert!(BeadStatus::Failed.valid_transitions().is_empty());
        assert!(BeadStatus::Completed.is_terminal());
        assert!(BeadStatus::Failed.is_terminal());
    }

    #[test]
    fn verifying_can_resolve_three_ways() {
        let exits = BeadStatus::Verifying.valid_transitions();
        assert!(exits.contains(&BeadStatus::Completed));
        assert!(exits.contains(&BeadStatus::Requeued));
        assert!(exits.contains(&BeadStatus::Failed));
        assert_eq!(exits.len(), 3);
    }

    #[test]
    fn priority_orders_critical_highest() {
        assert!(BeadPriority::Critical > BeadPriority::High);
        assert!(BeadPriority::High > BeadPriority::Medium);
        assert!(BeadPriority::Medium > BeadPriority::Low);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            BeadStatus::Backlog,
            BeadStatus::Queued,
            BeadStatus::Assigned,
            BeadStatus::InProgress,
            BeadStatus::Verifying,
            BeadStatus::Requeued,
            BeadStatus::Completed,
            BeadStatus::Failed,
        ] {
            assert_eq!(BeadStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn builder_clamps_zero_max_attempts() {
        let bead = Bead::new("t", "backend").with_max_attempts(0);
        assert_eq!(bead.max_attempts, 1);
    }
}
