//! Polecat domain model.
//!
//! A polecat is a worker identity: a role, an owning rig, a bound
//! runtime, and at most one active session at a time. Its identity
//! record accumulates trust (a 0-100 performance score) and its stats
//! keep O(1) rolling aggregates across sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::hook::Hook;

/// Lower and upper bounds of the performance score.
pub const MIN_PERFORMANCE_SCORE: f64 = 0.0;
pub const MAX_PERFORMANCE_SCORE: f64 = 100.0;

/// Score a freshly spawned polecat starts with.
pub const INITIAL_PERFORMANCE_SCORE: f64 = 50.0;

/// Current availability of a polecat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolecatStatus {
    Idle,
    Working,
}

impl std::fmt::Display for PolecatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Working => write!(f, "working"),
        }
    }
}

/// Status of an in-progress session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Actively working its bead
    Working,
    /// Flagged by a health scan as running past the strategy timeout
    Stalled,
}

/// The binding of a polecat to one in-flight bead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// Bead being worked
    pub bead_id: Uuid,
    /// Isolated environment the work happens in
    pub hook: Hook,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(bead_id: Uuid, hook: Hook) -> Self {
        Self {
            id: Uuid::new_v4(),
            bead_id,
            hook,
            status: SessionStatus::Working,
            started_at: Utc::now(),
        }
    }

    /// Milliseconds elapsed since the session started.
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}

/// Long-lived identity record for a polecat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolecatIdentity {
    pub created_at: DateTime<Utc>,
    /// Sessions started over the polecat's lifetime
    pub total_sessions: u64,
    /// Sessions that ended in a verified success
    pub total_completions: u64,
    /// Free-form specialization tags
    pub specializations: Vec<String>,
    /// Trust score in `[0, 100]`. Failures cost more than successes
    /// earn, so trust is slow to build and quick to lose.
    pub performance_score: f64,
}

impl Default for PolecatIdentity {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            total_sessions: 0,
            total_completions: 0,
            specializations: Vec::new(),
            performance_score: INITIAL_PERFORMANCE_SCORE,
        }
    }
}

impl PolecatIdentity {
    /// Apply a score delta, clamped to the valid range.
    pub fn adjust_score(&mut self, delta: f64) {
        self.performance_score = (self.performance_score + delta)
            .clamp(MIN_PERFORMANCE_SCORE, MAX_PERFORMANCE_SCORE);
    }
}

/// Rolling per-polecat work statistics.
///
/// All aggregates update incrementally so a polecat's history never
/// needs to be replayed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolecatStats {
    pub completed: u64,
    pub failed: u64,
    /// Running average session duration in milliseconds
    pub avg_duration_ms: f64,
    /// Fraction of verifications that passed
    pub verification_pass_rate: f64,
    /// Verifications observed (denominator for the pass rate)
    pub verifications: u64,
    pub total_lines_changed: u64,
}

impl PolecatStats {
    /// Fold one finished session into the rolling aggregates.
    pub fn record_session(
        &mut self,
        success: bool,
        duration_ms: f64,
        verification_passed: bool,
        lines_changed: u64,
    ) {
        if success {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
        let sessions = (self.completed + self.failed) as f64;
        self.avg_duration_ms += (duration_ms - self.avg_duration_ms) / sessions;

        self.verifications += 1;
        let passed = if verification_passed { 1.0 } else { 0.0 };
        self.verification_pass_rate +=
            (passed - self.verification_pass_rate) / self.verifications as f64;

        self.total_lines_changed += lines_changed;
    }

    /// Fold a crashed session into the aggregates. Crashes count as
    /// failures but carry no verification verdict or change data.
    pub fn record_crash(&mut self, duration_ms: f64) {
        self.failed += 1;
        let sessions = (self.completed + self.failed) as f64;
        self.avg_duration_ms += (duration_ms - self.avg_duration_ms) / sessions;
    }
}

/// A worker identity bound to at most one active session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polecat {
    pub id: Uuid,
    pub name: String,
    /// Capability this polecat serves (e.g. "backend")
    pub role: String,
    /// Logical workspace the polecat operates against
    pub rig: String,
    /// Key of the runtime the polecat is bound to
    pub runtime_key: String,
    pub status: PolecatStatus,
    /// The single active session, if any
    pub session: Option<Session>,
    /// Hook left behind by a crashed session, destroyed on retire
    pub orphaned_hook: Option<Hook>,
    pub identity: PolecatIdentity,
    pub stats: PolecatStats,
}

impl Polecat {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        rig: impl Into<String>,
        runtime_key: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role: role.into(),
            rig: rig.into(),
            runtime_key: runtime_key.into(),
            status: PolecatStatus::Idle,
            session: None,
            orphaned_hook: None,
            identity: PolecatIdentity::default(),
            stats: PolecatStats::default(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == PolecatStatus::Idle && self.session.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_clamps_at_bounds() {
        let mut identity = PolecatIdentity::default();
        identity.adjust_score(1000.0);
        assert!((identity.performance_score - MAX_PERFORMANCE_SCORE).abs() < f64::EPSILON);
        identity.adjust_score(-1000.0);
        assert!((identity.performance_score - MIN_PERFORMANCE_SCORE).abs() < f64::EPSILON);
    }

    #[test]
    fn rolling_average_matches_arithmetic_mean() {
        let mut stats = PolecatStats::default();
        stats.record_session(true, 100.0, true, 0);
        stats.record_session(true, 200.0, true, 0);
        stats.record_session(false, 600.0, false, 0);
        assert!((stats.avg_duration_ms - 300.0).abs() < 1e-9);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn pass_rate_tracks_verdicts() {
        let mut stats = PolecatStats::default();
        stats.record_session(true, 10.0, true, 0);
        stats.record_session(false, 10.0, false, 0);
        assert!((stats.verification_pass_rate - 0.5).abs() < 1e-9);
        stats.record_session(true, 10.0, true, 0);
        assert!((stats.verification_pass_rate - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn crash_counts_as_failure_without_verification() {
        let mut stats = PolecatStats::default();
        stats.record_crash(50.0);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.verifications, 0);
        assert!((stats.avg_duration_ms - 50.0).abs() < 1e-9);
    }

    #[test]
    fn fresh_polecat_is_idle() {
        let p = Polecat::new("nux", "backend", "citadel", "rt-1");
        assert!(p.is_idle());
        assert!((p.identity.performance_score - INITIAL_PERFORMANCE_SCORE).abs() < f64::EPSILON);
    }
}
