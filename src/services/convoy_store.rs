//! ConvoyStore: the single authoritative state machine for beads and
//! convoys.
//!
//! All bead/convoy mutation funnels through this store. Every transition
//! is validated against `BeadStatus::valid_transitions`; anything not in
//! that table is rejected with an error naming the bead and both
//! statuses, leaving the bead untouched. Mutations are serialized behind
//! an internal mutex, and resulting `FleetEvent`s fan out synchronously
//! to the handlers registered on this instance.
//!
//! Handler contract: a failing or panicking handler never affects the
//! state transition that triggered it. Errors are logged and swallowed.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, RwLock};

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Bead, BeadResult, BeadStatus, BeadStatusCounts, Convoy, ConvoyProgress, ConvoyStatus,
    ConvoySummary, FleetEvent, VerificationVerdict,
};

type EventHandler = Box<dyn Fn(&FleetEvent) -> anyhow::Result<()> + Send + Sync>;

/// Aggregate store counts consumed by the metric recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreSnapshot {
    pub beads: BeadStatusCounts,
    pub convoys: ConvoySummary,
}

#[derive(Default)]
struct StoreState {
    beads: HashMap<Uuid, Bead>,
    convoys: HashMap<Uuid, Convoy>,
}

/// Single-writer authority over all bead and convoy state.
pub struct ConvoyStore {
    state: Mutex<StoreState>,
    handlers: RwLock<Vec<EventHandler>>,
}

impl ConvoyStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register a FleetEvent listener. Handlers are held for the life
    /// of the store; callers needing detach semantics must track and
    /// ignore via their own flag.
    pub fn on<F>(&self, handler: F)
    where
        F: Fn(&FleetEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// Fan an event out to every registered handler. Handler errors and
    /// panics are captured and logged, never propagated.
    pub fn publish(&self, event: FleetEvent) {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for handler in handlers.iter() {
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(event_type = event.event_type(), error = %err, "event handler failed");
                }
                Err(_) => {
                    warn!(event_type = event.event_type(), "event handler panicked");
                }
            }
        }
    }

    fn emit_all(&self, events: Vec<FleetEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Validated transition. The only place a bead's status changes.
    fn transition(bead: &mut Bead, to: BeadStatus) -> DomainResult<()> {
        if !bead.status.can_transition_to(to) {
            return Err(DomainError::InvalidTransition {
                bead_id: bead.id,
                from: bead.status,
                to,
            });
        }
        debug!(bead_id = %bead.id, from = %bead.status, to = %to, "bead transition");
        bead.status = to;
        Ok(())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a bead in the backlog.
    pub fn add_bead(&self, bead: Bead) -> Uuid {
        let id = bead.id;
        self.lock_state().beads.insert(id, bead);
        id
    }

    /// Register a convoy.
    pub fn add_convoy(&self, convoy: Convoy) -> Uuid {
        let id = convoy.id;
        let event = FleetEvent::ConvoyCreated {
            convoy_id: id,
            name: convoy.name.clone(),
            bead_count: convoy.bead_ids.len(),
        };
        self.lock_state().convoys.insert(id, convoy);
        self.publish(event);
        id
    }

    /// Register a convoy together with its beads in one step. This is
    /// the planning collaborator's entry point.
    pub fn add_plan(&self, mut convoy: Convoy, beads: Vec<Bead>) -> DomainResult<Uuid> {
        let convoy_id = convoy.id;
        let mut events = Vec::new();
        {
            let mut state = self.lock_state();
            for mut bead in beads {
                bead.convoy_id = Some(convoy_id);
                if !convoy.bead_ids.contains(&bead.id) {
                    convoy.bead_ids.push(bead.id);
                }
                // Planned beads are schedulable immediately.
                if bead.status == BeadStatus::Backlog {
                    Self::transition(&mut bead, BeadStatus::Queued)?;
                }
                state.beads.insert(bead.id, bead);
            }
            let bead_count = convoy.bead_ids.len();
            events.push(FleetEvent::ConvoyCreated {
                convoy_id,
                name: convoy.name.clone(),
                bead_count,
            });
            events.push(FleetEvent::PlanCreated {
                convoy_id,
                bead_count,
            });
            state.convoys.insert(convoy_id, convoy);
            Self::refresh_convoy_locked(&mut state, convoy_id, &mut events)?;
        }
        self.emit_all(events);
        Ok(convoy_id)
    }

    /// Claim a bead for a polecat: `backlog/queued -> queued ->
    /// assigned`. Fails if the bead does not exist or any dependency is
    /// not yet completed.
    pub fn assign_bead(&self, id: Uuid, polecat_id: Uuid) -> DomainResult<()> {
        let mut events = Vec::new();
        {
            let mut state = self.lock_state();
            let missing: Vec<Uuid> = {
                let bead = state.beads.get(&id).ok_or(DomainError::BeadNotFound(id))?;
                bead.dependencies
                    .iter()
                    .copied()
                    .filter(|dep| {
                        state.beads.get(dep).map(|b| b.status) != Some(BeadStatus::Completed)
                    })
                    .collect()
            };
            if !missing.is_empty() {
                return Err(DomainError::DependenciesUnmet {
                    bead_id: id,
                    missing,
                });
            }
            let bead = state.beads.get_mut(&id).ok_or(DomainError::BeadNotFound(id))?;
            if bead.status == BeadStatus::Backlog {
                Self::transition(bead, BeadStatus::Queued)?;
            }
            Self::transition(bead, BeadStatus::Assigned)?;
            bead.assigned_polecat = Some(polecat_id);
            events.push(FleetEvent::BeadAssigned {
                bead_id: id,
                polecat_id,
            });
        }
        self.emit_all(events);
        Ok(())
    }

    /// Undo an assignment that never became a session: `assigned ->
    /// queued`, clearing the worker.
    pub fn unassign_bead(&self, id: Uuid) -> DomainResult<()> {
        let mut state = self.lock_state();
        let bead = state.beads.get_mut(&id).ok_or(DomainError::BeadNotFound(id))?;
        Self::transition(bead, BeadStatus::Queued)?;
        bead.assigned_polecat = None;
        Ok(())
    }

    /// Mark a session as underway: `assigned -> in_progress`.
    pub fn start_bead(&self, id: Uuid) -> DomainResult<()> {
        let mut state = self.lock_state();
        let bead = state.beads.get_mut(&id).ok_or(DomainError::BeadNotFound(id))?;
        Self::transition(bead, BeadStatus::InProgress)
    }

    /// Record a finished attempt: `in_progress -> verifying`, then
    /// `-> completed` on a passing verdict or `-> requeued` (or
    /// terminal `failed` once the retry budget is spent) on a failing
    /// one. Consumes one attempt either way and cascades a convoy
    /// progress refresh.
    pub fn complete_bead(
        &self,
        id: Uuid,
        result: BeadResult,
        verification: VerificationVerdict,
    ) -> DomainResult<BeadStatus> {
        let mut events = Vec::new();
        let final_status;
        {
            let mut state = self.lock_state();
            let bead = state.beads.get_mut(&id).ok_or(DomainError::BeadNotFound(id))?;
            Self::transition(bead, BeadStatus::Verifying)?;
            bead.attempt += 1;
            let passed = verification.passed;
            let errors = verification.errors.clone();
            let polecat_id = bead.assigned_polecat;
            bead.last_result = Some(result);
            bead.last_verification = Some(verification);

            if passed {
                Self::transition(bead, BeadStatus::Completed)?;
                bead.completed_at = Some(Utc::now());
                events.push(FleetEvent::VerificationPassed {
                    bead_id: id,
                    polecat_id,
                });
            } else {
                events.push(FleetEvent::VerificationFailed {
                    bead_id: id,
                    errors: errors.clone(),
                });
                if bead.attempts_exhausted() {
                    Self::transition(bead, BeadStatus::Failed)?;
                } else {
                    Self::transition(bead, BeadStatus::Requeued)?;
                    bead.assigned_polecat = None;
                    let reason = if errors.is_empty() {
                        "verification failed".to_string()
                    } else {
                        format!("verification failed: {}", errors.join("; "))
                    };
                    events.push(FleetEvent::BeadRequeued {
                        bead_id: id,
                        reason,
                        attempt: bead.attempt,
                    });
                }
            }
            final_status = bead.status;

            if let Some(convoy_id) = bead.convoy_id {
                // A missing convoy is a registration bug; it must not
                // roll back the bead's completion.
                if let Err(err) = Self::refresh_convoy_locked(&mut state, convoy_id, &mut events)
                {
                    warn!(convoy_id = %convoy_id, error = %err, "convoy refresh failed");
                }
            }
        }
        self.emit_all(events);
        Ok(final_status)
    }

    /// Return an in-flight bead to the queue after a crash or forced
    /// abort. Terminal `failed` once the retry budget is spent;
    /// otherwise clears the worker, consumes an attempt, and re-queues.
    pub fn requeue_bead(&self, id: Uuid, reason: &str) -> DomainResult<BeadStatus> {
        let mut events = Vec::new();
        let final_status;
        {
            let mut state = self.lock_state();
            let bead = state.beads.get_mut(&id).ok_or(DomainError::BeadNotFound(id))?;
            // The aborted attempt counts against the budget, so the
            // counter can never exceed max_attempts. Validate the
            // transition before touching the counter so a rejected
            // requeue leaves the bead untouched.
            let target = if bead.attempt + 1 >= bead.max_attempts {
                BeadStatus::Failed
            } else {
                BeadStatus::Requeued
            };
            Self::transition(bead, target)?;
            bead.attempt += 1;
            if target == BeadStatus::Requeued {
                bead.assigned_polecat = None;
                Self::transition(bead, BeadStatus::Queued)?;
                events.push(FleetEvent::BeadRequeued {
                    bead_id: id,
                    reason: reason.to_string(),
                    attempt: bead.attempt,
                });
            }
            final_status = bead.status;
            if let Some(convoy_id) = bead.convoy_id {
                if let Err(err) = Self::refresh_convoy_locked(&mut state, convoy_id, &mut events)
                {
                    warn!(convoy_id = %convoy_id, error = %err, "convoy refresh failed");
                }
            }
        }
        self.emit_all(events);
        Ok(final_status)
    }

    /// Move every bead parked in `requeued` back to `queued` so the
    /// next scheduling tick can pick it up. Returns the promoted ids.
    pub fn promote_requeued(&self) -> Vec<Uuid> {
        let mut state = self.lock_state();
        let mut promoted = Vec::new();
        for bead in state.beads.values_mut() {
            if bead.status == BeadStatus::Requeued {
                // Infallible per the transition table.
                if Self::transition(bead, BeadStatus::Queued).is_ok() {
                    promoted.push(bead.id);
                }
            }
        }
        promoted
    }

    /// All queued beads whose dependencies are completed, highest
    /// priority first, stable within equal priority.
    pub fn get_ready_beads(&self) -> Vec<Bead> {
        let state = self.lock_state();
        let mut ready: Vec<Bead> = state
            .beads
            .values()
            .filter(|bead| {
                bead.status == BeadStatus::Queued
                    && bead.dependencies.iter().all(|dep| {
                        state.beads.get(dep).map(|b| b.status) == Some(BeadStatus::Completed)
                    })
            })
            .cloned()
            .collect();
        // HashMap iteration order is arbitrary; anchor on creation time
        // before the stable priority sort so equal-priority order is
        // deterministic.
        ready.sort_by_key(|bead| bead.created_at);
        ready.sort_by(|a, b| b.priority.cmp(&a.priority));
        ready
    }

    /// Promote a backlog bead into the queue.
    pub fn enqueue_bead(&self, id: Uuid) -> DomainResult<()> {
        let mut state = self.lock_state();
        let bead = state.beads.get_mut(&id).ok_or(DomainError::BeadNotFound(id))?;
        Self::transition(bead, BeadStatus::Queued)
    }

    pub fn get_bead(&self, id: Uuid) -> Option<Bead> {
        self.lock_state().beads.get(&id).cloned()
    }

    pub fn get_convoy(&self, id: Uuid) -> Option<Convoy> {
        self.lock_state().convoys.get(&id).cloned()
    }

    /// Recompute a convoy's progress and derived status from its beads'
    /// current states.
    pub fn refresh_convoy(&self, id: Uuid) -> DomainResult<ConvoyProgress> {
        let mut events = Vec::new();
        let progress = {
            let mut state = self.lock_state();
            Self::refresh_convoy_locked(&mut state, id, &mut events)?
        };
        self.emit_all(events);
        Ok(progress)
    }

    fn refresh_convoy_locked(
        state: &mut StoreState,
        convoy_id: Uuid,
        events: &mut Vec<FleetEvent>,
    ) -> DomainResult<ConvoyProgress> {
        let statuses: Vec<BeadStatus> = {
            let convoy = state
                .convoys
                .get(&convoy_id)
                .ok_or(DomainError::ConvoyNotFound(convoy_id))?;
            convoy
                .bead_ids
                .iter()
                .filter_map(|id| state.beads.get(id).map(|b| b.status))
                .collect()
        };
        let progress = ConvoyProgress::from_statuses(statuses.iter().copied());
        let new_status = ConvoyStatus::derive(statuses);

        let convoy = state
            .convoys
            .get_mut(&convoy_id)
            .ok_or(DomainError::ConvoyNotFound(convoy_id))?;
        let was_terminal = convoy.status.is_terminal();
        convoy.progress = progress;
        convoy.status = new_status;
        if !was_terminal && new_status.is_terminal() {
            convoy.completed_at = Some(Utc::now());
            events.push(FleetEvent::ConvoyCompleted {
                convoy_id,
                name: convoy.name.clone(),
                succeeded: new_status == ConvoyStatus::Completed,
            });
        }
        Ok(progress)
    }

    /// Aggregate counts for telemetry.
    pub fn get_fleet_snapshot(&self) -> StoreSnapshot {
        let state = self.lock_state();
        let mut beads = BeadStatusCounts::default();
        for bead in state.beads.values() {
            match bead.status {
                BeadStatus::Backlog => beads.backlog += 1,
                BeadStatus::Queued => beads.queued += 1,
                BeadStatus::Assigned => beads.assigned += 1,
                BeadStatus::InProgress => beads.in_progress += 1,
                BeadStatus::Verifying => beads.verifying += 1,
                BeadStatus::Requeued => beads.requeued += 1,
                BeadStatus::Completed => beads.completed += 1,
                BeadStatus::Failed => beads.failed += 1,
            }
        }
        let mut convoys = ConvoySummary::default();
        let mut percent_sum = 0.0;
        for convoy in state.convoys.values() {
            convoys.total += 1;
            percent_sum += convoy.progress.percent_complete;
            match convoy.status {
                ConvoyStatus::Completed => convoys.completed += 1,
                ConvoyStatus::Failed => convoys.failed += 1,
                ConvoyStatus::Active => convoys.active += 1,
                ConvoyStatus::Forming => {}
            }
        }
        if convoys.total > 0 {
            convoys.average_percent_complete = percent_sum / convoys.total as f64;
        }
        StoreSnapshot { beads, convoys }
    }
}

impl Default for ConvoyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BeadPriority, Originator};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn passing() -> VerificationVerdict {
        VerificationVerdict::passing()
    }

    fn failing() -> VerificationVerdict {
        VerificationVerdict::failing(vec!["tests failed".into()])
    }

    fn ok_result() -> BeadResult {
        BeadResult {
            success: true,
            output: "done".into(),
            changes: None,
            error: None,
        }
    }

    #[test]
    fn assign_requires_known_bead() {
        let store = ConvoyStore::new();
        let err = store.assign_bead(Uuid::new_v4(), Uuid::new_v4());
        assert!(matches!(err, Err(DomainError::BeadNotFound(_))));
    }

    #[test]
    fn assign_blocked_by_incomplete_dependency() {
        let store = ConvoyStore::new();
        let dep = Bead::new("dep", "backend");
        let dep_id = store.add_bead(dep);
        let bead = Bead::new("child", "backend").with_dependencies(vec![dep_id]);
        let bead_id = store.add_bead(bead);

        let err = store.assign_bead(bead_id, Uuid::new_v4());
        assert!(matches!(err, Err(DomainError::DependenciesUnmet { .. })));
        // Status untouched by the failed call.
        assert_eq!(store.get_bead(bead_id).unwrap().status, BeadStatus::Backlog);
    }

    #[test]
    fn illegal_transition_leaves_status_unchanged() {
        let store = ConvoyStore::new();
        let bead_id = store.add_bead(Bead::new("b", "backend"));
        // backlog -> in_progress is not in the table
        let err = store.start_bead(bead_id);
        match err {
            Err(DomainError::InvalidTransition { bead_id: id, from, to }) => {
                assert_eq!(id, bead_id);
                assert_eq!(from, BeadStatus::Backlog);
                assert_eq!(to, BeadStatus::InProgress);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
        assert_eq!(store.get_bead(bead_id).unwrap().status, BeadStatus::Backlog);
    }

    #[test]
    fn happy_path_ends_completed() {
        let store = ConvoyStore::new();
        let worker = Uuid::new_v4();
        let bead_id = store.add_bead(Bead::new("b", "backend"));
        store.assign_bead(bead_id, worker).unwrap();
        store.start_bead(bead_id).unwrap();
        let status = store.complete_bead(bead_id, ok_result(), passing()).unwrap();
        assert_eq!(status, BeadStatus::Completed);
        let bead = store.get_bead(bead_id).unwrap();
        assert_eq!(bead.attempt, 1);
        assert!(bead.completed_at.is_some());
    }

    #[test]
    fn failed_verification_requeues_and_counts_attempt() {
        let store = ConvoyStore::new();
        let worker = Uuid::new_v4();
        let bead_id = store.add_bead(Bead::new("b", "backend").with_max_attempts(2));
        store.assign_bead(bead_id, worker).unwrap();
        store.start_bead(bead_id).unwrap();

        let failed = BeadResult {
            success: false,
            output: String::new(),
            changes: None,
            error: Some("x".into()),
        };
        let status = store
            .complete_bead(bead_id, failed, VerificationVerdict::failing(vec!["x".into()]))
            .unwrap();
        assert_eq!(status, BeadStatus::Requeued);
        let bead = store.get_bead(bead_id).unwrap();
        assert_eq!(bead.attempt, 1);
        assert!(bead.assigned_polecat.is_none());

        // Second attempt passes.
        store.promote_requeued();
        store.assign_bead(bead_id, worker).unwrap();
        store.start_bead(bead_id).unwrap();
        let status = store.complete_bead(bead_id, ok_result(), passing()).unwrap();
        assert_eq!(status, BeadStatus::Completed);
        assert_eq!(store.get_bead(bead_id).unwrap().attempt, 2);
    }

    #[test]
    fn attempt_budget_exhaustion_is_terminal() {
        let store = ConvoyStore::new();
        let worker = Uuid::new_v4();
        let max = 2;
        let bead_id = store.add_bead(Bead::new("b", "backend").with_max_attempts(max));

        for round in 1..=max {
            store.promote_requeued();
            store.assign_bead(bead_id, worker).unwrap();
            store.start_bead(bead_id).unwrap();
            let status = store
                .complete_bead(bead_id, BeadResult::default(), failing())
                .unwrap();
            if round == max {
                assert_eq!(status, BeadStatus::Failed);
            } else {
                assert_eq!(status, BeadStatus::Requeued);
            }
        }
        let bead = store.get_bead(bead_id).unwrap();
        assert_eq!(bead.attempt, max);
        assert_eq!(bead.status, BeadStatus::Failed);
    }

    #[test]
    fn requeue_returns_crashed_bead_to_queue() {
        let store = ConvoyStore::new();
        let bead_id = store.add_bead(Bead::new("b", "backend"));
        store.assign_bead(bead_id, Uuid::new_v4()).unwrap();
        store.start_bead(bead_id).unwrap();

        let status = store.requeue_bead(bead_id, "worker crashed").unwrap();
        assert_eq!(status, BeadStatus::Queued);
        let bead = store.get_bead(bead_id).unwrap();
        assert_eq!(bead.attempt, 1);
        assert!(bead.assigned_polecat.is_none());
    }

    #[test]
    fn ready_beads_respect_dependencies_and_priority() {
        let store = ConvoyStore::new();
        let dep_id = store.add_bead(Bead::new("dep", "backend"));
        let blocked = Bead::new("blocked", "backend").with_dependencies(vec![dep_id]);
        let blocked_id = store.add_bead(blocked);
        let low_id = store.add_bead(Bead::new("low", "backend").with_priority(BeadPriority::Low));
        let crit_id =
            store.add_bead(Bead::new("crit", "backend").with_priority(BeadPriority::Critical));

        for id in [blocked_id, low_id, crit_id, dep_id] {
            store.enqueue_bead(id).unwrap();
        }

        let ready: Vec<Uuid> = store.get_ready_beads().iter().map(|b| b.id).collect();
        assert!(!ready.contains(&blocked_id));
        assert_eq!(ready.first(), Some(&crit_id));

        // Complete the dependency; the blocked bead becomes ready.
        let worker = Uuid::new_v4();
        store.assign_bead(dep_id, worker).unwrap();
        store.start_bead(dep_id).unwrap();
        store.complete_bead(dep_id, ok_result(), passing()).unwrap();
        let ready: Vec<Uuid> = store.get_ready_beads().iter().map(|b| b.id).collect();
        assert!(ready.contains(&blocked_id));
    }

    #[test]
    fn convoy_progress_partitions_and_completes() {
        let store = ConvoyStore::new();
        let convoy = Convoy::new("run", Originator::Human);
        let bead = Bead::new("only", "backend");
        let bead_id = bead.id;
        let convoy_id = store.add_plan(convoy, vec![bead]).unwrap();

        let worker = Uuid::new_v4();
        store.assign_bead(bead_id, worker).unwrap();
        store.start_bead(bead_id).unwrap();
        store.complete_bead(bead_id, ok_result(), passing()).unwrap();

        let convoy = store.get_convoy(convoy_id).unwrap();
        assert_eq!(convoy.status, ConvoyStatus::Completed);
        let p = convoy.progress;
        assert_eq!(p.completed + p.failed + p.in_progress + p.queued, p.total);
        assert!((p.percent_complete - 100.0).abs() < f64::EPSILON);
        assert!(convoy.completed_at.is_some());
    }

    #[test]
    fn faulty_subscriber_does_not_abort_transition() {
        let store = ConvoyStore::new();
        let seen = Arc::new(AtomicUsize::new(0));

        store.on(|_event| panic!("bad handler"));
        store.on(|_event| anyhow::bail!("failing handler"));
        let seen_clone = seen.clone();
        store.on(move |_event| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let bead_id = store.add_bead(Bead::new("b", "backend"));
        store.assign_bead(bead_id, Uuid::new_v4()).unwrap();
        assert_eq!(store.get_bead(bead_id).unwrap().status, BeadStatus::Assigned);
        // The healthy handler saw the assignment event.
        assert!(seen.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn snapshot_counts_by_status() {
        let store = ConvoyStore::new();
        store.add_bead(Bead::new("a", "backend"));
        let queued = store.add_bead(Bead::new("q", "backend"));
        store.enqueue_bead(queued).unwrap();

        let snapshot = store.get_fleet_snapshot();
        assert_eq!(snapshot.beads.backlog, 1);
        assert_eq!(snapshot.beads.queued, 1);
        assert_eq!(snapshot.beads.total(), 2);
    }
}
