//! Fleet manager: polecat lifecycle and the auto-assignment loop.
//!
//! Bridges the capability registry (which runtime can serve a role,
//! and how many concurrent sessions it allows), the hook provisioner
//! (one isolated environment per session), and the convoy store. All
//! forward progress is driven by `auto_assign`, the scheduling tick
//! that matches ready beads to idle or freshly spawned polecats.
//!
//! Failure semantics: spawn and slot-acquisition failures are soft (the
//! bead stays ready for the next tick); a crashed session always
//! returns its bead to the store with full bookkeeping, so no bead is
//! silently lost on worker failure.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{
    Bead, BeadResult, FleetEvent, FleetUtilization, Polecat, PolecatStatus, Session,
    SessionStatus, VerificationVerdict,
};
use crate::domain::ports::{CapabilityRegistry, HookProvisioner};
use crate::services::convoy_store::ConvoyStore;
use crate::services::strategy_optimizer::StrategyOptimizer;

/// Trust delta for a verified success.
pub const SCORE_SUCCESS_DELTA: f64 = 2.0;
/// Trust delta for a failed or unverified session. Failures cost more
/// than successes earn.
pub const SCORE_FAILURE_DELTA: f64 = -5.0;
/// Trust delta for a crash.
pub const SCORE_CRASH_DELTA: f64 = -10.0;

/// Parallelism ceiling used when no optimizer is attached.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// One session flagged by a health scan as running past the strategy
/// timeout.
#[derive(Debug, Clone)]
pub struct StalledSession {
    pub polecat_id: Uuid,
    pub bead_id: Uuid,
    pub elapsed_ms: i64,
}

struct FleetState {
    polecats: HashMap<Uuid, Polecat>,
    /// Polecats currently holding a runtime session slot.
    held_slots: HashSet<Uuid>,
}

/// Orchestrates worker lifecycle: spawn, session start, completion or
/// crash, retire.
pub struct FleetManager {
    store: Arc<ConvoyStore>,
    registry: Arc<dyn CapabilityRegistry>,
    provisioner: Arc<dyn HookProvisioner>,
    optimizer: Option<Arc<StrategyOptimizer>>,
    state: RwLock<FleetState>,
    auto_spawn: bool,
}

impl FleetManager {
    pub fn new(
        store: Arc<ConvoyStore>,
        registry: Arc<dyn CapabilityRegistry>,
        provisioner: Arc<dyn HookProvisioner>,
    ) -> Self {
        Self {
            store,
            registry,
            provisioner,
            optimizer: None,
            state: RwLock::new(FleetState {
                polecats: HashMap::new(),
                held_slots: HashSet::new(),
            }),
            auto_spawn: true,
        }
    }

    /// Attach the optimizer that governs parallelism and receives
    /// bandit updates on every session outcome.
    pub fn with_optimizer(mut self, optimizer: Arc<StrategyOptimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn with_auto_spawn(mut self, auto_spawn: bool) -> Self {
        self.auto_spawn = auto_spawn;
        self
    }

    /// Spawn a polecat for a role, resolving a runtime either by
    /// explicit key or by best match. Returns `None` when no runtime
    /// matches or no session slot is free; both are soft failures
    /// retried on the next scheduling tick.
    #[instrument(skip(self))]
    pub async fn spawn(
        &self,
        name: &str,
        role: &str,
        rig: &str,
        runtime_key: Option<&str>,
    ) -> Option<Uuid> {
        let runtime = match runtime_key {
            Some(key) => self.registry.get(key).await,
            None => self.registry.match_bead(role).await,
        };
        let Some(runtime) = runtime else {
            debug!(role, "no runtime matches role");
            return None;
        };
        if !self.registry.acquire_session(&runtime.key).await {
            debug!(runtime = %runtime.key, "no free session slot");
            return None;
        }

        let polecat = Polecat::new(name, role, rig, runtime.key.clone());
        let polecat_id = polecat.id;
        {
            let mut state = self.state.write().await;
            state.polecats.insert(polecat_id, polecat);
            state.held_slots.insert(polecat_id);
        }
        info!(polecat_id = %polecat_id, role, rig, "polecat spawned");
        self.store.publish(FleetEvent::PolecatSpawned {
            polecat_id,
            name: name.to_string(),
            role: role.to_string(),
            rig: rig.to_string(),
        });
        Some(polecat_id)
    }

    /// Bind a polecat to a bead: provision a hook, build the session,
    /// and mark the bead in progress. Refuses if the polecat already
    /// has an active session.
    #[instrument(skip(self, bead, workspace_root), fields(bead_id = %bead.id))]
    pub async fn start_session(
        &self,
        polecat_id: Uuid,
        bead: &Bead,
        workspace_root: &Path,
    ) -> Result<Session> {
        let (rig, runtime_key, needs_slot) = {
            let state = self.state.read().await;
            let polecat = state
                .polecats
                .get(&polecat_id)
                .ok_or(DomainError::PolecatNotFound(polecat_id))?;
            if polecat.session.is_some() {
                return Err(DomainError::SessionActive(polecat_id).into());
            }
            (
                polecat.rig.clone(),
                polecat.runtime_key.clone(),
                !state.held_slots.contains(&polecat_id),
            )
        };

        // A polecat releases its slot when a session ends; re-acquire
        // before starting the next one.
        if needs_slot && !self.registry.acquire_session(&runtime_key).await {
            anyhow::bail!("no free session slot on runtime {runtime_key}");
        }

        let hook = match self
            .provisioner
            .create_hook(workspace_root, &rig, polecat_id, &bead.title)
            .await
            .context("hook provisioning failed")
        {
            Ok(hook) => hook,
            Err(err) => {
                if needs_slot {
                    self.registry.release_session(&runtime_key).await;
                }
                return Err(err);
            }
        };

        if let Err(err) = self.store.start_bead(bead.id) {
            // The bead refused the transition; tear the hook back down.
            let _ = self.provisioner.destroy_hook(&hook, workspace_root).await;
            if needs_slot {
                self.registry.release_session(&runtime_key).await;
            }
            return Err(err.into());
        }

        let session = Session::new(bead.id, hook.clone());
        {
            let mut state = self.state.write().await;
            state.held_slots.insert(polecat_id);
            if let Some(polecat) = state.polecats.get_mut(&polecat_id) {
                polecat.session = Some(session.clone());
                polecat.status = PolecatStatus::Working;
                polecat.identity.total_sessions += 1;
            }
        }
        self.store.publish(FleetEvent::HookCreated {
            hook_id: hook.id,
            polecat_id,
            rig,
            branch: hook.branch_name.clone(),
        });
        Ok(session)
    }

    /// Close a session with its result and verification verdict.
    /// Success means the attempt succeeded *and* verification passed.
    /// Returns whether the session counted as a success.
    #[instrument(skip(self, result, verification, workspace_root))]
    pub async fn complete_session(
        &self,
        polecat_id: Uuid,
        result: BeadResult,
        verification: VerificationVerdict,
        workspace_root: &Path,
    ) -> Result<bool> {
        let success = result.success && verification.passed;
        let lines_changed = result.changes.as_ref().map_or(0, |c| c.lines_changed);

        let (session, role, runtime_key) = {
            let state = self.state.read().await;
            let polecat = state
                .polecats
                .get(&polecat_id)
                .ok_or(DomainError::PolecatNotFound(polecat_id))?;
            let session = polecat
                .session
                .clone()
                .ok_or(DomainError::SessionNotActive(polecat_id))?;
            (session, polecat.role.clone(), polecat.runtime_key.clone())
        };
        let duration_ms = session.elapsed_ms();

        self.store
            .complete_bead(session.bead_id, result, verification.clone())?;

        {
            let mut state = self.state.write().await;
            state.held_slots.remove(&polecat_id);
            if let Some(polecat) = state.polecats.get_mut(&polecat_id) {
                polecat.session = None;
                polecat.status = PolecatStatus::Idle;
                polecat.stats.record_session(
                    success,
                    duration_ms as f64,
                    verification.passed,
                    lines_changed,
                );
                if success {
                    polecat.identity.total_completions += 1;
                    polecat.identity.adjust_score(SCORE_SUCCESS_DELTA);
                } else {
                    polecat.identity.adjust_score(SCORE_FAILURE_DELTA);
                }
            }
        }

        self.registry.release_session(&runtime_key).await;
        if let Err(err) = self
            .provisioner
            .destroy_hook(&session.hook, workspace_root)
            .await
        {
            warn!(hook_id = %session.hook.id, error = %err, "hook teardown failed");
        }
        if success {
            self.store.publish(FleetEvent::HookMerged {
                hook_id: session.hook.id,
                polecat_id,
                branch: session.hook.branch_name.clone(),
            });
        }
        self.store.publish(FleetEvent::PolecatCompleted {
            polecat_id,
            bead_id: session.bead_id,
            success,
            duration_ms,
        });
        if let Some(optimizer) = &self.optimizer {
            optimizer.update_bandit(&role, success);
        }
        Ok(success)
    }

    /// Treat the in-flight bead as failed for this attempt: requeue it,
    /// penalize the polecat's trust score, and free the runtime slot.
    /// The session's hook is parked on the polecat and destroyed on
    /// retire.
    #[instrument(skip(self))]
    pub async fn crash_session(&self, polecat_id: Uuid, error: &str) -> Result<()> {
        let (session, role, runtime_key) = {
            let mut state = self.state.write().await;
            let polecat = state
                .polecats
                .get_mut(&polecat_id)
                .ok_or(DomainError::PolecatNotFound(polecat_id))?;
            let session = polecat
                .session
                .take()
                .ok_or(DomainError::SessionNotActive(polecat_id))?;
            polecat.status = PolecatStatus::Idle;
            polecat.stats.record_crash(session.elapsed_ms() as f64);
            polecat.identity.adjust_score(SCORE_CRASH_DELTA);
            polecat.orphaned_hook = Some(session.hook.clone());
            let role = polecat.role.clone();
            let runtime_key = polecat.runtime_key.clone();
            state.held_slots.remove(&polecat_id);
            (session, role, runtime_key)
        };

        warn!(bead_id = %session.bead_id, error, "session crashed");
        self.store.requeue_bead(session.bead_id, error)?;
        self.registry.release_session(&runtime_key).await;
        self.store.publish(FleetEvent::PolecatCrashed {
            polecat_id,
            bead_id: Some(session.bead_id),
            error: error.to_string(),
        });
        if let Some(optimizer) = &self.optimizer {
            optimizer.update_bandit(&role, false);
        }
        Ok(())
    }

    /// Remove a polecat entirely. An active session is crashed first
    /// (forced); the stored hook is then destroyed best-effort, since
    /// the workspace may already be gone.
    #[instrument(skip(self, workspace_root))]
    pub async fn retire(&self, polecat_id: Uuid, workspace_root: &Path) -> Result<()> {
        let has_session = {
            let state = self.state.read().await;
            state
                .polecats
                .get(&polecat_id)
                .ok_or(DomainError::PolecatNotFound(polecat_id))?
                .session
                .is_some()
        };
        if has_session {
            if let Err(err) = self.crash_session(polecat_id, "retired with active session").await
            {
                warn!(error = %err, "forced crash during retire failed");
            }
        }

        let removed = {
            let mut state = self.state.write().await;
            state.held_slots.remove(&polecat_id);
            state.polecats.remove(&polecat_id)
        };
        if let Some(polecat) = removed {
            if let Some(hook) = polecat.orphaned_hook {
                if let Err(err) = self.provisioner.destroy_hook(&hook, workspace_root).await {
                    debug!(hook_id = %hook.id, error = %err, "orphaned hook already gone");
                }
            }
            info!(polecat_id = %polecat_id, "polecat retired");
        }
        Ok(())
    }

    /// The scheduling tick. Pulls ready beads, matches each to an idle
    /// polecat of the bead's role (spawning one when allowed), and
    /// starts sessions, bounded by the active strategy's parallelism
    /// ceiling. Returns the ids of beads successfully dispatched.
    #[instrument(skip(self, workspace_root))]
    pub async fn auto_assign(&self, rig: &str, workspace_root: &Path) -> Result<Vec<Uuid>> {
        let max_parallel = self
            .optimizer
            .as_ref()
            .map_or(DEFAULT_MAX_PARALLEL, |o| {
                o.get_current_strategy().max_parallel_tasks
            });

        self.store.promote_requeued();
        let ready = self.store.get_ready_beads();
        let mut dispatched = Vec::new();

        for bead in ready {
            if self.active_sessions().await >= max_parallel {
                debug!(max_parallel, "parallelism ceiling reached");
                break;
            }

            let polecat_id = match self.find_idle(&bead.role).await {
                Some(id) => Some(id),
                None if self.auto_spawn => {
                    let name = format!("{}-{}", bead.role, &bead.id.simple().to_string()[..6]);
                    self.spawn(&name, &bead.role, rig, None).await
                }
                None => None,
            };
            let Some(polecat_id) = polecat_id else {
                debug!(bead_id = %bead.id, role = %bead.role, "no polecat available");
                continue;
            };

            if let Err(err) = self.store.assign_bead(bead.id, polecat_id) {
                warn!(bead_id = %bead.id, error = %err, "assignment rejected");
                continue;
            }
            match self.start_session(polecat_id, &bead, workspace_root).await {
                Ok(_) => dispatched.push(bead.id),
                Err(err) => {
                    warn!(bead_id = %bead.id, error = %err, "session start failed");
                    if let Err(err) = self.store.unassign_bead(bead.id) {
                        warn!(bead_id = %bead.id, error = %err, "unassign failed");
                    }
                }
            }
        }
        Ok(dispatched)
    }

    async fn find_idle(&self, role: &str) -> Option<Uuid> {
        let state = self.state.read().await;
        state
            .polecats
            .values()
            .find(|p| p.is_idle() && p.role == role)
            .map(|p| p.id)
    }

    /// Flag sessions running past the active strategy's timeout so an
    /// external watchdog can crash them.
    pub async fn scan_fleet(&self) -> Vec<StalledSession> {
        let timeout_ms = self
            .optimizer
            .as_ref()
            .map_or(i64::MAX, |o| o.get_current_strategy().session_timeout_ms as i64);

        let mut stalled = Vec::new();
        let scanned;
        {
            let mut state = self.state.write().await;
            scanned = state.polecats.len();
            for polecat in state.polecats.values_mut() {
                if let Some(session) = polecat.session.as_mut() {
                    let elapsed_ms = session.elapsed_ms();
                    if elapsed_ms > timeout_ms {
                        session.status = SessionStatus::Stalled;
                        stalled.push(StalledSession {
                            polecat_id: polecat.id,
                            bead_id: session.bead_id,
                            elapsed_ms,
                        });
                    }
                }
            }
        }
        self.store.publish(FleetEvent::HealthScanComplete {
            polecats_scanned: scanned,
            sessions_stalled: stalled.len(),
        });
        stalled
    }

    pub async fn get_polecat(&self, polecat_id: Uuid) -> Option<Polecat> {
        self.state.read().await.polecats.get(&polecat_id).cloned()
    }

    pub async fn list_polecats(&self) -> Vec<Polecat> {
        self.state.read().await.polecats.values().cloned().collect()
    }

    pub async fn active_sessions(&self) -> usize {
        self.state
            .read()
            .await
            .polecats
            .values()
            .filter(|p| p.session.is_some())
            .count()
    }

    /// Utilization aggregate for telemetry.
    pub async fn fleet_stats(&self) -> FleetUtilization {
        let state = self.state.read().await;
        let total = state.polecats.len();
        let active = state
            .polecats
            .values()
            .filter(|p| p.session.is_some())
            .count();
        FleetUtilization::new(total, active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BeadStatus, ChangeSummary, Hook};
    use crate::domain::ports::RuntimeDescriptor;
    use crate::services::registry::RuntimeRegistry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProvisioner {
        created: AtomicUsize,
        destroyed: AtomicUsize,
    }

    impl FakeProvisioner {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                created: AtomicUsize::new(0),
                destroyed: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HookProvisioner for FakeProvisioner {
        async fn create_hook(
            &self,
            _workspace_root: &Path,
            rig: &str,
            polecat_id: Uuid,
            _description: &str,
        ) -> Result<Hook> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Hook::new(
                rig,
                polecat_id,
                format!("/tmp/hooks/{polecat_id}"),
                format!("polecat/{rig}/{polecat_id}"),
            ))
        }

        async fn destroy_hook(&self, _hook: &Hook, _workspace_root: &Path) -> Result<()> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn registry_with(key: &str, roles: &[&str], max_sessions: usize) -> Arc<RuntimeRegistry> {
        let registry = RuntimeRegistry::new();
        registry.register(RuntimeDescriptor {
            key: key.into(),
            display_name: key.into(),
            roles: roles.iter().map(|r| (*r).to_string()).collect(),
            max_sessions,
        });
        Arc::new(registry)
    }

    fn manager(
        store: &Arc<ConvoyStore>,
        registry: Arc<RuntimeRegistry>,
        provisioner: Arc<FakeProvisioner>,
    ) -> FleetManager {
        FleetManager::new(Arc::clone(store), registry, provisioner)
    }

    fn workspace() -> &'static Path {
        Path::new("/tmp/rig")
    }

    #[tokio::test]
    async fn spawn_fails_softly_without_matching_runtime() {
        let store = Arc::new(ConvoyStore::new());
        let fleet = manager(
            &store,
            registry_with("rt", &["frontend"], 2),
            FakeProvisioner::new(),
        );
        assert!(fleet.spawn("nux", "backend", "citadel", None).await.is_none());
    }

    #[tokio::test]
    async fn spawn_respects_session_ceiling() {
        let store = Arc::new(ConvoyStore::new());
        let fleet = manager(
            &store,
            registry_with("rt", &["backend"], 1),
            FakeProvisioner::new(),
        );
        assert!(fleet.spawn("a", "backend", "citadel", None).await.is_some());
        assert!(fleet.spawn("b", "backend", "citadel", None).await.is_none());
    }

    #[tokio::test]
    async fn complete_session_updates_stats_and_frees_slot() {
        let store = Arc::new(ConvoyStore::new());
        let registry = registry_with("rt", &["backend"], 1);
        let provisioner = FakeProvisioner::new();
        let fleet = manager(&store, Arc::clone(&registry), Arc::clone(&provisioner));

        let bead = Bead::new("b", "backend");
        let bead_id = store.add_bead(bead.clone());
        let polecat_id = fleet.spawn("nux", "backend", "citadel", None).await.unwrap();
        store.assign_bead(bead_id, polecat_id).unwrap();
        fleet
            .start_session(polecat_id, &bead, workspace())
            .await
            .unwrap();

        let result = BeadResult {
            success: true,
            output: "done".into(),
            changes: Some(ChangeSummary {
                files_changed: 2,
                lines_changed: 40,
            }),
            error: None,
        };
        let success = fleet
            .complete_session(polecat_id, result, VerificationVerdict::passing(), workspace())
            .await
            .unwrap();
        assert!(success);

        let polecat = fleet.get_polecat(polecat_id).await.unwrap();
        assert!(polecat.session.is_none());
        assert_eq!(polecat.stats.completed, 1);
        assert_eq!(polecat.stats.total_lines_changed, 40);
        assert!(
            (polecat.identity.performance_score
                - (crate::domain::models::INITIAL_PERFORMANCE_SCORE + SCORE_SUCCESS_DELTA))
                .abs()
                < f64::EPSILON
        );
        assert_eq!(store.get_bead(bead_id).unwrap().status, BeadStatus::Completed);
        assert_eq!(provisioner.destroyed.load(Ordering::SeqCst), 1);
        // Slot freed: the runtime can host another session.
        assert!(registry.acquire_session("rt").await);
    }

    #[tokio::test]
    async fn crash_requeues_bead_and_parks_hook() {
        let store = Arc::new(ConvoyStore::new());
        let provisioner = FakeProvisioner::new();
        let fleet = manager(
            &store,
            registry_with("rt", &["backend"], 1),
            Arc::clone(&provisioner),
        );

        let bead = Bead::new("b", "backend");
        let bead_id = store.add_bead(bead.clone());
        let polecat_id = fleet.spawn("nux", "backend", "citadel", None).await.unwrap();
        store.assign_bead(bead_id, polecat_id).unwrap();
        fleet
            .start_session(polecat_id, &bead, workspace())
            .await
            .unwrap();

        fleet.crash_session(polecat_id, "watchdog timeout").await.unwrap();

        let bead = store.get_bead(bead_id).unwrap();
        assert_eq!(bead.status, BeadStatus::Queued);
        assert_eq!(bead.attempt, 1);

        let polecat = fleet.get_polecat(polecat_id).await.unwrap();
        assert!(polecat.orphaned_hook.is_some());
        assert!(
            (polecat.identity.performance_score
                - (crate::domain::models::INITIAL_PERFORMANCE_SCORE + SCORE_CRASH_DELTA))
                .abs()
                < f64::EPSILON
        );
        // Hook is kept until retire.
        assert_eq!(provisioner.destroyed.load(Ordering::SeqCst), 0);

        fleet.retire(polecat_id, workspace()).await.unwrap();
        assert_eq!(provisioner.destroyed.load(Ordering::SeqCst), 1);
        assert!(fleet.get_polecat(polecat_id).await.is_none());
    }

    #[tokio::test]
    async fn retire_crashes_active_session_first() {
        let store = Arc::new(ConvoyStore::new());
        let fleet = manager(
            &store,
            registry_with("rt", &["backend"], 1),
            FakeProvisioner::new(),
        );

        let bead = Bead::new("b", "backend");
        let bead_id = store.add_bead(bead.clone());
        let polecat_id = fleet.spawn("nux", "backend", "citadel", None).await.unwrap();
        store.assign_bead(bead_id, polecat_id).unwrap();
        fleet
            .start_session(polecat_id, &bead, workspace())
            .await
            .unwrap();

        fleet.retire(polecat_id, workspace()).await.unwrap();
        // The in-flight bead went back to the queue, not lost.
        assert_eq!(store.get_bead(bead_id).unwrap().status, BeadStatus::Queued);
    }

    #[tokio::test]
    async fn auto_assign_dispatches_ready_beads() {
        let store = Arc::new(ConvoyStore::new());
        let fleet = manager(
            &store,
            registry_with("rt", &["backend"], 4),
            FakeProvisioner::new(),
        );

        let first = store.add_bead(Bead::new("first", "backend"));
        let second = Bead::new("second", "backend").with_dependencies(vec![first]);
        let second_id = store.add_bead(second);
        store.enqueue_bead(first).unwrap();
        store.enqueue_bead(second_id).unwrap();

        let dispatched = fleet.auto_assign("citadel", workspace()).await.unwrap();
        assert_eq!(dispatched, vec![first]);
        assert_eq!(
            store.get_bead(first).unwrap().status,
            BeadStatus::InProgress
        );
        // The dependent bead stays queued until its dependency completes.
        assert_eq!(store.get_bead(second_id).unwrap().status, BeadStatus::Queued);
    }

    #[tokio::test]
    async fn auto_assign_honors_parallelism_ceiling() {
        let store = Arc::new(ConvoyStore::new());
        let optimizer = Arc::new(StrategyOptimizer::with_strategy(
            crate::domain::models::Strategy::baseline().with_parallelism(1),
        ));
        let fleet = manager(
            &store,
            registry_with("rt", &["backend"], 8),
            FakeProvisioner::new(),
        )
        .with_optimizer(optimizer);

        for i in 0..3 {
            let id = store.add_bead(Bead::new(format!("b{i}"), "backend"));
            store.enqueue_bead(id).unwrap();
        }
        let dispatched = fleet.auto_assign("citadel", workspace()).await.unwrap();
        assert_eq!(dispatched.len(), 1);
        assert_eq!(fleet.active_sessions().await, 1);
    }

    #[tokio::test]
    async fn auto_assign_without_spawn_skips_unmatched_beads() {
        let store = Arc::new(ConvoyStore::new());
        let fleet = manager(
            &store,
            registry_with("rt", &["backend"], 4),
            FakeProvisioner::new(),
        )
        .with_auto_spawn(false);

        let id = store.add_bead(Bead::new("b", "backend"));
        store.enqueue_bead(id).unwrap();
        let dispatched = fleet.auto_assign("citadel", workspace()).await.unwrap();
        assert!(dispatched.is_empty());
        // Bead remains ready for the next tick.
        assert_eq!(store.get_bead(id).unwrap().status, BeadStatus::Queued);
    }

    #[tokio::test]
    async fn second_session_on_same_polecat_reacquires_slot() {
        let store = Arc::new(ConvoyStore::new());
        let registry = registry_with("rt", &["backend"], 1);
        let fleet = manager(&store, Arc::clone(&registry), FakeProvisioner::new());

        let polecat_id = fleet.spawn("nux", "backend", "citadel", None).await.unwrap();

        for round in 0..2 {
            let bead = Bead::new(format!("b{round}"), "backend");
            let bead_id = store.add_bead(bead.clone());
            store.assign_bead(bead_id, polecat_id).unwrap();
            fleet
                .start_session(polecat_id, &bead, workspace())
                .await
                .unwrap();
            fleet
                .complete_session(
                    polecat_id,
                    BeadResult {
                        success: true,
                        output: String::new(),
                        changes: None,
                        error: None,
                    },
                    VerificationVerdict::passing(),
                    workspace(),
                )
                .await
                .unwrap();
        }
        assert_eq!(registry.active_sessions("rt"), 0);
    }
}
