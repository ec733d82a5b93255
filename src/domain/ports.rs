//! Ports to the external collaborators the kernel consumes.
//!
//! The completion service, capability registry, and hook provisioner
//! are seams: the core treats them as opaque and must survive both
//! success and hard failure from each.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use super::models::{BeadResult, Hook, VerificationVerdict};

/// Everything the completion service needs to attempt a bead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub bead_id: Uuid,
    pub title: String,
    pub description: String,
    pub role: String,
    /// Isolated workspace the attempt runs in
    pub worktree_path: String,
    pub branch_name: String,
}

/// The external service that actually performs a bead's work and,
/// separately, verifies the result. Out of scope for the kernel; both
/// calls may fail hard and the caller must cope.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Attempt the task and return what happened.
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<BeadResult>;

    /// Render a verification verdict over a finished attempt.
    async fn verify(
        &self,
        request: &CompletionRequest,
        result: &BeadResult,
    ) -> anyhow::Result<VerificationVerdict>;
}

/// A runtime capable of hosting polecat sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeDescriptor {
    /// Stable key used for acquire/release bookkeeping
    pub key: String,
    pub display_name: String,
    /// Roles this runtime can serve
    pub roles: Vec<String>,
    /// Concurrent-session ceiling
    pub max_sessions: usize,
}

impl RuntimeDescriptor {
    pub fn supports_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Capability provider mapping roles to runtimes and enforcing each
/// runtime's concurrent-session ceiling.
#[async_trait]
pub trait CapabilityRegistry: Send + Sync {
    /// Best runtime currently able to serve the role, or `None`.
    async fn match_bead(&self, role: &str) -> Option<RuntimeDescriptor>;

    /// Try to take a session slot. Returns false when the ceiling is
    /// reached; the caller treats that as a soft failure.
    async fn acquire_session(&self, key: &str) -> bool;

    /// Give a session slot back. Releasing an unknown key is a no-op.
    async fn release_session(&self, key: &str);

    async fn get(&self, key: &str) -> Option<RuntimeDescriptor>;

    async fn list(&self) -> Vec<RuntimeDescriptor>;
}

/// Creates and destroys the isolated execution environment backing a
/// session.
#[async_trait]
pub trait HookProvisioner: Send + Sync {
    /// Provision a fresh hook for a session about to start.
    async fn create_hook(
        &self,
        workspace_root: &Path,
        rig: &str,
        polecat_id: Uuid,
        description: &str,
    ) -> anyhow::Result<Hook>;

    /// Tear a hook down. Must be idempotent; the workspace may already
    /// be gone.
    async fn destroy_hook(&self, hook: &Hook, workspace_root: &Path) -> anyhow::Result<()>;
}
