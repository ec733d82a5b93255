//! Git-worktree hook provisioner.
//!
//! Provisions one isolated checkout per session so polecats can work in
//! parallel against the same rig without conflicts. Each hook gets its
//! own branch and worktree directory under the workspace root.
//!
//! # Naming convention
//!
//! - Branch: `polecat/<rig>/<short-polecat-id>`
//! - Worktree path: `<workspace_root>/.gastown/hooks/<hook-short-id>`

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::Hook;
use crate::domain::ports::HookProvisioner;

/// Provisions hooks as git worktrees.
pub struct GitHookProvisioner;

impl GitHookProvisioner {
    pub fn new() -> Self {
        Self
    }

    async fn run_git(workspace_root: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(workspace_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("failed to run git {}", args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git {} failed: {}", args.join(" "), stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for GitHookProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HookProvisioner for GitHookProvisioner {
    #[instrument(skip(self, workspace_root, description))]
    async fn create_hook(
        &self,
        workspace_root: &Path,
        rig: &str,
        polecat_id: Uuid,
        description: &str,
    ) -> Result<Hook> {
        let hook_id = Uuid::new_v4();
        let short_polecat = &polecat_id.simple().to_string()[..8];
        let short_hook = &hook_id.simple().to_string()[..8];
        let branch_name = format!("polecat/{rig}/{short_polecat}");
        let worktree_path = workspace_root
            .join(".gastown")
            .join("hooks")
            .join(short_hook);
        let worktree_str = worktree_path.display().to_string();

        Self::run_git(
            workspace_root,
            &["worktree", "add", "-b", &branch_name, &worktree_str, "HEAD"],
        )
        .await
        .with_context(|| format!("provisioning hook for polecat {polecat_id}"))?;

        info!(branch = %branch_name, path = %worktree_str, %description, "hook provisioned");
        let mut hook = Hook::new(rig, polecat_id, worktree_str, branch_name);
        hook.id = hook_id;
        Ok(hook)
    }

    #[instrument(skip(self, workspace_root, hook), fields(hook_id = %hook.id))]
    async fn destroy_hook(&self, hook: &Hook, workspace_root: &Path) -> Result<()> {
        // The worktree may already be gone; removal failure is reported
        // but branch cleanup is still attempted.
        if let Err(err) = Self::run_git(
            workspace_root,
            &["worktree", "remove", "--force", &hook.worktree_path],
        )
        .await
        {
            warn!(error = %err, path = %hook.worktree_path, "worktree removal failed");
        }

        if let Err(err) =
            Self::run_git(workspace_root, &["branch", "-D", &hook.branch_name]).await
        {
            debug!(error = %err, branch = %hook.branch_name, "branch cleanup skipped");
        }
        Ok(())
    }
}
