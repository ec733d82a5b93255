//! Hook domain model.
//!
//! A hook is the isolated execution environment a session works inside:
//! a workspace checkout with its own path and branch. Hooks are created
//! when a session starts and owned exclusively by that session until
//! they are destroyed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An isolated execution environment bound to one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hook {
    /// Unique identifier
    pub id: Uuid,
    /// Rig the hook was carved out of
    pub rig: String,
    /// Polecat the hook was provisioned for
    pub polecat_id: Uuid,
    /// Filesystem path of the isolated checkout
    pub worktree_path: String,
    /// Branch the session commits to
    pub branch_name: String,
    /// When provisioned
    pub created_at: DateTime<Utc>,
}

impl Hook {
    pub fn new(
        rig: impl Into<String>,
        polecat_id: Uuid,
        worktree_path: impl Into<String>,
        branch_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rig: rig.into(),
            polecat_id,
            worktree_path: worktree_path.into(),
            branch_name: branch_name.into(),
            created_at: Utc::now(),
        }
    }
}
