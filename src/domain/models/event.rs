//! Fleet event vocabulary and ledger entry envelope.
//!
//! `FleetEvent` is the closed set of notifications every telemetry
//! consumer is built from. Keeping it a tagged enum means entity-id
//! extraction and report formatting are exhaustive at compile time;
//! adding a variant forces every consumer to handle it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of entity an id refers to, inferred from the field that
/// mentioned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Bead,
    Convoy,
    Polecat,
    Hook,
    Rig,
    Role,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bead => "bead",
            Self::Convoy => "convoy",
            Self::Polecat => "polecat",
            Self::Hook => "hook",
            Self::Rig => "rig",
            Self::Role => "role",
        }
    }
}

/// A state change somewhere in the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FleetEvent {
    /// A bead was claimed for a polecat.
    BeadAssigned { bead_id: Uuid, polecat_id: Uuid },

    /// A bead's attempt was consumed and it went back to the queue.
    BeadRequeued {
        bead_id: Uuid,
        reason: String,
        attempt: u32,
    },

    /// A new polecat joined the fleet.
    PolecatSpawned {
        polecat_id: Uuid,
        name: String,
        role: String,
        rig: String,
    },

    /// A polecat finished a session.
    PolecatCompleted {
        polecat_id: Uuid,
        bead_id: Uuid,
        success: bool,
        duration_ms: i64,
    },

    /// A polecat's session died without completing.
    PolecatCrashed {
        polecat_id: Uuid,
        bead_id: Option<Uuid>,
        error: String,
    },

    /// A convoy was registered.
    ConvoyCreated {
        convoy_id: Uuid,
        name: String,
        bead_count: usize,
    },

    /// A convoy derived a terminal status for the first time.
    ConvoyCompleted {
        convoy_id: Uuid,
        name: String,
        succeeded: bool,
    },

    /// An isolated environment was provisioned for a session.
    HookCreated {
        hook_id: Uuid,
        polecat_id: Uuid,
        rig: String,
        branch: String,
    },

    /// A session's hook was folded back after a verified success.
    HookMerged {
        hook_id: Uuid,
        polecat_id: Uuid,
        branch: String,
    },

    /// Verification passed for a bead's attempt.
    VerificationPassed {
        bead_id: Uuid,
        polecat_id: Option<Uuid>,
    },

    /// Verification failed for a bead's attempt.
    VerificationFailed { bead_id: Uuid, errors: Vec<String> },

    /// A planning collaborator registered a convoy plus its beads.
    PlanCreated { convoy_id: Uuid, bead_count: usize },

    /// A fleet health scan finished.
    HealthScanComplete {
        polecats_scanned: usize,
        sessions_stalled: usize,
    },
}

impl FleetEvent {
    /// Stable snake_case name of this variant, used for counters,
    /// filters, and report tables.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::BeadAssigned { .. } => "bead_assigned",
            Self::BeadRequeued { .. } => "bead_requeued",
            Self::PolecatSpawned { .. } => "polecat_spawned",
            Self::PolecatCompleted { .. } => "polecat_completed",
            Self::PolecatCrashed { .. } => "polecat_crashed",
            Self::ConvoyCreated { .. } => "convoy_created",
            Self::ConvoyCompleted { .. } => "convoy_completed",
            Self::HookCreated { .. } => "hook_created",
            Self::HookMerged { .. } => "hook_merged",
            Self::VerificationPassed { .. } => "verification_passed",
            Self::VerificationFailed { .. } => "verification_failed",
            Self::PlanCreated { .. } => "plan_created",
            Self::HealthScanComplete { .. } => "health_scan_complete",
        }
    }

    /// Every entity id this event mentions, with its kind. Drives the
    /// ledger's secondary index and timeline reconstruction.
    pub fn entity_refs(&self) -> Vec<(String, EntityKind)> {
        match self {
            Self::BeadAssigned {
                bead_id,
                polecat_id,
            } => vec![
                (bead_id.to_string(), EntityKind::Bead),
                (polecat_id.to_string(), EntityKind::Polecat),
            ],
            Self::BeadRequeued { bead_id, .. } => {
                vec![(bead_id.to_string(), EntityKind::Bead)]
            }
            Self::PolecatSpawned {
                polecat_id,
                role,
                rig,
                ..
            } => vec![
                (polecat_id.to_string(), EntityKind::Polecat),
                (role.clone(), EntityKind::Role),
                (rig.clone(), EntityKind::Rig),
            ],
            Self::PolecatCompleted {
                polecat_id,
                bead_id,
                ..
            } => vec![
                (polecat_id.to_string(), EntityKind::Polecat),
                (bead_id.to_string(), EntityKind::Bead),
            ],
            Self::PolecatCrashed {
                polecat_id,
                bead_id,
                ..
            } => {
                let mut refs = vec![(polecat_id.to_string(), EntityKind::Polecat)];
                if let Some(bead_id) = bead_id {
                    refs.push((bead_id.to_string(), EntityKind::Bead));
                }
                refs
            }
            Self::ConvoyCreated { convoy_id, .. } | Self::ConvoyCompleted { convoy_id, .. } => {
                vec![(convoy_id.to_string(), EntityKind::Convoy)]
            }
            Self::HookCreated {
                hook_id,
                polecat_id,
                rig,
                ..
            } => vec![
                (hook_id.to_string(), EntityKind::Hook),
                (polecat_id.to_string(), EntityKind::Polecat),
                (rig.clone(), EntityKind::Rig),
            ],
            Self::HookMerged {
                hook_id,
                polecat_id,
                ..
            } => vec![
                (hook_id.to_string(), EntityKind::Hook),
                (polecat_id.to_string(), EntityKind::Polecat),
            ],
            Self::VerificationPassed {
                bead_id,
                polecat_id,
            } => {
                let mut refs = vec![(bead_id.to_string(), EntityKind::Bead)];
                if let Some(polecat_id) = polecat_id {
                    refs.push((polecat_id.to_string(), EntityKind::Polecat));
                }
                refs
            }
            Self::VerificationFailed { bead_id, .. } => {
                vec![(bead_id.to_string(), EntityKind::Bead)]
            }
            Self::PlanCreated { convoy_id, .. } => {
                vec![(convoy_id.to_string(), EntityKind::Convoy)]
            }
            Self::HealthScanComplete { .. } => Vec::new(),
        }
    }

    /// The entity ids this event mentions, without kinds.
    pub fn entity_ids(&self) -> Vec<String> {
        self.entity_refs().into_iter().map(|(id, _)| id).collect()
    }

    /// Kind of the given entity id as referenced by this event, if it
    /// is mentioned at all.
    pub fn classify_entity(&self, entity_id: &str) -> Option<EntityKind> {
        self.entity_refs()
            .into_iter()
            .find(|(id, _)| id == entity_id)
            .map(|(_, kind)| kind)
    }
}

/// One immutable record in the event ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Orchestrated environment this entry belongs to
    pub town_id: String,
    pub event: FleetEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl LedgerEntry {
    pub fn new(town_id: impl Into<String>, event: FleetEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            town_id: town_id.into(),
            event,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names_are_snake_case() {
        let event = FleetEvent::BeadAssigned {
            bead_id: Uuid::new_v4(),
            polecat_id: Uuid::new_v4(),
        };
        assert_eq!(event.event_type(), "bead_assigned");
    }

    #[test]
    fn spawn_references_role_and_rig() {
        let polecat_id = Uuid::new_v4();
        let event = FleetEvent::PolecatSpawned {
            polecat_id,
            name: "nux".into(),
            role: "backend".into(),
            rig: "citadel".into(),
        };
        let ids = event.entity_ids();
        assert!(ids.contains(&polecat_id.to_string()));
        assert!(ids.contains(&"backend".to_string()));
        assert!(ids.contains(&"citadel".to_string()));
        assert_eq!(event.classify_entity("backend"), Some(EntityKind::Role));
        assert_eq!(event.classify_entity("citadel"), Some(EntityKind::Rig));
    }

    #[test]
    fn health_scan_references_nothing() {
        let event = FleetEvent::HealthScanComplete {
            polecats_scanned: 3,
            sessions_stalled: 1,
        };
        assert!(event.entity_ids().is_empty());
    }

    #[test]
    fn serde_round_trip_preserves_variant() {
        let event = FleetEvent::BeadRequeued {
            bead_id: Uuid::new_v4(),
            reason: "verification failed".into(),
            attempt: 2,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"bead_requeued\""));
        let back: FleetEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type(), "bead_requeued");
    }
}
