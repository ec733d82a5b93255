//! Default in-process capability registry.
//!
//! Maps roles to registered runtimes and enforces each runtime's
//! concurrent-session ceiling with counting-semaphore semantics:
//! a slot is acquired on spawn and released on completion, crash, or
//! retire.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::ports::{CapabilityRegistry, RuntimeDescriptor};

struct RuntimeSlot {
    descriptor: RuntimeDescriptor,
    active_sessions: usize,
}

/// In-memory registry of runtimes and their session slots.
pub struct RuntimeRegistry {
    runtimes: RwLock<HashMap<String, RuntimeSlot>>,
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self {
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    /// Add or replace a runtime. Replacing resets its slot count.
    pub fn register(&self, descriptor: RuntimeDescriptor) {
        let mut runtimes = self
            .runtimes
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        runtimes.insert(
            descriptor.key.clone(),
            RuntimeSlot {
                descriptor,
                active_sessions: 0,
            },
        );
    }

    /// Sessions currently held against a runtime.
    pub fn active_sessions(&self, key: &str) -> usize {
        self.runtimes
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .map_or(0, |slot| slot.active_sessions)
    }
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CapabilityRegistry for RuntimeRegistry {
    async fn match_bead(&self, role: &str) -> Option<RuntimeDescriptor> {
        let runtimes = self
            .runtimes
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // Among runtimes serving the role with a free slot, prefer the
        // one with the most headroom.
        runtimes
            .values()
            .filter(|slot| {
                slot.descriptor.supports_role(role)
                    && slot.active_sessions < slot.descriptor.max_sessions
            })
            .max_by_key(|slot| slot.descriptor.max_sessions - slot.active_sessions)
            .map(|slot| slot.descriptor.clone())
    }

    async fn acquire_session(&self, key: &str) -> bool {
        let mut runtimes = self
            .runtimes
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match runtimes.get_mut(key) {
            Some(slot) if slot.active_sessions < slot.descriptor.max_sessions => {
                slot.active_sessions += 1;
                debug!(runtime = key, active = slot.active_sessions, "session slot acquired");
                true
            }
            _ => false,
        }
    }

    async fn release_session(&self, key: &str) {
        let mut runtimes = self
            .runtimes
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(slot) = runtimes.get_mut(key) {
            slot.active_sessions = slot.active_sessions.saturating_sub(1);
            debug!(runtime = key, active = slot.active_sessions, "session slot released");
        }
    }

    async fn get(&self, key: &str) -> Option<RuntimeDescriptor> {
        self.runtimes
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .map(|slot| slot.descriptor.clone())
    }

    async fn list(&self) -> Vec<RuntimeDescriptor> {
        self.runtimes
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .map(|slot| slot.descriptor.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(key: &str, roles: &[&str], max_sessions: usize) -> RuntimeDescriptor {
        RuntimeDescriptor {
            key: key.into(),
            display_name: key.to_uppercase(),
            roles: roles.iter().map(|r| (*r).to_string()).collect(),
            max_sessions,
        }
    }

    #[tokio::test]
    async fn match_prefers_runtime_with_headroom() {
        let registry = RuntimeRegistry::new();
        registry.register(runtime("small", &["backend"], 1));
        registry.register(runtime("large", &["backend"], 4));

        let matched = registry.match_bead("backend").await.unwrap();
        assert_eq!(matched.key, "large");
        assert!(registry.match_bead("frontend").await.is_none());
    }

    #[tokio::test]
    async fn ceiling_is_enforced_and_released() {
        let registry = RuntimeRegistry::new();
        registry.register(runtime("rt", &["backend"], 2));

        assert!(registry.acquire_session("rt").await);
        assert!(registry.acquire_session("rt").await);
        assert!(!registry.acquire_session("rt").await);

        registry.release_session("rt").await;
        assert!(registry.acquire_session("rt").await);
        assert_eq!(registry.active_sessions("rt"), 2);
    }

    #[tokio::test]
    async fn exhausted_runtime_stops_matching() {
        let registry = RuntimeRegistry::new();
        registry.register(runtime("rt", &["backend"], 1));
        assert!(registry.acquire_session("rt").await);
        assert!(registry.match_bead("backend").await.is_none());
    }

    #[tokio::test]
    async fn release_of_unknown_key_is_noop() {
        let registry = RuntimeRegistry::new();
        registry.release_session("ghost").await;
        assert_eq!(registry.active_sessions("ghost"), 0);
    }
}
