//! Append-only, indexed ledger of every FleetEvent.
//!
//! A secondary index maps each referenced entity id to the positions of
//! entries mentioning it, so per-entity lookups never scan the full
//! log. Retention pruning rebuilds the index atomically before
//! returning; it is designed to run periodically, not on every append.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{EntityKind, FleetEvent, LedgerEntry};
use crate::services::convoy_store::ConvoyStore;

/// Version stamp of the serialized ledger form.
pub const LEDGER_FORMAT_VERSION: u32 = 1;

type LedgerHandler = Box<dyn Fn(&LedgerEntry) -> anyhow::Result<()> + Send + Sync>;

/// Filtered, paginated ledger query. Filters apply in the order
/// time -> type -> entity, then pagination.
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub event_types: Option<Vec<String>>,
    pub entity_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl LedgerQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn event_types(mut self, types: Vec<String>) -> Self {
        self.event_types = Some(types);
        self
    }

    pub fn entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Result page of a ledger query.
#[derive(Debug, Clone)]
pub struct LedgerQueryResult {
    pub entries: Vec<LedgerEntry>,
    /// Matches before pagination
    pub total: usize,
    pub has_more: bool,
}

/// Reconstructed history of one entity.
#[derive(Debug, Clone)]
pub struct EntityTimeline {
    pub entity_id: String,
    /// Inferred from the first event referencing the entity
    pub kind: Option<EntityKind>,
    pub entries: Vec<LedgerEntry>,
}

/// Retention limits applied by `prune`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionPolicy {
    /// Drop entries older than this
    pub max_age: Option<Duration>,
    /// Then trim to this many entries, oldest first
    pub max_entries: Option<usize>,
}

/// Serialized, JSON-safe form of the ledger. Timestamps render as
/// ISO-8601 strings through chrono's serde, so any storage layer can
/// persist and restore the log byte-for-byte.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedLedger {
    pub version: u32,
    pub entries: Vec<LedgerEntry>,
}

#[derive(Default)]
struct LedgerState {
    entries: Vec<LedgerEntry>,
    entity_index: HashMap<String, Vec<usize>>,
}

impl LedgerState {
    fn index_entry(&mut self, position: usize) {
        for id in self.entries[position].event.entity_ids() {
            self.entity_index.entry(id).or_default().push(position);
        }
    }

    fn rebuild_index(&mut self) {
        self.entity_index.clear();
        for position in 0..self.entries.len() {
            self.index_entry(position);
        }
    }
}

/// Append-only event log with entity-indexed lookups.
pub struct EventLedger {
    state: RwLock<LedgerState>,
    handlers: RwLock<Vec<LedgerHandler>>,
}

impl EventLedger {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener invoked on every append. Handler errors are
    /// swallowed; an appended entry is never rolled back.
    pub fn on<F>(&self, handler: F)
    where
        F: Fn(&LedgerEntry) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// Append one event, assigning id and timestamp and indexing every
    /// entity id the event references.
    pub fn append(
        &self,
        event: FleetEvent,
        town_id: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> LedgerEntry {
        let mut entry = LedgerEntry::new(town_id, event);
        entry.metadata = metadata;
        {
            let mut state = self
                .state
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            state.entries.push(entry.clone());
            let position = state.entries.len() - 1;
            state.index_entry(position);
        }
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for handler in handlers.iter() {
            if let Err(err) = handler(&entry) {
                warn!(entry_id = %entry.id, error = %err, "ledger subscriber failed");
            }
        }
        entry
    }

    /// Subscribe this ledger to a store's event stream so every
    /// FleetEvent lands in the log.
    pub fn attach_store(self: &Arc<Self>, store: &ConvoyStore, town_id: impl Into<String>) {
        let ledger = Arc::clone(self);
        let town_id = town_id.into();
        store.on(move |event| {
            ledger.append(event.clone(), town_id.clone(), None);
            Ok(())
        });
    }

    /// Filtered, paginated query preserving append order.
    pub fn query(&self, query: &LedgerQuery) -> LedgerQueryResult {
        let state = self
            .state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let filtered: Vec<&LedgerEntry> = state
            .entries
            .iter()
            .filter(|entry| {
                if let Some(from) = query.from {
                    if entry.timestamp < from {
                        return false;
                    }
                }
                if let Some(to) = query.to {
                    if entry.timestamp > to {
                        return false;
                    }
                }
                true
            })
            .filter(|entry| match &query.event_types {
                Some(types) => types.iter().any(|t| t == entry.event.event_type()),
                None => true,
            })
            .filter(|entry| match &query.entity_id {
                Some(id) => entry.event.entity_ids().iter().any(|e| e == id),
                None => true,
            })
            .collect();

        let total = filtered.len();
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        let entries: Vec<LedgerEntry> = filtered
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        let has_more = offset + entries.len() < total;

        LedgerQueryResult {
            entries,
            total,
            has_more,
        }
    }

    /// Every entry referencing the given entity, in append order.
    pub fn for_entity(&self, entity_id: &str) -> Vec<LedgerEntry> {
        let state = self
            .state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state
            .entity_index
            .get(entity_id)
            .map(|positions| {
                positions
                    .iter()
                    .filter_map(|&p| state.entries.get(p))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Chronological history of one entity with its kind inferred from
    /// the first referencing event.
    pub fn get_timeline(&self, entity_id: &str) -> EntityTimeline {
        let entries = self.for_entity(entity_id);
        let kind = entries
            .first()
            .and_then(|entry| entry.event.classify_entity(entity_id));
        EntityTimeline {
            entity_id: entity_id.to_string(),
            kind,
            entries,
        }
    }

    /// Apply retention: drop entries older than `max_age`, then trim to
    /// `max_entries` keeping the most recent, then rebuild the entity
    /// index atomically. Returns how many entries were removed.
    pub fn prune(&self, policy: &RetentionPolicy) -> usize {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = state.entries.len();

        if let Some(max_age) = policy.max_age {
            let cutoff = Utc::now() - max_age;
            state.entries.retain(|entry| entry.timestamp >= cutoff);
        }
        if let Some(max_entries) = policy.max_entries {
            let len = state.entries.len();
            if len > max_entries {
                state.entries.drain(0..len - max_entries);
            }
        }

        state.rebuild_index();
        before - state.entries.len()
    }

    /// Lossless, versioned snapshot of the log.
    pub fn serialize(&self) -> SerializedLedger {
        let state = self
            .state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        SerializedLedger {
            version: LEDGER_FORMAT_VERSION,
            entries: state.entries.clone(),
        }
    }

    /// Restore a ledger from its serialized form, rebuilding the entity
    /// index.
    pub fn deserialize(serialized: SerializedLedger) -> DomainResult<Self> {
        if serialized.version != LEDGER_FORMAT_VERSION {
            return Err(DomainError::SerializationError(format!(
                "unsupported ledger format version {}",
                serialized.version
            )));
        }
        let ledger = Self::new();
        {
            let mut state = ledger
                .state
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            state.entries = serialized.entries;
            state.rebuild_index();
        }
        Ok(ledger)
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the entity index, for tests and diagnostics.
    pub fn entity_index(&self) -> HashMap<String, Vec<usize>> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entity_index
            .clone()
    }
}

impl Default for EventLedger {
    fn default() -> Self {
        Self::new()
    }
}
