//! Gastown - Polecat Fleet Orchestrator
//!
//! Gastown coordinates a pool of autonomous worker agents ("polecats")
//! executing a backlog of dependent work units ("beads") grouped into
//! batches ("convoys"), while continuously learning which scheduling
//! strategy and role assignment performs best.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): pure value types, invariants, the
//!   error taxonomy, and port traits for external collaborators
//! - **Service Layer** (`services`): the scheduling kernel - convoy
//!   store, fleet manager, event ledger, metric recorder, strategy
//!   optimizer, and reporting
//! - **Infrastructure Layer** (`infrastructure`): configuration
//!   loading and logging setup
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gastown::domain::models::{Bead, BeadPriority};
//! use gastown::services::{ConvoyStore, EventLedger};
//!
//! let store = Arc::new(ConvoyStore::new());
//! let ledger = Arc::new(EventLedger::new());
//! ledger.attach_store(&store, "my-town");
//!
//! let bead = Bead::new("wire the pumps", "backend").with_priority(BeadPriority::High);
//! let bead_id = store.add_bead(bead);
//! store.enqueue_bead(bead_id).unwrap();
//! assert_eq!(store.get_ready_beads().len(), 1);
//! ```

pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Bead, BeadPriority, BeadResult, BeadStatus, Convoy, ConvoyProgress, ConvoyStatus, FleetEvent,
    Hook, LedgerEntry, MetricSnapshot, Polecat, Session, Strategy, TrendDirection,
    VerificationVerdict,
};
pub use domain::ports::{
    CapabilityRegistry, CompletionRequest, CompletionService, HookProvisioner, RuntimeDescriptor,
};
pub use infrastructure::config::{ConfigError, ConfigLoader, GastownConfig};
pub use services::{
    ConvoyStore, EventLedger, FleetManager, FleetReporter, GitHookProvisioner, LedgerQuery,
    MetricRecorder, RetentionPolicy, RuntimeRegistry, StrategyOptimizer,
};
