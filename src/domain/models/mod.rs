pub mod bead;
pub mod convoy;
pub mod event;
pub mod hook;
pub mod metrics;
pub mod polecat;
pub mod strategy;

pub use bead::{
    Bead, BeadPriority, BeadResult, BeadStatus, ChangeSummary, VerificationVerdict,
    DEFAULT_MAX_ATTEMPTS,
};
pub use convoy::{Convoy, ConvoyProgress, ConvoyStatus, Originator};
pub use event::{EntityKind, FleetEvent, LedgerEntry};
pub use hook::Hook;
pub use metrics::{
    BeadStatusCounts, ConvoySummary, FleetUtilization, MetricSnapshot, TimeSeriesPoint, Trend,
    TrendDirection,
};
pub use polecat::{
    Polecat, PolecatIdentity, PolecatStats, PolecatStatus, Session, SessionStatus,
    INITIAL_PERFORMANCE_SCORE, MAX_PERFORMANCE_SCORE, MIN_PERFORMANCE_SCORE,
};
pub use strategy::{
    AgentSelection, BanditArm, Experiment, ExperimentOutcome, ExperimentSample, ExperimentStatus,
    ExperimentWinner, Strategy, Variant, VariantPerformance, VerificationStrictness,
};
