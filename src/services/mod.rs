//! Service layer: the scheduling kernel.

pub mod convoy_store;
pub mod event_ledger;
pub mod fleet_manager;
pub mod hook_provisioner;
pub mod metric_recorder;
pub mod registry;
pub mod report;
pub mod strategy_optimizer;

pub use convoy_store::{ConvoyStore, StoreSnapshot};
pub use event_ledger::{
    EntityTimeline, EventLedger, LedgerQuery, LedgerQueryResult, RetentionPolicy,
    SerializedLedger, LEDGER_FORMAT_VERSION,
};
pub use fleet_manager::{
    FleetManager, StalledSession, DEFAULT_MAX_PARALLEL, SCORE_CRASH_DELTA, SCORE_FAILURE_DELTA,
    SCORE_SUCCESS_DELTA,
};
pub use hook_provisioner::GitHookProvisioner;
pub use metric_recorder::{
    MetricRecorder, SerializedMetrics, METRICS_FORMAT_VERSION, TREND_THRESHOLD,
};
pub use registry::RuntimeRegistry;
pub use report::{entries_markdown, FleetReporter};
pub use strategy_optimizer::{
    StrategyOptimizer, DEFAULT_EXPLORATION_RATE, MIN_EXPERIMENT_SAMPLES, PROMOTION_CONFIDENCE,
    TIE_MARGIN,
};
