//! Metric recorder: periodic snapshots and trend analysis.
//!
//! Snapshots combine store aggregates with best-effort polls of the
//! fleet; each poll sits in its own failure boundary, so an unavailable
//! subsystem yields zero-valued defaults rather than aborting the
//! capture. Between captures the recorder only counts events, which
//! keeps the per-event cost O(1).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    FleetEvent, FleetUtilization, MetricSnapshot, TimeSeriesPoint, Trend, TrendDirection,
};
use crate::services::convoy_store::ConvoyStore;
use crate::services::fleet_manager::FleetManager;

/// Version stamp of the serialized metrics form.
pub const METRICS_FORMAT_VERSION: u32 = 1;

/// Normalized slope beyond which a series counts as rising or falling.
pub const TREND_THRESHOLD: f64 = 0.1;

#[derive(Default)]
struct EventCounters {
    total: u64,
    by_type: HashMap<String, u64>,
}

/// Serialized, JSON-safe snapshot history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedMetrics {
    pub version: u32,
    pub snapshots: Vec<MetricSnapshot>,
}

/// Collects point-in-time snapshots and derives trend signals.
pub struct MetricRecorder {
    store: Arc<ConvoyStore>,
    fleet: Option<Arc<FleetManager>>,
    snapshots: RwLock<Vec<MetricSnapshot>>,
    counters: Mutex<EventCounters>,
    capture_task: Mutex<Option<JoinHandle<()>>>,
}

impl MetricRecorder {
    pub fn new(store: Arc<ConvoyStore>) -> Self {
        Self {
            store,
            fleet: None,
            snapshots: RwLock::new(Vec::new()),
            counters: Mutex::new(EventCounters::default()),
            capture_task: Mutex::new(None),
        }
    }

    /// Attach the fleet manager so captures include utilization.
    pub fn with_fleet(mut self, fleet: Arc<FleetManager>) -> Self {
        self.fleet = Some(fleet);
        self
    }

    /// Count one observed event. O(1); the real work happens at
    /// capture time.
    pub fn record_event(&self, event: &FleetEvent) {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        counters.total += 1;
        *counters
            .by_type
            .entry(event.event_type().to_string())
            .or_insert(0) += 1;
    }

    /// Subscribe this recorder to a store's event stream.
    pub fn attach_store(self: &Arc<Self>, store: &ConvoyStore) {
        let recorder = Arc::clone(self);
        store.on(move |event| {
            recorder.record_event(event);
            Ok(())
        });
    }

    /// Build one snapshot and reset the since-last-capture counters.
    pub async fn capture(&self) -> MetricSnapshot {
        // Fleet poll is best-effort: no fleet attached means zeroed
        // utilization, never a failed capture.
        let fleet = match &self.fleet {
            Some(fleet) => fleet.fleet_stats().await,
            None => FleetUtilization::default(),
        };
        let store_snapshot = self.store.get_fleet_snapshot();

        let (events_since_last, events_by_type) = {
            let mut counters = self
                .counters
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let taken = std::mem::take(&mut *counters);
            (taken.total, taken.by_type)
        };

        let snapshot = MetricSnapshot {
            timestamp: Utc::now(),
            fleet,
            beads: store_snapshot.beads,
            convoys: store_snapshot.convoys,
            events_since_last,
            events_by_type,
        };
        self.snapshots
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(snapshot.clone());
        debug!(events = events_since_last, "metric snapshot captured");
        snapshot
    }

    pub fn latest(&self) -> Option<MetricSnapshot> {
        self.snapshots
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Extract a numeric series by walking a dotted field path (e.g.
    /// `fleet.utilization_percent`) across stored snapshots.
    pub fn get_time_series(
        &self,
        path: &str,
        from: Option<chrono::DateTime<Utc>>,
        to: Option<chrono::DateTime<Utc>>,
    ) -> Vec<TimeSeriesPoint> {
        let snapshots = self
            .snapshots
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        snapshots
            .iter()
            .filter(|s| from.is_none_or(|f| s.timestamp >= f))
            .filter(|s| to.is_none_or(|t| s.timestamp <= t))
            .filter_map(|s| {
                let value = serde_json::to_value(s).ok()?;
                let value = lookup_path(&value, path)?;
                Some(TimeSeriesPoint {
                    timestamp: s.timestamp,
                    value,
                })
            })
            .collect()
    }

    /// Classify how a metric moved over the trailing window.
    ///
    /// Fits an ordinary least-squares line over the windowed series and
    /// normalizes the fitted change across the window by the value
    /// range, so the classification is scale-free. Fewer than two
    /// points, or a flat series, is stable.
    pub fn get_trend(&self, path: &str, window: Duration) -> Trend {
        let from = Utc::now() - window;
        let points = self.get_time_series(path, Some(from), None);
        let n = points.len();
        if n < 2 {
            return Trend::stable(n);
        }

        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        let n_f = n as f64;
        let mean_x = (n_f - 1.0) / 2.0;
        let mean_y = values.iter().sum::<f64>() / n_f;
        let mut covariance = 0.0;
        let mut variance = 0.0;
        for (i, y) in values.iter().enumerate() {
            let dx = i as f64 - mean_x;
            covariance += dx * (y - mean_y);
            variance += dx * dx;
        }
        let slope = if variance > 0.0 { covariance / variance } else { 0.0 };

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        let normalized_slope = if range > 0.0 {
            slope * (n_f - 1.0) / range
        } else {
            0.0
        };

        let direction = if normalized_slope > TREND_THRESHOLD {
            TrendDirection::Rising
        } else if normalized_slope < -TREND_THRESHOLD {
            TrendDirection::Falling
        } else {
            TrendDirection::Stable
        };
        Trend {
            direction,
            slope,
            normalized_slope,
            samples: n,
        }
    }

    /// Start periodic background capture. Idempotent: a previous timer
    /// is cleared first.
    pub fn start_auto_capture(self: &Arc<Self>, interval: StdDuration) {
        let mut task = self
            .capture_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(previous) = task.take() {
            previous.abort();
        }
        let recorder = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so captures are
            // spaced one full interval apart.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                recorder.capture().await;
            }
        }));
    }

    /// Stop background capture if it is running.
    pub fn stop_auto_capture(&self) {
        let mut task = self
            .capture_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(task) = task.take() {
            task.abort();
        } else {
            warn!("auto capture was not running");
        }
    }

    /// Lossless, versioned snapshot history.
    pub fn serialize(&self) -> SerializedMetrics {
        SerializedMetrics {
            version: METRICS_FORMAT_VERSION,
            snapshots: self
                .snapshots
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone(),
        }
    }

    /// Restore snapshot history into a recorder bound to the given
    /// store.
    pub fn deserialize(
        serialized: SerializedMetrics,
        store: Arc<ConvoyStore>,
    ) -> DomainResult<Self> {
        if serialized.version != METRICS_FORMAT_VERSION {
            return Err(DomainError::SerializationError(format!(
                "unsupported metrics format version {}",
                serialized.version
            )));
        }
        let recorder = Self::new(store);
        *recorder
            .snapshots
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = serialized.snapshots;
        Ok(recorder)
    }

    #[cfg(test)]
    fn inject(&self, snapshot: MetricSnapshot) {
        self.snapshots
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(snapshot);
    }
}

/// Walk a dotted path through a JSON value and read a number.
fn lookup_path(value: &serde_json::Value, path: &str) -> Option<f64> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    current.as_f64()
}
