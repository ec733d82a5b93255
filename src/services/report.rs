//! Markdown reporting over the ledger and metric history.
//!
//! Output is line-oriented Markdown for humans, never machine-parsed;
//! it can be regenerated freely without compatibility constraints.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;

use crate::domain::models::{FleetEvent, LedgerEntry};
use crate::services::event_ledger::{EventLedger, LedgerQuery};
use crate::services::metric_recorder::MetricRecorder;

/// Metric paths surfaced in the trends section.
const TREND_PATHS: &[(&str, &str)] = &[
    ("fleet.utilization_percent", "Fleet utilization"),
    ("beads.completed", "Beads completed"),
    ("beads.failed", "Beads failed"),
    ("convoys.average_percent_complete", "Convoy progress"),
];

/// Entries shown in the recent-activity feed.
const RECENT_ACTIVITY_LIMIT: usize = 20;

/// Renders activity reports from a ledger and a metric recorder.
pub struct FleetReporter {
    ledger: Arc<EventLedger>,
    recorder: Arc<MetricRecorder>,
}

impl FleetReporter {
    pub fn new(ledger: Arc<EventLedger>, recorder: Arc<MetricRecorder>) -> Self {
        Self { ledger, recorder }
    }

    /// One human-readable line for an event. Exhaustive over the event
    /// vocabulary, so a new variant cannot ship without a rendering.
    pub fn describe(event: &FleetEvent) -> String {
        match event {
            FleetEvent::BeadAssigned {
                bead_id,
                polecat_id,
            } => format!("bead `{bead_id}` assigned to polecat `{polecat_id}`"),
            FleetEvent::BeadRequeued {
                bead_id,
                reason,
                attempt,
            } => format!("bead `{bead_id}` requeued (attempt {attempt}): {reason}"),
            FleetEvent::PolecatSpawned {
                name, role, rig, ..
            } => format!("polecat **{name}** spawned for role `{role}` on rig `{rig}`"),
            FleetEvent::PolecatCompleted {
                polecat_id,
                bead_id,
                success,
                duration_ms,
            } => {
                let outcome = if *success { "succeeded" } else { "failed" };
                format!(
                    "polecat `{polecat_id}` {outcome} bead `{bead_id}` in {duration_ms} ms"
                )
            }
            FleetEvent::PolecatCrashed {
                polecat_id, error, ..
            } => format!("polecat `{polecat_id}` crashed: {error}"),
            FleetEvent::ConvoyCreated {
                name, bead_count, ..
            } => format!("convoy **{name}** created with {bead_count} beads"),
            FleetEvent::ConvoyCompleted {
                name, succeeded, ..
            } => {
                let outcome = if *succeeded { "completed" } else { "failed" };
                format!("convoy **{name}** {outcome}")
            }
            FleetEvent::HookCreated { branch, rig, .. } => {
                format!("hook provisioned on `{rig}` at branch `{branch}`")
            }
            FleetEvent::HookMerged { branch, .. } => {
                format!("hook merged from branch `{branch}`")
            }
            FleetEvent::VerificationPassed { bead_id, .. } => {
                format!("verification passed for bead `{bead_id}`")
            }
            FleetEvent::VerificationFailed { bead_id, errors } => {
                format!(
                    "verification failed for bead `{bead_id}`: {}",
                    errors.join("; ")
                )
            }
            FleetEvent::PlanCreated {
                convoy_id,
                bead_count,
            } => format!("plan created for convoy `{convoy_id}` ({bead_count} beads)"),
            FleetEvent::HealthScanComplete {
                polecats_scanned,
                sessions_stalled,
            } => format!(
                "health scan: {polecats_scanned} polecats scanned, {sessions_stalled} stalled"
            ),
        }
    }

    /// Markdown table of ledger entries, most recent last.
    pub fn ledger_markdown(&self, limit: usize) -> String {
        let result = self.ledger.query(&LedgerQuery::new());
        let skip = result.entries.len().saturating_sub(limit);

        let mut out = String::new();
        out.push_str("| Time | Type | Details |\n");
        out.push_str("|------|------|---------|\n");
        for entry in result.entries.iter().skip(skip) {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.event.event_type(),
                Self::describe(&entry.event)
            ));
        }
        out
    }

    /// Full activity report: event summary, latest metrics, trend
    /// arrows, and a recent-activity feed.
    pub fn activity_report(&self) -> String {
        let mut out = String::new();
        out.push_str("# Fleet Activity Report\n\n");

        // Event summary.
        out.push_str("## Event Summary\n\n");
        let all = self.ledger.query(&LedgerQuery::new());
        if all.entries.is_empty() {
            out.push_str("No events recorded.\n\n");
        } else {
            let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
            for entry in &all.entries {
                *counts.entry(entry.event.event_type()).or_insert(0) += 1;
            }
            out.push_str("| Event | Count |\n|-------|-------|\n");
            for (event_type, count) in counts {
                out.push_str(&format!("| {event_type} | {count} |\n"));
            }
            out.push('\n');
        }

        // Latest metrics.
        out.push_str("## Latest Metrics\n\n");
        match self.recorder.latest() {
            Some(snapshot) => {
                out.push_str("| Metric | Value |\n|--------|-------|\n");
                out.push_str(&format!(
                    "| Fleet utilization | {:.1}% ({}/{} polecats) |\n",
                    snapshot.fleet.utilization_percent,
                    snapshot.fleet.active_sessions,
                    snapshot.fleet.total_polecats
                ));
                out.push_str(&format!("| Beads total | {} |\n", snapshot.beads.total()));
                out.push_str(&format!(
                    "| Beads completed | {} |\n",
                    snapshot.beads.completed
                ));
                out.push_str(&format!("| Beads failed | {} |\n", snapshot.beads.failed));
                out.push_str(&format!(
                    "| Convoys active | {} |\n",
                    snapshot.convoys.active
                ));
                out.push_str(&format!(
                    "| Convoy progress | {:.1}% |\n",
                    snapshot.convoys.average_percent_complete
                ));
                out.push('\n');
            }
            None => out.push_str("No snapshots captured.\n\n"),
        }

        // Trends over the last hour.
        out.push_str("## Trends (1h)\n\n");
        for (path, label) in TREND_PATHS {
            let trend = self.recorder.get_trend(path, Duration::hours(1));
            out.push_str(&format!(
                "- {} {label}: {} ({} samples)\n",
                trend.direction.arrow(),
                trend.direction,
                trend.samples
            ));
        }
        out.push('\n');

        // Recent activity feed.
        out.push_str("## Recent Activity\n\n");
        if all.entries.is_empty() {
            out.push_str("Nothing yet.\n");
        } else {
            let skip = all.entries.len().saturating_sub(RECENT_ACTIVITY_LIMIT);
            for entry in all.entries.iter().skip(skip) {
                out.push_str(&format!(
                    "- `{}` {}\n",
                    entry.timestamp.format("%H:%M:%S"),
                    Self::describe(&entry.event)
                ));
            }
        }
        out
    }

    /// Markdown timeline for a single entity.
    pub fn entity_timeline_markdown(&self, entity_id: &str) -> String {
        let timeline = self.ledger.get_timeline(entity_id);
        let kind = timeline
            .kind
            .map_or("unknown", |k| k.as_str());
        let mut out = format!("## Timeline for {kind} `{entity_id}`\n\n");
        if timeline.entries.is_empty() {
            out.push_str("No recorded events.\n");
            return out;
        }
        for entry in &timeline.entries {
            out.push_str(&format!(
                "- `{}` {}\n",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                Self::describe(&entry.event)
            ));
        }
        out
    }
}

/// Format a batch of entries without a reporter, for ad-hoc exports.
pub fn entries_markdown(entries: &[LedgerEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!(
            "- `{}` [{}] {}\n",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.event.event_type(),
            FleetReporter::describe(&entry.event)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::convoy_store::ConvoyStore;
    use uuid::Uuid;

    fn reporter_with_events() -> FleetReporter {
        let ledger = Arc::new(EventLedger::new());
        ledger.append(
            FleetEvent::PolecatSpawned {
                polecat_id: Uuid::new_v4(),
                name: "nux".into(),
                role: "backend".into(),
                rig: "citadel".into(),
            },
            "town",
            None,
        );
        ledger.append(
            FleetEvent::BeadRequeued {
                bead_id: Uuid::new_v4(),
                reason: "verification failed".into(),
                attempt: 1,
            },
            "town",
            None,
        );
        let recorder = Arc::new(MetricRecorder::new(Arc::new(ConvoyStore::new())));
        FleetReporter::new(ledger, recorder)
    }

    #[test]
    fn report_contains_all_sections() {
        let reporter = reporter_with_events();
        let report = reporter.activity_report();
        assert!(report.contains("# Fleet Activity Report"));
        assert!(report.contains("## Event Summary"));
        assert!(report.contains("## Latest Metrics"));
        assert!(report.contains("## Trends"));
        assert!(report.contains("## Recent Activity"));
        assert!(report.contains("polecat_spawned"));
        assert!(report.contains("**nux**"));
    }

    #[test]
    fn empty_report_renders_placeholders() {
        let ledger = Arc::new(EventLedger::new());
        let recorder = Arc::new(MetricRecorder::new(Arc::new(ConvoyStore::new())));
        let report = FleetReporter::new(ledger, recorder).activity_report();
        assert!(report.contains("No events recorded."));
        assert!(report.contains("No snapshots captured."));
    }

    #[test]
    fn ledger_markdown_is_a_table() {
        let reporter = reporter_with_events();
        let table = reporter.ledger_markdown(10);
        assert!(table.starts_with("| Time | Type | Details |"));
        assert!(table.contains("bead_requeued"));
    }

    #[test]
    fn timeline_markdown_names_entity_kind() {
        let reporter = reporter_with_events();
        let markdown = reporter.entity_timeline_markdown("backend");
        assert!(markdown.contains("Timeline for role `backend`"));
    }
}
