//! Strategy, experiment, and bandit-arm models.
//!
//! A strategy is a named scheduling configuration; an experiment pits
//! two strategies against each other on live outcomes; a bandit arm is
//! the per-role Beta posterior driving adaptive role selection.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// How hard the verification pass comes down on an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStrictness {
    Lenient,
    Normal,
    Strict,
}

impl Default for VerificationStrictness {
    fn default() -> Self {
        Self::Normal
    }
}

impl VerificationStrictness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lenient => "lenient",
            Self::Normal => "normal",
            Self::Strict => "strict",
        }
    }
}

/// A named orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    /// Stable name; also the promotion key
    pub name: String,
    /// Ceiling on concurrently dispatched sessions
    pub max_parallel_tasks: usize,
    pub verification_strictness: VerificationStrictness,
    /// Retry budget handed to newly planned beads
    pub max_attempts: u32,
    /// Sessions running longer than this are flagged by health scans
    pub session_timeout_ms: u64,
    /// Per-role scheduling weight overrides
    #[serde(default)]
    pub role_weights: HashMap<String, f64>,
}

impl Strategy {
    /// The conservative configuration a fresh optimizer starts from.
    pub fn baseline() -> Self {
        Self {
            name: "baseline".into(),
            max_parallel_tasks: 4,
            verification_strictness: VerificationStrictness::Normal,
            max_attempts: 3,
            session_timeout_ms: 30 * 60 * 1000,
            role_weights: HashMap::new(),
        }
    }

    pub fn with_parallelism(mut self, max_parallel_tasks: usize) -> Self {
        self.max_parallel_tasks = max_parallel_tasks;
        self
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self::baseline()
    }
}

/// Per-role success/failure posterior for Thompson sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanditArm {
    pub successes: u64,
    pub failures: u64,
    /// Beta shape parameter (pseudo-successes)
    pub alpha: f64,
    /// Beta shape parameter (pseudo-failures)
    pub beta: f64,
    /// Posterior mean, `alpha / (alpha + beta)`
    pub estimated_success_rate: f64,
}

impl BanditArm {
    /// Uninformative Beta(1, 1) prior.
    pub fn new() -> Self {
        Self {
            successes: 0,
            failures: 0,
            alpha: 1.0,
            beta: 1.0,
            estimated_success_rate: 0.5,
        }
    }

    /// Bayesian update from one observed outcome.
    pub fn record(&mut self, success: bool) {
        if success {
            self.successes += 1;
            self.alpha += 1.0;
        } else {
            self.failures += 1;
            self.beta += 1.0;
        }
        self.estimated_success_rate = self.alpha / (self.alpha + self.beta);
    }

    /// Variance of the Beta posterior.
    pub fn variance(&self) -> f64 {
        let sum = self.alpha + self.beta;
        (self.alpha * self.beta) / (sum.powi(2) * (sum + 1.0))
    }

    /// Draw an approximate sample from the Beta posterior.
    ///
    /// Uses a normal approximation (mean + z·σ via Box-Muller) instead
    /// of a dedicated Beta sampler. The approximation is reasonable once
    /// both shape parameters exceed ~5 and increasingly inaccurate near
    /// the Beta(1, 1) prior; early selections are effectively noisy,
    /// which in practice just adds exploration.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let mean = self.estimated_success_rate;
        let std_dev = self.variance().sqrt();

        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen_range(0.0..1.0);
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();

        (mean + z * std_dev).clamp(0.0, 1.0)
    }
}

impl Default for BanditArm {
    fn default() -> Self {
        Self::new()
    }
}

/// The role selection returned by Thompson sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSelection {
    pub role: String,
    /// The selected role's current estimated success rate
    pub confidence: f64,
    /// Human-readable explanation distinguishing exploration from
    /// exploitation
    pub reasoning: String,
}

/// Which side of an experiment a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    A,
    B,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }
}

/// One observed outcome fed into an experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSample {
    pub success: bool,
    pub duration_ms: f64,
    pub retried: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Rolling performance tracker for one experiment variant.
///
/// All rates are maintained incrementally; samples are never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantPerformance {
    pub samples: u64,
    pub successes: u64,
    pub success_rate: f64,
    pub avg_duration_ms: f64,
    pub retry_rate: f64,
    pub error_rate: f64,
}

impl VariantPerformance {
    /// Fold one sample into the rolling aggregates.
    pub fn record(&mut self, sample: &ExperimentSample) {
        self.samples += 1;
        let n = self.samples as f64;
        if sample.success {
            self.successes += 1;
        }
        self.success_rate = self.successes as f64 / n;
        self.avg_duration_ms += (sample.duration_ms - self.avg_duration_ms) / n;

        let retried = if sample.retried { 1.0 } else { 0.0 };
        self.retry_rate += (retried - self.retry_rate) / n;

        let errored = if sample.error.is_some() { 1.0 } else { 0.0 };
        self.error_rate += (errored - self.error_rate) / n;
    }
}

/// Verdict of a concluded experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentWinner {
    A,
    B,
    Tie,
}

/// Final evaluation of an experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentOutcome {
    pub winner: ExperimentWinner,
    /// Confidence that the success rates genuinely differ
    pub confidence: f64,
    pub score_a: f64,
    pub score_b: f64,
}

/// Whether an experiment is still collecting samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Running,
    Concluded,
}

/// A controlled A/B comparison between two strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: Uuid,
    pub strategy_a: Strategy,
    pub strategy_b: Strategy,
    pub performance_a: VariantPerformance,
    pub performance_b: VariantPerformance,
    pub status: ExperimentStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub outcome: Option<ExperimentOutcome>,
}

impl Experiment {
    pub fn new(strategy_a: Strategy, strategy_b: Strategy) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy_a,
            strategy_b,
            performance_a: VariantPerformance::default(),
            performance_b: VariantPerformance::default(),
            status: ExperimentStatus::Running,
            started_at: chrono::Utc::now(),
            outcome: None,
        }
    }

    pub fn total_samples(&self) -> u64 {
        self.performance_a.samples + self.performance_b.samples
    }
}
