//! Strategy optimizer: Thompson-sampling bandit over worker roles and
//! A/B experiments between orchestration strategies.
//!
//! The bandit keeps one Beta posterior per role and samples it to pick
//! role assignments; experiments compare two strategies on live
//! outcomes and auto-promote the winner once the difference in success
//! rates is statistically significant. This is the mechanism by which
//! the scheduler self-tunes without operator intervention.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentSelection, BanditArm, Experiment, ExperimentOutcome, ExperimentSample, ExperimentStatus,
    ExperimentWinner, Strategy, Variant,
};

/// Samples required across both variants before an experiment is
/// evaluated.
pub const MIN_EXPERIMENT_SAMPLES: u64 = 50;

/// Confidence required to promote a winner.
pub const PROMOTION_CONFIDENCE: f64 = 0.95;

/// Weighted scores closer than this are declared a tie.
pub const TIE_MARGIN: f64 = 0.05;

/// Default probability of overriding exploitation with a uniformly
/// random role.
pub const DEFAULT_EXPLORATION_RATE: f64 = 0.1;

struct OptimizerState {
    arms: HashMap<String, BanditArm>,
    strategies: HashMap<String, Strategy>,
    current: String,
    experiments: HashMap<Uuid, Experiment>,
}

/// Adaptive scheduling policy learner.
pub struct StrategyOptimizer {
    state: Mutex<OptimizerState>,
}

impl StrategyOptimizer {
    /// Start with the baseline strategy as current.
    pub fn new() -> Self {
        Self::with_strategy(Strategy::baseline())
    }

    /// Start with an explicit current strategy.
    pub fn with_strategy(strategy: Strategy) -> Self {
        let mut strategies = HashMap::new();
        let current = strategy.name.clone();
        strategies.insert(current.clone(), strategy);
        Self {
            state: Mutex::new(OptimizerState {
                arms: HashMap::new(),
                strategies,
                current,
                experiments: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OptimizerState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// The strategy currently governing the scheduler.
    pub fn get_current_strategy(&self) -> Strategy {
        let state = self.lock();
        state.strategies[&state.current].clone()
    }

    /// Add a strategy without making it current.
    pub fn register_strategy(&self, strategy: Strategy) {
        let mut state = self.lock();
        state.strategies.insert(strategy.name.clone(), strategy);
    }

    /// Make a registered strategy current.
    pub fn set_current_strategy(&self, name: &str) -> DomainResult<()> {
        let mut state = self.lock();
        if !state.strategies.contains_key(name) {
            return Err(DomainError::StrategyNotFound(name.to_string()));
        }
        state.current = name.to_string();
        Ok(())
    }

    /// Pick a role by Thompson sampling over the candidates' Beta
    /// posteriors; with probability `exploration_rate` a uniformly
    /// random candidate is chosen instead. Returns `None` for an empty
    /// candidate list.
    pub fn select_agent(
        &self,
        roles: &[String],
        exploration_rate: f64,
    ) -> Option<AgentSelection> {
        if roles.is_empty() {
            return None;
        }
        let mut rng = rand::thread_rng();
        let mut state = self.lock();

        if rng.gen::<f64>() < exploration_rate {
            let role = roles.choose(&mut rng)?.clone();
            let arm = state.arms.entry(role.clone()).or_default();
            return Some(AgentSelection {
                confidence: arm.estimated_success_rate,
                reasoning: format!(
                    "exploration: uniformly sampled role '{role}' (rate {exploration_rate})"
                ),
                role,
            });
        }

        let mut best: Option<(String, f64)> = None;
        for role in roles {
            let arm = state.arms.entry(role.clone()).or_default();
            let draw = arm.sample(&mut rng);
            debug!(role = %role, draw, "thompson sample");
            if best.as_ref().is_none_or(|(_, best_draw)| draw > *best_draw) {
                best = Some((role.clone(), draw));
            }
        }
        let (role, draw) = best?;
        let confidence = state.arms[&role].estimated_success_rate;
        Some(AgentSelection {
            reasoning: format!(
                "exploitation: role '{role}' drew the highest Thompson sample \
                 ({draw:.3}, estimated success rate {confidence:.3})"
            ),
            role,
            confidence,
        })
    }

    /// Bayesian update of a role's posterior from one outcome.
    pub fn update_bandit(&self, role: &str, success: bool) {
        let mut state = self.lock();
        state.arms.entry(role.to_string()).or_default().record(success);
    }

    /// Copy of every role's arm, for telemetry and reports.
    pub fn bandit_arms(&self) -> HashMap<String, BanditArm> {
        self.lock().arms.clone()
    }

    /// Open an A/B test between two strategies with zeroed trackers.
    pub fn start_experiment(&self, strategy_a: Strategy, strategy_b: Strategy) -> Uuid {
        let experiment = Experiment::new(strategy_a, strategy_b);
        let id = experiment.id;
        self.lock().experiments.insert(id, experiment);
        info!(experiment_id = %id, "experiment started");
        id
    }

    pub fn get_experiment(&self, id: Uuid) -> Option<Experiment> {
        self.lock().experiments.get(&id).cloned()
    }

    /// Fold one outcome into an experiment variant. Once the combined
    /// sample count reaches `MIN_EXPERIMENT_SAMPLES` the experiment is
    /// evaluated; at `PROMOTION_CONFIDENCE` the winner becomes the
    /// current strategy and the outcome is returned.
    pub fn record_experiment_result(
        &self,
        id: Uuid,
        variant: Variant,
        sample: &ExperimentSample,
    ) -> DomainResult<Option<ExperimentOutcome>> {
        let mut state = self.lock();
        let experiment = state
            .experiments
            .get_mut(&id)
            .ok_or(DomainError::ExperimentNotFound(id))?;
        if experiment.status == ExperimentStatus::Concluded {
            return Ok(experiment.outcome.clone());
        }

        match variant {
            Variant::A => experiment.performance_a.record(sample),
            Variant::B => experiment.performance_b.record(sample),
        }

        if experiment.total_samples() < MIN_EXPERIMENT_SAMPLES {
            return Ok(None);
        }
        let Some(outcome) = Self::evaluate(experiment) else {
            return Ok(None);
        };

        experiment.status = ExperimentStatus::Concluded;
        experiment.outcome = Some(outcome.clone());
        let winning = match outcome.winner {
            ExperimentWinner::A => Some(experiment.strategy_a.clone()),
            ExperimentWinner::B => Some(experiment.strategy_b.clone()),
            ExperimentWinner::Tie => None,
        };
        if let Some(strategy) = winning {
            info!(
                experiment_id = %id,
                strategy = %strategy.name,
                confidence = outcome.confidence,
                "promoting winning strategy"
            );
            state.current = strategy.name.clone();
            state.strategies.insert(strategy.name.clone(), strategy);
        }
        Ok(Some(outcome))
    }

    /// Two-proportion z-test approximation over the variants' success
    /// rates. Returns `None` while the difference is not significant
    /// enough to conclude.
    fn evaluate(experiment: &Experiment) -> Option<ExperimentOutcome> {
        let a = &experiment.performance_a;
        let b = &experiment.performance_b;
        if a.samples == 0 || b.samples == 0 {
            return None;
        }
        let n1 = a.samples as f64;
        let n2 = b.samples as f64;
        let pooled = (a.successes + b.successes) as f64 / (n1 + n2);
        let se = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
        let z = if se > 0.0 {
            (a.success_rate - b.success_rate).abs() / se
        } else {
            0.0
        };
        let confidence = if z >= 2.58 {
            0.99
        } else if z >= 1.96 {
            0.95
        } else if z >= 1.645 {
            0.90
        } else {
            z / 2.58
        };
        if confidence < PROMOTION_CONFIDENCE {
            return None;
        }

        let score_a = Self::weighted_score(experiment, Variant::A);
        let score_b = Self::weighted_score(experiment, Variant::B);
        let winner = if (score_a - score_b).abs() < TIE_MARGIN {
            ExperimentWinner::Tie
        } else if score_a > score_b {
            ExperimentWinner::A
        } else {
            ExperimentWinner::B
        };
        Some(ExperimentOutcome {
            winner,
            confidence,
            score_a,
            score_b,
        })
    }

    /// Composite strategy score: success rate dominates, with duration
    /// and fleet consumption as tiebreakers.
    fn weighted_score(experiment: &Experiment, variant: Variant) -> f64 {
        let (perf, strategy) = match variant {
            Variant::A => (&experiment.performance_a, &experiment.strategy_a),
            Variant::B => (&experiment.performance_b, &experiment.strategy_b),
        };
        let max_duration = experiment
            .performance_a
            .avg_duration_ms
            .max(experiment.performance_b.avg_duration_ms);
        let normalized_duration = if max_duration > 0.0 {
            perf.avg_duration_ms / max_duration
        } else {
            0.0
        };
        let max_parallel = experiment
            .strategy_a
            .max_parallel_tasks
            .max(experiment.strategy_b.max_parallel_tasks)
            .max(1);
        let resource_utilization = strategy.max_parallel_tasks as f64 / max_parallel as f64;

        0.5 * perf.success_rate
            + 0.3 * (1.0 - normalized_duration)
            + 0.2 * (1.0 - resource_utilization)
    }
}

impl Default for StrategyOptimizer {
    fn default() -> Self {
        Self::new()
    }
}
