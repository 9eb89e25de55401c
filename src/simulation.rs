// Copyright 2026 Price Lab contributors. All rights reserved.
// Price experiment engine - Experiment Core

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::analysis;
use crate::config::{ConfigError, ExperimentConfig};
use crate::guardrail;
use crate::outcome::{OutcomeError, OutcomeSource, SimulatedOutcomes};
use crate::posterior::{Posterior, PosteriorError};
use crate::selection::{self, SelectionPhase};
use crate::types::*;

/// Length of the display-only day tag cycle.
const EXPERIMENT_DAYS: u64 = 30;

/// Upper bound on up-front event log capacity; longer runs grow on demand.
const MAX_PREALLOCATED_EVENTS: u64 = 1 << 16;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExperimentError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("unknown arm {0:?}")]
    UnknownArm(String),

    #[error("arm {arm}: revenue must be finite and non-negative, got {value}")]
    InvalidRevenue { arm: String, value: f64 },

    #[error("experiment already holds all {0} events")]
    Complete(u64),

    #[error("numerical failure: {0}")]
    Numerical(#[from] PosteriorError),

    #[error("outcome source failed: {0}")]
    Outcome(#[from] OutcomeError),
}

impl ExperimentError {
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }
}

// ─── PriceExperiment ─────────────────────────────────────────────────────────

/// State of one experiment run. Owns its generator, posteriors and event
/// log; nothing is shared between runs.
#[derive(Debug, Clone)]
pub struct PriceExperiment {
    config: ExperimentConfig,
    labels: Vec<String>,
    posteriors: BTreeMap<String, Posterior>,
    events: Vec<Event>,
    rng: ChaCha8Rng,
    fail_open_events: u64,
}

impl PriceExperiment {
    /// Validate `config` and seed a fresh generator from `config.seed`.
    pub fn new(config: ExperimentConfig) -> Result<Self, ExperimentError> {
        config.validate()?;
        let labels: Vec<String> = config.labels().cloned().collect();
        let posteriors = labels.iter().map(|l| (l.clone(), Posterior::new())).collect();
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let capacity = usize::try_from(config.event_count.min(MAX_PREALLOCATED_EVENTS)).unwrap_or(0);
        debug!(
            creator_id = %config.creator_id,
            arms = labels.len(),
            events = config.event_count,
            seed = config.seed,
            "price experiment configured"
        );
        Ok(Self {
            config,
            labels,
            posteriors,
            events: Vec::with_capacity(capacity),
            rng,
            fail_open_events: 0,
        })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn posteriors(&self) -> &BTreeMap<String, Posterior> {
        &self.posteriors
    }

    pub fn posterior(&self, label: &str) -> Option<&Posterior> {
        self.posteriors.get(label)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Adaptive events on which no arm passed the rolling guardrail.
    pub fn fail_open_events(&self) -> u64 {
        self.fail_open_events
    }

    pub fn is_complete(&self) -> bool {
        self.events.len() as u64 >= self.config.event_count
    }

    /// Current churn ceiling from the baseline's rolling posterior.
    pub fn current_guardrail_cap(&self) -> f64 {
        let baseline = self.posteriors.get(&self.config.baseline).copied().unwrap_or_default();
        match self.config.baseline_arm() {
            Some(arm) => guardrail::guardrail_cap(&baseline, arm, self.config.max_relative_churn_increase),
            None => baseline.mean_churn() * (1.0 + self.config.max_relative_churn_increase),
        }
    }

    /// Choose the arm for the next event.
    pub fn next_arm(&mut self) -> Result<(String, SelectionPhase), ExperimentError> {
        if self.is_complete() {
            return Err(ExperimentError::Complete(self.config.event_count));
        }
        let seq = self.events.len() as u64;
        if let Some(label) = selection::exploration_arm(&self.labels, seq) {
            return Ok((label.clone(), SelectionPhase::Exploration));
        }
        if seq == self.config.exploration_events() {
            debug!(seq, "forced exploration complete, switching to Thompson sampling");
        }

        let cap = self.current_guardrail_cap();
        let statuses = guardrail::evaluate_all(
            &self.posteriors,
            cap,
            self.config.guardrail_confidence,
            self.config.rolling_churn_samples,
            &mut self.rng,
        )?;
        let (candidates, failed_open) = guardrail::safe_labels(&statuses);
        if failed_open {
            if self.fail_open_events == 0 {
                warn!(seq, cap, "no arm passes the churn guardrail; sampling all arms");
            }
            self.fail_open_events += 1;
        }

        let chosen = selection::thompson_select(&candidates, &self.posteriors, &mut self.rng)?
            .unwrap_or_else(|| self.config.baseline.clone());
        let phase = if failed_open { SelectionPhase::ThompsonFailOpen } else { SelectionPhase::Thompson };
        Ok((chosen, phase))
    }

    /// Append an observed outcome for `label` and fold it into its posterior.
    pub fn record_outcome(&mut self, label: &str, revenue: f64, churned: bool) -> Result<&Event, ExperimentError> {
        if self.is_complete() {
            return Err(ExperimentError::Complete(self.config.event_count));
        }
        let price = match self.config.price_arms.get(label) {
            Some(arm) => arm.price,
            None => return Err(ExperimentError::UnknownArm(label.to_string())),
        };
        if !(revenue.is_finite() && revenue >= 0.0) {
            return Err(ExperimentError::InvalidRevenue { arm: label.to_string(), value: revenue });
        }
        let posterior = self
            .posteriors
            .get_mut(label)
            .ok_or_else(|| ExperimentError::UnknownArm(label.to_string()))?;
        posterior.update(revenue, churned);

        let seq = self.events.len() as u64;
        let day = (1 + seq * EXPERIMENT_DAYS / self.config.event_count.max(1)).min(EXPERIMENT_DAYS) as u32;
        self.events.push(Event {
            seq,
            subscriber_id: format!("sub_{:05}", seq + 1),
            arm: label.to_string(),
            price,
            day,
            revenue,
            churned,
        });
        Ok(&self.events[self.events.len() - 1])
    }

    /// Select, observe and record one event.
    pub fn step<S: OutcomeSource<ChaCha8Rng>>(&mut self, source: &mut S) -> Result<Event, ExperimentError> {
        let (label, _) = self.next_arm()?;
        let arm = self
            .config
            .price_arms
            .get(&label)
            .cloned()
            .ok_or_else(|| ExperimentError::UnknownArm(label.clone()))?;
        let outcome = source.observe(&label, &arm, &mut self.rng)?;
        let event = self.record_outcome(&label, outcome.revenue, outcome.churned)?;
        Ok(event.clone())
    }

    /// Step until `event_count` events have been recorded.
    pub fn run<S: OutcomeSource<ChaCha8Rng>>(&mut self, source: &mut S) -> Result<(), ExperimentError> {
        while !self.is_complete() {
            self.step(source)?;
        }
        Ok(())
    }

    /// Post-run analysis with an explicit generator; the experiment itself is
    /// left untouched.
    pub fn analyze_with<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Result<ExperimentAnalysis, ExperimentError> {
        Ok(analysis::analyze(&self.config, &self.posteriors, &self.events, rng)?)
    }

    /// Analyze whatever has been recorded, continuing the run's own
    /// generator, and package the result.
    pub fn finish(mut self) -> Result<ExperimentResult, ExperimentError> {
        let analysis = analysis::analyze(&self.config, &self.posteriors, &self.events, &mut self.rng)?;
        let rec = &analysis.recommendation;
        info!(
            creator_id = %self.config.creator_id,
            events = self.events.len(),
            recommended = %rec.arm,
            price = %rec.price,
            uplift_pct = rec.uplift_pct,
            confidence_pct = rec.confidence_pct,
            fell_back_to_baseline = rec.fell_back_to_baseline,
            fail_open_events = self.fail_open_events,
            "price experiment finished"
        );
        Ok(ExperimentResult {
            creator_name: self.config.creator_name,
            creator_id: self.config.creator_id,
            seed: self.config.seed,
            event_count: self.events.len() as u64,
            baseline: self.config.baseline,
            analysis,
            events: self.events,
        })
    }
}

// ─── Entry points ────────────────────────────────────────────────────────────

/// Run a full simulated experiment for `config`.
pub fn run_experiment(config: &ExperimentConfig) -> Result<ExperimentResult, ExperimentError> {
    let mut experiment = PriceExperiment::new(config.clone())?;
    experiment.run(&mut SimulatedOutcomes::new())?;
    experiment.finish()
}

/// Positional form of [`run_experiment`]; the baseline is the first label.
#[allow(clippy::too_many_arguments)]
pub fn run_experiment_with(
    creator_name: &str,
    creator_id: &str,
    price_arms: BTreeMap<String, PriceArm>,
    seed: u64,
    event_count: u64,
    max_relative_churn_increase: f64,
    guardrail_confidence: f64,
) -> Result<ExperimentResult, ExperimentError> {
    let config = ExperimentConfig::new(
        creator_name,
        creator_id,
        price_arms,
        seed,
        event_count,
        max_relative_churn_increase,
        guardrail_confidence,
    );
    run_experiment(&config)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
