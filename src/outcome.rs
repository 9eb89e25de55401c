// Copyright 2026 Price Lab contributors. All rights reserved.
// Price experiment engine - Outcome sources

//! Where per-event `(revenue, churned)` outcomes come from.
//!
//! The engine only sees [`OutcomeSource`]. [`SimulatedOutcomes`] draws them
//! from each arm's ground-truth parameters; a host with real subscribers
//! implements the trait (or calls `PriceExperiment::record_outcome` directly).

use rand::Rng;
use rand_distr::{Bernoulli, Distribution, LogNormal};

use crate::config::REVENUE_LOG_VARIANCE;
use crate::types::PriceArm;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OutcomeError {
    #[error("arm {arm}: cannot build revenue distribution for mean {mean}")]
    Revenue { arm: String, mean: f64 },

    #[error("arm {arm}: cannot build churn distribution for p={p}")]
    Churn { arm: String, p: f64 },
}

/// One observed subscriber outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub revenue: f64,
    pub churned: bool,
}

/// Produces the outcome of assigning one subscriber to an arm.
pub trait OutcomeSource<R: Rng + ?Sized> {
    fn observe(&mut self, label: &str, arm: &PriceArm, rng: &mut R) -> Result<Outcome, OutcomeError>;
}

// ---------------------------------------------------------------------------
// SimulatedOutcomes
// ---------------------------------------------------------------------------

/// Log-normal revenue with mean `true_mean_revenue`, Bernoulli churn with
/// probability `true_churn`. Revenue is drawn before churn on every event.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedOutcomes {
    sigma: f64,
}

impl Default for SimulatedOutcomes {
    fn default() -> Self {
        Self { sigma: REVENUE_LOG_VARIANCE.sqrt() }
    }
}

impl SimulatedOutcomes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log-space location that makes the log-normal mean equal `mean`.
    pub fn log_mean(&self, mean: f64) -> f64 {
        mean.ln() - 0.5 * self.sigma * self.sigma
    }
}

impl<R: Rng + ?Sized> OutcomeSource<R> for SimulatedOutcomes {
    fn observe(&mut self, label: &str, arm: &PriceArm, rng: &mut R) -> Result<Outcome, OutcomeError> {
        let revenue_dist = LogNormal::new(self.log_mean(arm.true_mean_revenue), self.sigma)
            .map_err(|_| OutcomeError::Revenue {
                arm: label.to_string(),
                mean: arm.true_mean_revenue,
            })?;
        let churn_dist = Bernoulli::new(arm.true_churn).map_err(|_| OutcomeError::Churn {
            arm: label.to_string(),
            p: arm.true_churn,
        })?;

        let revenue = revenue_dist.sample(rng);
        let churned = churn_dist.sample(rng);
        Ok(Outcome { revenue, churned })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
