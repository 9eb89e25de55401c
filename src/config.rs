// Copyright 2026 Price Lab contributors. All rights reserved.
// Price experiment engine - Experiment configuration

//! Experiment configuration and up-front validation.
//!
//! Every rule here is checked before the generator is seeded, so a bad
//! configuration never produces a partial event log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::PriceArm;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Consecutive forced-exploration events per arm before adaptive selection.
pub const EXPLORATION_EVENTS_PER_ARM: u64 = 10;

/// Log-space variance of the simulated 30-day revenue.
pub const REVENUE_LOG_VARIANCE: f64 = 0.21;

pub const DEFAULT_ROLLING_CHURN_SAMPLES: usize = 2_000;
pub const DEFAULT_FINAL_CHURN_SAMPLES: usize = 5_000;
pub const DEFAULT_BEST_ARM_SAMPLES: usize = 10_000;
pub const DEFAULT_UPLIFT_MARGIN: f64 = 0.03;

/// Lower bound on either churn-guardrail sample count.
pub const MIN_CHURN_SAMPLES: usize = 1_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A configuration rule that failed validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("at least 2 price arms are required, got {0}")]
    TooFewArms(usize),

    #[error("event_count {event_count} cannot finish forced exploration (needs at least {required})")]
    EventCountTooSmall { event_count: u64, required: u64 },

    #[error("arm {arm}: price must be positive")]
    NonPositivePrice { arm: String },

    #[error("arm {arm}: true_mean_revenue must be positive and finite, got {value}")]
    InvalidMeanRevenue { arm: String, value: f64 },

    #[error("arm {arm}: true_churn must lie in [0, 1], got {value}")]
    InvalidChurn { arm: String, value: f64 },

    #[error("baseline arm {0:?} is not one of the configured arms")]
    UnknownBaseline(String),

    #[error("max_relative_churn_increase must be finite and non-negative, got {0}")]
    InvalidChurnIncrease(f64),

    #[error("guardrail_confidence must lie in (0, 1], got {0}")]
    InvalidGuardrailConfidence(f64),

    #[error("{field} must be at least {min}, got {value}")]
    TooFewSamples { field: &'static str, min: usize, value: usize },

    #[error("uplift_margin must be finite and non-negative, got {0}")]
    InvalidUpliftMargin(f64),
}

// ---------------------------------------------------------------------------
// ExperimentConfig
// ---------------------------------------------------------------------------

fn default_rolling_churn_samples() -> usize {
    DEFAULT_ROLLING_CHURN_SAMPLES
}

fn default_final_churn_samples() -> usize {
    DEFAULT_FINAL_CHURN_SAMPLES
}

fn default_best_arm_samples() -> usize {
    DEFAULT_BEST_ARM_SAMPLES
}

fn default_uplift_margin() -> f64 {
    DEFAULT_UPLIFT_MARGIN
}

/// Everything one run needs. Arms are keyed by label and iterate in label
/// order, which is also the forced-exploration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub creator_name: String,
    pub creator_id: String,
    pub price_arms: BTreeMap<String, PriceArm>,
    pub baseline: String,
    pub seed: u64,
    pub event_count: u64,
    pub max_relative_churn_increase: f64,
    pub guardrail_confidence: f64,

    /// Beta draws per arm for the in-loop guardrail check.
    #[serde(default = "default_rolling_churn_samples")]
    pub rolling_churn_samples: usize,
    /// Beta draws per arm for the final guardrail table.
    #[serde(default = "default_final_churn_samples")]
    pub final_churn_samples: usize,
    /// Gamma draws per arm for the probability-of-best pass.
    #[serde(default = "default_best_arm_samples")]
    pub best_arm_samples: usize,
    /// Relative margin over the runner-up that counts as material uplift.
    #[serde(default = "default_uplift_margin")]
    pub uplift_margin: f64,
}

impl ExperimentConfig {
    /// Build a config with default sampling knobs. The baseline defaults to
    /// the first label in sort order; override with [`with_baseline`](Self::with_baseline).
    pub fn new(
        creator_name: impl Into<String>,
        creator_id: impl Into<String>,
        price_arms: BTreeMap<String, PriceArm>,
        seed: u64,
        event_count: u64,
        max_relative_churn_increase: f64,
        guardrail_confidence: f64,
    ) -> Self {
        let baseline = price_arms.keys().next().cloned().unwrap_or_default();
        Self {
            creator_name: creator_name.into(),
            creator_id: creator_id.into(),
            price_arms,
            baseline,
            seed,
            event_count,
            max_relative_churn_increase,
            guardrail_confidence,
            rolling_churn_samples: DEFAULT_ROLLING_CHURN_SAMPLES,
            final_churn_samples: DEFAULT_FINAL_CHURN_SAMPLES,
            best_arm_samples: DEFAULT_BEST_ARM_SAMPLES,
            uplift_margin: DEFAULT_UPLIFT_MARGIN,
        }
    }

    pub fn with_baseline(mut self, baseline: impl Into<String>) -> Self {
        self.baseline = baseline.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_event_count(mut self, event_count: u64) -> Self {
        self.event_count = event_count;
        self
    }

    pub fn with_sample_counts(mut self, rolling: usize, final_pass: usize, best_arm: usize) -> Self {
        self.rolling_churn_samples = rolling;
        self.final_churn_samples = final_pass;
        self.best_arm_samples = best_arm;
        self
    }

    pub fn with_uplift_margin(mut self, margin: f64) -> Self {
        self.uplift_margin = margin;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Events reserved for round-robin exploration.
    pub fn exploration_events(&self) -> u64 {
        EXPLORATION_EVENTS_PER_ARM * self.price_arms.len() as u64
    }

    pub fn labels(&self) -> impl Iterator<Item = &String> {
        self.price_arms.keys()
    }

    pub fn baseline_arm(&self) -> Option<&PriceArm> {
        self.price_arms.get(&self.baseline)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let arm_count = self.price_arms.len();
        if arm_count < 2 {
            return Err(ConfigError::TooFewArms(arm_count));
        }

        let required = self.exploration_events();
        if self.event_count < required {
            return Err(ConfigError::EventCountTooSmall {
                event_count: self.event_count,
                required,
            });
        }

        for (label, arm) in &self.price_arms {
            if !arm.price.is_positive() {
                return Err(ConfigError::NonPositivePrice { arm: label.clone() });
            }
            if !(arm.true_mean_revenue.is_finite() && arm.true_mean_revenue > 0.0) {
                return Err(ConfigError::InvalidMeanRevenue {
                    arm: label.clone(),
                    value: arm.true_mean_revenue,
                });
            }
            if !(0.0..=1.0).contains(&arm.true_churn) {
                return Err(ConfigError::InvalidChurn {
                    arm: label.clone(),
                    value: arm.true_churn,
                });
            }
        }

        if !self.price_arms.contains_key(&self.baseline) {
            return Err(ConfigError::UnknownBaseline(self.baseline.clone()));
        }

        if !(self.max_relative_churn_increase.is_finite() && self.max_relative_churn_increase >= 0.0) {
            return Err(ConfigError::InvalidChurnIncrease(self.max_relative_churn_increase));
        }

        if !(self.guardrail_confidence > 0.0 && self.guardrail_confidence <= 1.0) {
            return Err(ConfigError::InvalidGuardrailConfidence(self.guardrail_confidence));
        }

        check_samples("rolling_churn_samples", MIN_CHURN_SAMPLES, self.rolling_churn_samples)?;
        check_samples("final_churn_samples", MIN_CHURN_SAMPLES, self.final_churn_samples)?;
        check_samples("best_arm_samples", 1, self.best_arm_samples)?;

        if !(self.uplift_margin.is_finite() && self.uplift_margin >= 0.0) {
            return Err(ConfigError::InvalidUpliftMargin(self.uplift_margin));
        }

        Ok(())
    }
}

fn check_samples(field: &'static str, min: usize, value: usize) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::TooFewSamples { field, min, value });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
