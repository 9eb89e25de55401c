// Copyright 2026 Price Lab contributors. All rights reserved.
// Price experiment engine - Type Definitions

use serde::{Deserialize, Serialize};

use crate::money::Money;

// ─── Price Arm ───────────────────────────────────────────────────────────────

/// One candidate price point under test.
///
/// `true_mean_revenue` and `true_churn` only drive the built-in outcome
/// simulator; a host that feeds real outcomes never reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceArm {
    pub price: Money,
    pub true_mean_revenue: f64,
    pub true_churn: f64,
}

impl PriceArm {
    pub fn new(price: Money, true_mean_revenue: f64, true_churn: f64) -> Self {
        Self { price, true_mean_revenue, true_churn }
    }

    /// Convenience for tests and demos that think in floats.
    pub fn from_f64(price: f64, true_mean_revenue: f64, true_churn: f64) -> Self {
        Self::new(Money::from_f64(price), true_mean_revenue, true_churn)
    }
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// One subscriber assignment and its observed 30-day outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    pub subscriber_id: String,
    pub arm: String,
    pub price: Money,
    /// Day-of-experiment tag, 1..=30. Display only.
    pub day: u32,
    pub revenue: f64,
    pub churned: bool,
}

// ─── Per-arm summaries ───────────────────────────────────────────────────────

/// What actually happened on an arm, straight from the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedArmSummary {
    pub arm: String,
    pub count: u64,
    pub mean_revenue: f64,
    pub mean_churn: f64,
}

/// Posterior point estimates for an arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorArmSummary {
    pub arm: String,
    pub price: Money,
    pub posterior_mean_revenue: f64,
    pub posterior_mean_churn: f64,
    pub n: u64,
    /// Relative to the baseline posterior mean revenue; always 0 for the baseline.
    pub uplift_vs_baseline_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmProbability {
    pub arm: String,
    pub prob_best: f64,
    /// Probability the arm wins by at least the configured relative margin.
    pub prob_best_by_margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailStatus {
    pub arm: String,
    pub posterior_mean_churn: f64,
    pub prob_churn_violates_guardrail: f64,
    pub is_safe: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub arm: String,
    pub price: Money,
    pub uplift_pct: f64,
    pub confidence_pct: f64,
    /// True when no arm passed the guardrail and the baseline was returned.
    pub fell_back_to_baseline: bool,
}

// ─── Experiment Result ───────────────────────────────────────────────────────

/// Post-run analysis: everything computed from frozen posteriors and events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentAnalysis {
    pub guardrail_cap: f64,
    pub observed: Vec<ObservedArmSummary>,
    pub posterior: Vec<PosteriorArmSummary>,
    pub probabilities: Vec<ArmProbability>,
    pub guardrails: Vec<GuardrailStatus>,
    pub recommendation: Recommendation,
}

/// Terminal output of one experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub creator_name: String,
    pub creator_id: String,
    pub seed: u64,
    pub event_count: u64,
    pub baseline: String,
    pub analysis: ExperimentAnalysis,
    pub events: Vec<Event>,
}

impl ExperimentResult {
    pub fn recommendation(&self) -> &Recommendation {
        &self.analysis.recommendation
    }

    pub fn guardrail_for(&self, arm: &str) -> Option<&GuardrailStatus> {
        self.analysis.guardrails.iter().find(|g| g.arm == arm)
    }

    pub fn posterior_for(&self, arm: &str) -> Option<&PosteriorArmSummary> {
        self.analysis.posterior.iter().find(|p| p.arm == arm)
    }

    pub fn probability_for(&self, arm: &str) -> Option<&ArmProbability> {
        self.analysis.probabilities.iter().find(|p| p.arm == arm)
    }

    pub fn observed_for(&self, arm: &str) -> Option<&ObservedArmSummary> {
        self.analysis.observed.iter().find(|o| o.arm == arm)
    }
}
