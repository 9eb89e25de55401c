// Copyright 2026 Price Lab contributors. All rights reserved.
// Price experiment engine - Churn guardrail

//! Statistical churn guardrail.
//!
//! An arm is unsafe when the posterior probability that its churn exceeds
//! `baseline_churn * (1 + max_relative_churn_increase)` reaches the
//! configured confidence. The same rule runs twice: cheaply inside the
//! selection loop, and once more precisely for the final report.

use std::collections::BTreeMap;

use rand::Rng;

use crate::posterior::{Posterior, PosteriorError};
use crate::types::{GuardrailStatus, PriceArm};

/// Churn ceiling derived from the baseline.
///
/// Uses the baseline's posterior mean once it has churn evidence, otherwise
/// its configured `true_churn`.
pub fn guardrail_cap(baseline_posterior: &Posterior, baseline_arm: &PriceArm, max_relative_increase: f64) -> f64 {
    let baseline_churn = if baseline_posterior.has_churn_evidence() {
        baseline_posterior.mean_churn()
    } else {
        baseline_arm.true_churn
    };
    baseline_churn * (1.0 + max_relative_increase)
}

/// Evaluate one arm against the cap.
///
/// Arms without churn evidence are safe with a violation probability of 0;
/// there is nothing to judge yet.
pub fn evaluate_arm<R: Rng + ?Sized>(
    label: &str,
    posterior: &Posterior,
    cap: f64,
    confidence: f64,
    samples: usize,
    rng: &mut R,
) -> Result<GuardrailStatus, PosteriorError> {
    let prob = if posterior.has_churn_evidence() {
        posterior.prob_churn_exceeds(cap, samples, rng)?
    } else {
        0.0
    };
    Ok(GuardrailStatus {
        arm: label.to_string(),
        posterior_mean_churn: posterior.mean_churn(),
        prob_churn_violates_guardrail: prob,
        is_safe: prob < confidence,
    })
}

/// Guardrail status for every arm, in label order.
pub fn evaluate_all<R: Rng + ?Sized>(
    posteriors: &BTreeMap<String, Posterior>,
    cap: f64,
    confidence: f64,
    samples: usize,
    rng: &mut R,
) -> Result<Vec<GuardrailStatus>, PosteriorError> {
    posteriors
        .iter()
        .map(|(label, posterior)| evaluate_arm(label, posterior, cap, confidence, samples, rng))
        .collect()
}

/// Labels of arms that pass, with fail-open: when nothing passes, every arm
/// is returned so the experiment always has a valid action. The flag reports
/// whether fail-open kicked in.
pub fn safe_labels(statuses: &[GuardrailStatus]) -> (Vec<String>, bool) {
    let safe: Vec<String> = statuses
        .iter()
        .filter(|s| s.is_safe)
        .map(|s| s.arm.clone())
        .collect();
    if safe.is_empty() {
        (statuses.iter().map(|s| s.arm.clone()).collect(), true)
    } else {
        (safe, false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
