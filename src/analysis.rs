// Copyright 2026 Price Lab contributors. All rights reserved.
// Price experiment engine - Post-run analysis

//! Post-run analysis over frozen posteriors and a frozen event log.
//!
//! Nothing here mutates experiment state. The only randomness is the Monte
//! Carlo generator passed in, so re-running with a freshly seeded generator
//! reproduces the same [`ExperimentAnalysis`].

use std::collections::BTreeMap;

use rand::Rng;
use rand_distr::Distribution;

use crate::config::ExperimentConfig;
use crate::guardrail;
use crate::posterior::{Posterior, PosteriorError};
use crate::types::{
    ArmProbability, Event, ExperimentAnalysis, GuardrailStatus, ObservedArmSummary,
    PosteriorArmSummary, Recommendation,
};

// ---------------------------------------------------------------------------
// Observed and posterior aggregates
// ---------------------------------------------------------------------------

/// Count, mean revenue and mean churn per arm from the event log. Arms with
/// no events report zeros.
pub fn observed_summary<'a>(
    labels: impl IntoIterator<Item = &'a String>,
    events: &[Event],
) -> Vec<ObservedArmSummary> {
    let mut totals: BTreeMap<&str, (u64, f64, u64)> = BTreeMap::new();
    for e in events {
        let t = totals.entry(e.arm.as_str()).or_insert((0, 0.0, 0));
        t.0 += 1;
        t.1 += e.revenue;
        t.2 += e.churned as u64;
    }

    labels
        .into_iter()
        .map(|label| {
            let (count, revenue, churned) = totals.get(label.as_str()).copied().unwrap_or((0, 0.0, 0));
            let (mean_revenue, mean_churn) = if count > 0 {
                (revenue / count as f64, churned as f64 / count as f64)
            } else {
                (0.0, 0.0)
            };
            ObservedArmSummary { arm: label.clone(), count, mean_revenue, mean_churn }
        })
        .collect()
}

/// Relative change of `value` over `baseline`, in percent.
pub fn uplift_pct(value: f64, baseline: f64) -> f64 {
    if baseline <= 0.0 {
        return 0.0;
    }
    (value - baseline) / baseline * 100.0
}

pub fn posterior_summary(
    config: &ExperimentConfig,
    posteriors: &BTreeMap<String, Posterior>,
) -> Vec<PosteriorArmSummary> {
    let baseline_revenue = posteriors
        .get(&config.baseline)
        .map(Posterior::mean_revenue)
        .unwrap_or(0.0);

    posteriors
        .iter()
        .filter_map(|(label, p)| {
            let arm = config.price_arms.get(label)?;
            let uplift = if *label == config.baseline {
                0.0
            } else {
                uplift_pct(p.mean_revenue(), baseline_revenue)
            };
            Some(PosteriorArmSummary {
                arm: label.clone(),
                price: arm.price,
                posterior_mean_revenue: p.mean_revenue(),
                posterior_mean_churn: p.mean_churn(),
                n: p.n,
                uplift_vs_baseline_pct: uplift,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Monte Carlo best-arm probabilities
// ---------------------------------------------------------------------------

/// Probability each arm is best, and best by at least `margin` relative to
/// the runner-up, from `samples` joint Gamma draws.
///
/// Draws are taken arm by arm (all samples for the first label, then the
/// next). Trials whose runner-up draw is exactly zero, or whose top two draws
/// tie, never count as a margin win but stay in the denominator; this skews
/// the margin estimate low for very weak posteriors.
pub fn best_arm_probabilities<R: Rng + ?Sized>(
    posteriors: &BTreeMap<String, Posterior>,
    samples: usize,
    margin: f64,
    rng: &mut R,
) -> Result<Vec<ArmProbability>, PosteriorError> {
    let labels: Vec<&String> = posteriors.keys().collect();
    if samples == 0 || labels.is_empty() {
        return Ok(labels
            .into_iter()
            .map(|arm| ArmProbability { arm: arm.clone(), prob_best: 0.0, prob_best_by_margin: 0.0 })
            .collect());
    }

    let mut draws: Vec<Vec<f64>> = Vec::with_capacity(labels.len());
    for p in posteriors.values() {
        let dist = p.revenue_distribution()?;
        draws.push((0..samples).map(|_| dist.sample(rng)).collect());
    }

    let mut wins = vec![0u64; labels.len()];
    let mut margin_wins = vec![0u64; labels.len()];
    for t in 0..samples {
        let mut top = (0usize, f64::NEG_INFINITY);
        let mut second = f64::NEG_INFINITY;
        for (i, arm_draws) in draws.iter().enumerate() {
            let v = arm_draws[t];
            if v > top.1 {
                second = top.1;
                top = (i, v);
            } else if v > second {
                second = v;
            }
        }
        wins[top.0] += 1;

        if second.is_finite() && second != 0.0 && top.1 != second {
            let gap = (top.1 - second) / second;
            if gap >= margin {
                margin_wins[top.0] += 1;
            }
        }
    }

    let n = samples as f64;
    Ok(labels
        .into_iter()
        .enumerate()
        .map(|(i, arm)| ArmProbability {
            arm: arm.clone(),
            prob_best: wins[i] as f64 / n,
            prob_best_by_margin: margin_wins[i] as f64 / n,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

/// Safe arm with the highest posterior mean revenue (earliest label on
/// ties), or the baseline when nothing is safe.
pub fn recommend(
    config: &ExperimentConfig,
    posterior: &[PosteriorArmSummary],
    probabilities: &[ArmProbability],
    guardrails: &[GuardrailStatus],
) -> Recommendation {
    let is_safe = |arm: &str| guardrails.iter().any(|g| g.arm == arm && g.is_safe);

    let mut chosen: Option<&PosteriorArmSummary> = None;
    for p in posterior.iter().filter(|p| is_safe(&p.arm)) {
        match chosen {
            Some(c) if p.posterior_mean_revenue <= c.posterior_mean_revenue => {}
            _ => chosen = Some(p),
        }
    }

    let fell_back_to_baseline = chosen.is_none();
    let chosen = chosen.or_else(|| posterior.iter().find(|p| p.arm == config.baseline));

    let baseline_revenue = posterior
        .iter()
        .find(|p| p.arm == config.baseline)
        .map(|p| p.posterior_mean_revenue)
        .unwrap_or(0.0);

    let (arm, price, revenue) = match chosen {
        Some(p) => (p.arm.clone(), p.price, p.posterior_mean_revenue),
        None => (
            config.baseline.clone(),
            config.baseline_arm().map(|a| a.price).unwrap_or_default(),
            baseline_revenue,
        ),
    };

    let uplift = if arm == config.baseline { 0.0 } else { uplift_pct(revenue, baseline_revenue) };
    let confidence = probabilities
        .iter()
        .find(|p| p.arm == arm)
        .map(|p| p.prob_best_by_margin * 100.0)
        .unwrap_or(0.0);

    Recommendation {
        arm,
        price,
        uplift_pct: uplift,
        confidence_pct: confidence,
        fell_back_to_baseline,
    }
}

// ---------------------------------------------------------------------------
// Full analysis
// ---------------------------------------------------------------------------

/// Run the whole post-run pass: aggregates, Monte Carlo, final guardrail
/// table at the final baseline posterior, and the recommendation.
pub fn analyze<R: Rng + ?Sized>(
    config: &ExperimentConfig,
    posteriors: &BTreeMap<String, Posterior>,
    events: &[Event],
    rng: &mut R,
) -> Result<ExperimentAnalysis, PosteriorError> {
    let baseline_posterior = posteriors.get(&config.baseline).copied().unwrap_or_default();
    let guardrail_cap = match config.baseline_arm() {
        Some(arm) => guardrail::guardrail_cap(&baseline_posterior, arm, config.max_relative_churn_increase),
        None => baseline_posterior.mean_churn() * (1.0 + config.max_relative_churn_increase),
    };

    let observed = observed_summary(posteriors.keys(), events);
    let posterior = posterior_summary(config, posteriors);
    let probabilities = best_arm_probabilities(posteriors, config.best_arm_samples, config.uplift_margin, rng)?;
    let guardrails = guardrail::evaluate_all(
        posteriors,
        guardrail_cap,
        config.guardrail_confidence,
        config.final_churn_samples,
        rng,
    )?;
    let recommendation = recommend(config, &posterior, &probabilities, &guardrails);

    Ok(ExperimentAnalysis {
        guardrail_cap,
        observed,
        posterior,
        probabilities,
        guardrails,
        recommendation,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
