// Monte Carlo Infrastructure: N runs per scenario with statistical aggregation
// Each scenario runs N times with seeds base..base+N, computing mean ± 95% CI

use std::collections::BTreeMap;
use std::time::Instant;

use price_lab::{ExperimentError, PriceExperiment, SimulatedOutcomes};
use tracing::debug;

use crate::event_log::EventLogRecorder;
use crate::report::*;
use crate::scenarios::Scenario;

/// Run a single scenario iteration with a specific seed.
pub fn run_single(
    scenario: &Scenario,
    seed: u64,
    event_override: Option<u64>,
    event_log: Option<&mut EventLogRecorder>,
) -> Result<BenchResult, ExperimentError> {
    let start = Instant::now();
    let config = scenario.config_for_seed(seed, event_override);

    let mut experiment = PriceExperiment::new(config)?;
    experiment.run(&mut SimulatedOutcomes::new())?;
    let fail_open_events = experiment.fail_open_events();
    let result = experiment.finish()?;

    if let Some(log) = event_log {
        log.record_all(&result.events);
    }

    let elapsed_ms = start.elapsed().as_millis();
    let rec = result.recommendation();
    let unsafe_arms: Vec<String> = result
        .analysis
        .guardrails
        .iter()
        .filter(|g| !g.is_safe)
        .map(|g| g.arm.clone())
        .collect();
    let events_per_arm: BTreeMap<String, u64> = result
        .analysis
        .posterior
        .iter()
        .map(|p| (p.arm.clone(), p.n))
        .collect();

    // Evaluate pass/fail
    let criteria = &scenario.criteria;
    let mut failures = Vec::new();
    if let Some(expected) = criteria.expected_arm {
        if rec.arm != expected {
            failures.push(format!("recommended {} instead of {}", rec.arm, expected));
        }
    }
    for arm in criteria.must_be_unsafe {
        if !unsafe_arms.iter().any(|u| u == arm) {
            failures.push(format!("arm {} passed the guardrail", arm));
        }
    }
    if let Some(exact) = criteria.exact_events_per_arm {
        for (arm, n) in &events_per_arm {
            if *n != exact {
                failures.push(format!("arm {} saw {} events, expected {}", arm, n, exact));
            }
        }
    }
    if let Some(max_conf) = criteria.max_confidence_pct {
        if rec.confidence_pct > max_conf {
            failures.push(format!("confidence {:.1}% above {:.1}%", rec.confidence_pct, max_conf));
        }
    }
    debug!(scenario = %scenario.name, seed, failures = failures.len(), "run complete");

    Ok(BenchResult {
        scenario: scenario.label.clone(),
        name: scenario.name.clone(),
        category: scenario.category.clone(),
        seed,
        pass: failures.is_empty(),
        failures,
        recommended_arm: rec.arm.clone(),
        recommended_price: rec.price.to_string(),
        uplift_pct: rec.uplift_pct,
        confidence_pct: rec.confidence_pct,
        fell_back_to_baseline: rec.fell_back_to_baseline,
        guardrail_cap: result.analysis.guardrail_cap,
        unsafe_arms,
        fail_open_events,
        events_per_arm,
        event_count: result.event_count,
        elapsed_ms,
    })
}

/// Run Monte Carlo: N runs of a scenario, aggregate stats. The event log,
/// when given, captures only the first seed.
pub fn run_monte_carlo(
    scenario: &Scenario,
    n_runs: usize,
    base_seed: u64,
    event_override: Option<u64>,
    mut event_log: Option<&mut EventLogRecorder>,
) -> Result<MonteCarloReport, ExperimentError> {
    let mut results = Vec::with_capacity(n_runs);
    for i in 0..n_runs {
        let seed = base_seed.wrapping_add(i as u64);
        let log = if i == 0 { event_log.as_deref_mut() } else { None };
        results.push(run_single(scenario, seed, event_override, log)?);
    }
    Ok(aggregate(scenario, results))
}

fn share_by<'a>(results: &'a [BenchResult], keys: impl Fn(&'a BenchResult) -> Vec<&'a str>) -> BTreeMap<String, f64> {
    let n = results.len().max(1) as f64;
    let mut counts: BTreeMap<String, f64> = BTreeMap::new();
    for r in results {
        for k in keys(r) {
            *counts.entry(k.to_string()).or_insert(0.0) += 1.0;
        }
    }
    counts.values_mut().for_each(|c| *c /= n);
    counts
}

/// Aggregate individual runs into a MonteCarloReport.
fn aggregate(scenario: &Scenario, results: Vec<BenchResult>) -> MonteCarloReport {
    let n = results.len();
    let passed = results.iter().filter(|r| r.pass).count();
    let pass_rate = if n > 0 { passed as f64 / n as f64 } else { 0.0 };

    let recommendation_share = share_by(&results, |r| vec![r.recommended_arm.as_str()]);
    let unsafe_share = share_by(&results, |r| r.unsafe_arms.iter().map(String::as_str).collect());
    let baseline_fallback_rate = if n > 0 {
        results.iter().filter(|r| r.fell_back_to_baseline).count() as f64 / n as f64
    } else {
        0.0
    };

    let uplift_pct = Stats::from_samples(
        &results.iter().map(|r| r.uplift_pct).collect::<Vec<_>>()
    );
    let confidence_pct = Stats::from_samples(
        &results.iter().map(|r| r.confidence_pct).collect::<Vec<_>>()
    );
    let fail_open_events = Stats::from_samples(
        &results.iter().map(|r| r.fail_open_events as f64).collect::<Vec<_>>()
    );
    let elapsed_ms = Stats::from_samples(
        &results.iter().map(|r| r.elapsed_ms as f64).collect::<Vec<_>>()
    );

    MonteCarloReport {
        scenario_name: scenario.name.clone(),
        label: scenario.label.clone(),
        category: scenario.category.clone(),
        n_runs: n,
        pass_rate,
        recommendation_share,
        unsafe_share,
        baseline_fallback_rate,
        uplift_pct,
        confidence_pct,
        fail_open_events,
        elapsed_ms,
        individual_runs: results,
    }
}
