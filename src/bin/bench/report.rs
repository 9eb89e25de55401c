// Benchmark Report Types
// Structured output for offline analysis of recommendation stability

use std::collections::BTreeMap;

use serde::Serialize;

// ─── Statistics (per-metric Monte Carlo aggregation) ────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let stderr = std_dev / (n as f64).sqrt();
        let z = 1.96; // 95% CI
        Self {
            mean,
            std_dev,
            ci_lower: mean - z * stderr,
            ci_upper: mean + z * stderr,
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }
}

// ─── Single-Run Result ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct BenchResult {
    pub scenario: String,
    pub name: String,
    pub category: String,
    pub seed: u64,
    pub pass: bool,
    pub failures: Vec<String>,
    pub recommended_arm: String,
    pub recommended_price: String,
    pub uplift_pct: f64,
    pub confidence_pct: f64,
    pub fell_back_to_baseline: bool,
    pub guardrail_cap: f64,
    pub unsafe_arms: Vec<String>,
    pub fail_open_events: u64,
    pub events_per_arm: BTreeMap<String, u64>,
    pub event_count: u64,
    pub elapsed_ms: u128,
}

// ─── Monte Carlo Report (per-scenario aggregation) ──────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloReport {
    pub scenario_name: String,
    pub label: String,
    pub category: String,
    pub n_runs: usize,
    pub pass_rate: f64,
    /// Share of runs recommending each arm.
    pub recommendation_share: BTreeMap<String, f64>,
    /// Share of runs whose final table flags each arm unsafe.
    pub unsafe_share: BTreeMap<String, f64>,
    pub baseline_fallback_rate: f64,
    pub uplift_pct: Stats,
    pub confidence_pct: Stats,
    pub fail_open_events: Stats,
    pub elapsed_ms: Stats,
    pub individual_runs: Vec<BenchResult>,
}

impl MonteCarloReport {
    /// Most frequently recommended arm and its share.
    pub fn modal_recommendation(&self) -> Option<(&str, f64)> {
        self.recommendation_share
            .iter()
            .fold(None, |best: Option<(&str, f64)>, (arm, &share)| match best {
                Some((_, s)) if share <= s => best,
                _ => Some((arm.as_str(), share)),
            })
    }
}

// ─── Top-Level Report ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct BenchReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub n_runs_per_scenario: usize,
    pub base_seed: u64,
    pub summary: Summary,
    pub scenarios: Vec<MonteCarloReport>,
}
