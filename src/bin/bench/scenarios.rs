// Scenario Definitions: named price experiments with pass criteria
// Each scenario is a base ExperimentConfig; the runner only swaps the seed

use std::collections::BTreeMap;

use price_lab::{ExperimentConfig, PriceArm};

// ─── Scenario Configuration ─────────────────────────────────────────────────

pub struct Scenario {
    pub name: String,
    pub label: String,
    pub category: String,
    pub config: ExperimentConfig,
    pub criteria: PassCriteria,
}

impl Scenario {
    pub fn config_for_seed(&self, seed: u64, event_override: Option<u64>) -> ExperimentConfig {
        let mut config = self.config.clone().with_seed(seed);
        if let Some(events) = event_override {
            let floor = config.exploration_events();
            config = config.with_event_count(events.max(floor));
        }
        config
    }
}

/// Per-run checks. A run passes when every set criterion holds.
#[derive(Default)]
pub struct PassCriteria {
    /// Arm the recommendation should land on.
    pub expected_arm: Option<&'static str>,
    /// Arms the final guardrail table must reject.
    pub must_be_unsafe: &'static [&'static str],
    /// Every arm must end with exactly this many events.
    pub exact_events_per_arm: Option<u64>,
    /// Upper bound on recommendation confidence (%), for indistinguishable arms.
    pub max_confidence_pct: Option<f64>,
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn arms(table: &[(&str, f64, f64, f64)]) -> BTreeMap<String, PriceArm> {
    table.iter()
        .map(|&(label, price, revenue, churn)| (label.to_string(), PriceArm::from_f64(price, revenue, churn)))
        .collect()
}

fn scenario(
    name: &str,
    label: &str,
    category: &str,
    arm_table: &[(&str, f64, f64, f64)],
    event_count: u64,
    criteria: PassCriteria,
) -> Scenario {
    let config = ExperimentConfig::new(
        label,
        name.to_lowercase(),
        arms(arm_table),
        0,
        event_count,
        0.10,
        0.90,
    );
    Scenario {
        name: name.to_string(),
        label: label.to_string(),
        category: category.to_string(),
        config,
        criteria,
    }
}

/// Wrap a user-supplied config so it runs through the same Monte Carlo path.
pub fn custom(config: ExperimentConfig) -> Scenario {
    Scenario {
        name: "CUSTOM".to_string(),
        label: format!("Custom ({})", config.creator_name),
        category: "custom".to_string(),
        config,
        criteria: PassCriteria::default(),
    }
}

// ─── Scenario Definitions ───────────────────────────────────────────────────

pub fn scenarios() -> Vec<Scenario> {
    let mut all = vec![
        // ─── Typical ────────────────────────────────────────────────────
        scenario("TYPICAL_THREE_ARM", "Typical Three Arm", "typical",
            &[("A", 10.0, 12.0, 0.20), ("B", 11.5, 13.0, 0.21), ("C", 13.0, 12.6, 0.26)],
            1_000,
            PassCriteria { expected_arm: Some("B"), ..Default::default() }),
        scenario("WIDE_LADDER", "Wide Ladder", "typical",
            &[("A", 8.0, 10.0, 0.18), ("B", 10.0, 11.5, 0.19), ("C", 12.0, 12.8, 0.19),
              ("D", 14.0, 13.2, 0.24), ("E", 16.0, 13.6, 0.32)],
            2_000,
            PassCriteria { must_be_unsafe: &["E"], ..Default::default() }),
        scenario("FLAT_PRICES", "Flat Prices", "typical",
            &[("A", 10.0, 12.0, 0.20), ("B", 10.5, 12.0, 0.20)],
            600,
            PassCriteria { max_confidence_pct: Some(60.0), ..Default::default() }),

        // ─── Guardrail ──────────────────────────────────────────────────
        scenario("GUARDRAIL_REJECTION", "Guardrail Rejection", "guardrail",
            &[("A", 10.0, 12.0, 0.20), ("B", 12.0, 15.0, 0.50)],
            800,
            PassCriteria { expected_arm: Some("A"), must_be_unsafe: &["B"], ..Default::default() }),

        // ─── Edge ───────────────────────────────────────────────────────
        scenario("TWO_ARM_MINIMUM", "Two Arm Minimum", "edge",
            &[("A", 10.0, 12.0, 0.20), ("B", 11.0, 12.5, 0.21)],
            20,
            PassCriteria { exact_events_per_arm: Some(10), ..Default::default() }),
    ];

    // Baseline in the middle of the ladder rather than the cheapest arm.
    let mut mid = scenario("MID_BASELINE", "Mid Baseline", "edge",
        &[("high", 14.0, 12.5, 0.30), ("low", 9.0, 11.0, 0.20), ("mid", 11.0, 13.0, 0.21)],
        1_000,
        PassCriteria { must_be_unsafe: &["high"], ..Default::default() });
    mid.config = mid.config.with_baseline("mid");
    all.push(mid);

    all
}
