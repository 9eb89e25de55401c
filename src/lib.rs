// Copyright 2026 Price Lab contributors. All rights reserved.
// Price experiment engine ("Price Lab")

pub mod types;
pub mod money;
pub mod config;
pub mod posterior;
pub mod outcome;
pub mod guardrail;
pub mod selection;
pub mod analysis;
pub mod simulation;
pub mod projection;

pub use types::*;
pub use money::Money;
pub use config::{ConfigError, ExperimentConfig};
pub use posterior::Posterior;
pub use outcome::{Outcome, OutcomeSource, SimulatedOutcomes};
pub use selection::SelectionPhase;
pub use simulation::{run_experiment, run_experiment_with, ExperimentError, PriceExperiment};
pub use projection::{best_scenario, candidate_price_ladder, project_price_scenarios, PriceScenario};

use wasm_bindgen::prelude::*;

// ─── WASM Interface ──────────────────────────────────────────────────────────

fn install_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
}

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Run a full experiment from a JS object shaped like [`ExperimentConfig`].
#[wasm_bindgen(js_name = runPriceExperiment)]
pub fn run_price_experiment(config: JsValue) -> Result<JsValue, JsValue> {
    install_panic_hook();
    let config: ExperimentConfig = serde_wasm_bindgen::from_value(config).map_err(to_js_error)?;
    let result = run_experiment(&config).map_err(to_js_error)?;
    serde_wasm_bindgen::to_value(&result).map_err(to_js_error)
}

/// MRR projection over an evenly spaced price ladder.
#[wasm_bindgen(js_name = projectPriceScenarios)]
pub fn project_scenarios(
    current_price: f64,
    current_subscribers: u32,
    min_test_price: f64,
    max_test_price: f64,
    steps: usize,
    churn_pct: f64,
    upgrade_pct: f64,
) -> Result<JsValue, JsValue> {
    install_panic_hook();
    let ladder = candidate_price_ladder(
        Money::from_f64(min_test_price),
        Money::from_f64(max_test_price),
        steps,
    )
    .map_err(to_js_error)?;
    let rows = project_price_scenarios(
        Money::from_f64(current_price),
        u64::from(current_subscribers),
        &ladder,
        churn_pct,
        upgrade_pct,
    )
    .map_err(to_js_error)?;
    serde_wasm_bindgen::to_value(&rows).map_err(to_js_error)
}
