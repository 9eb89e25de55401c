// Price Lab Benchmark Runner: recommendation stability across seeds
// Monte Carlo (N=30), seedable ChaCha8 PRNG, per-event JSONL audit trail
//
// Usage:
//   cargo run --release --bin bench                         # Run all scenarios (30 runs each)
//   cargo run --release --bin bench -- --runs 5             # Quick mode (5 runs each)
//   cargo run --release --bin bench -- GUARDRAIL            # Filter by name
//   cargo run --release --bin bench -- --event-log          # Write first-seed event JSONL
//   cargo run --release --bin bench -- --config exp.json    # Run a custom ExperimentConfig

mod event_log;
mod monte_carlo;
mod report;
mod scenarios;

use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use clap::Parser;
use price_lab::ExperimentConfig;
use tracing::{info, warn};

use event_log::EventLogRecorder;
use report::*;
use scenarios::*;

// ─── CLI Parsing ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "bench")]
#[command(about = "Monte Carlo benchmark for the guardrailed price experiment engine")]
#[command(version)]
struct CliArgs {
    /// Runs per scenario
    #[arg(long, default_value_t = 30)]
    runs: usize,

    /// Base seed; run i uses seed + i
    #[arg(long, default_value_t = 0, env = "PRICE_LAB_SEED")]
    seed: u64,

    /// Override every scenario's event count
    #[arg(long)]
    events: Option<u64>,

    /// Write the first seed's per-event table as JSONL
    #[arg(long, default_value_t = false)]
    event_log: bool,

    /// Run an ExperimentConfig JSON file instead of the built-in scenarios
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(long, default_value = "benchmark-results")]
    out: PathBuf,

    /// Case-insensitive scenario filter (name, label or category)
    filter: Option<String>,
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bench=info,price_lab=warn".into()),
        )
        .init();

    let cli = CliArgs::parse();

    let all_scenarios = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            let config = ExperimentConfig::from_json(&json)?;
            config.validate()?;
            vec![custom(config)]
        }
        None => scenarios(),
    };

    let to_run: Vec<&Scenario> = match &cli.filter {
        Some(f) => {
            let f_lower = f.to_lowercase();
            all_scenarios.iter()
                .filter(|s| s.name.to_lowercase().contains(&f_lower)
                          || s.label.to_lowercase().contains(&f_lower)
                          || s.category.to_lowercase().contains(&f_lower))
                .collect()
        }
        None => all_scenarios.iter().collect(),
    };

    if to_run.is_empty() {
        return Err(format!("no scenarios match filter: {:?}", cli.filter).into());
    }

    info!(runs = cli.runs, seed = cli.seed, scenarios = to_run.len(), "starting benchmark");
    println!("\n  Price Lab Benchmark Runner");
    println!("  PRNG: ChaCha8Rng | Runs/scenario: {} | Base seed: {}", cli.runs, cli.seed);
    println!("  {:<24} {:>5} {:>10} {:>14} {:>12} {:>9} {:>7}",
        "Scenario", "Pass%", "Top arm", "Uplift%", "Conf%", "Fallback", "Time");
    println!("  {}", "-".repeat(88));

    let suite_start = Instant::now();
    let mut mc_reports = Vec::new();

    for scenario in &to_run {
        let mut recorder = if cli.event_log { Some(EventLogRecorder::new()) } else { None };
        let report = monte_carlo::run_monte_carlo(
            scenario,
            cli.runs,
            cli.seed,
            cli.events,
            recorder.as_mut(),
        )?;

        if let Some(rec) = &recorder {
            let path = cli.out
                .join("events")
                .join(format!("{}-seed-{}.jsonl", scenario.name.to_lowercase(), cli.seed));
            match rec.write_jsonl(&path) {
                Ok(()) => info!(rows = rec.len(), path = %path.display(), "event log written"),
                Err(e) => warn!(error = %e, "failed to write event log"),
            }
        }

        let pass_pct = report.pass_rate * 100.0;
        let (top_arm, top_share) = report.modal_recommendation().unwrap_or(("-", 0.0));
        let uplift_ci = (report.uplift_pct.ci_upper - report.uplift_pct.ci_lower) / 2.0;
        let status = if report.pass_rate >= 0.9 { "PASS" } else { "FAIL" };

        println!("  {:<24} {:>4}% {:>5} {:>3.0}% {:>7.2}±{:<5.2} {:>12.1} {:>8.0}% {:>5.0}ms  {}",
            report.label,
            pass_pct as u32,
            top_arm,
            top_share * 100.0,
            report.uplift_pct.mean,
            uplift_ci,
            report.confidence_pct.mean,
            report.baseline_fallback_rate * 100.0,
            report.elapsed_ms.mean,
            status,
        );

        mc_reports.push(report);
    }

    let suite_elapsed = suite_start.elapsed();

    // ─── Summary ────────────────────────────────────────────────────────

    let total = mc_reports.len();
    let passed = mc_reports.iter().filter(|r| r.pass_rate >= 0.9).count();
    let failed = total - passed;

    println!("  {}", "-".repeat(88));
    println!("  Total: {}  Passed: {}  Failed: {}  Suite time: {:.1}s\n",
        total, passed, failed, suite_elapsed.as_secs_f64());

    // ─── Write JSON Report ──────────────────────────────────────────────

    let ts = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
    let timestamp = format!("{}", ts);

    let report = BenchReport {
        timestamp: timestamp.clone(),
        version: env!("CARGO_PKG_VERSION"),
        prng: "ChaCha8Rng",
        n_runs_per_scenario: cli.runs,
        base_seed: cli.seed,
        summary: Summary {
            total,
            passed,
            failed,
            pass_rate: passed as f64 / total as f64,
        },
        scenarios: mc_reports,
    };

    std::fs::create_dir_all(&cli.out)?;
    let path = cli.out.join(format!("bench-{}.json", timestamp));
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&path, &json)?;
    println!("  Results saved to: {}\n", path.display());

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
