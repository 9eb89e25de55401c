#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use price_lab::outcome::OutcomeError;
    use price_lab::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn arms(table: &[(&str, f64, f64, f64)]) -> BTreeMap<String, PriceArm> {
        table.iter()
            .map(|&(label, price, revenue, churn)| (label.to_string(), PriceArm::from_f64(price, revenue, churn)))
            .collect()
    }

    fn three_arms() -> BTreeMap<String, PriceArm> {
        arms(&[("A", 10.0, 12.0, 0.20), ("B", 11.5, 13.0, 0.21), ("C", 13.0, 12.6, 0.26)])
    }

    /// Cheaper sampling so debug-mode test runs stay quick.
    fn fast(config: ExperimentConfig) -> ExperimentConfig {
        config.with_sample_counts(1_000, 2_000, 4_000)
    }

    fn typical(seed: u64) -> ExperimentConfig {
        fast(ExperimentConfig::new("Demo Creator", "demo-1", three_arms(), seed, 1_000, 0.10, 0.90))
    }

    // ========== Determinism ==========

    #[test]
    fn same_seed_same_result() {
        let first = run_experiment(&typical(999)).expect("test: valid run");
        let second = run_experiment(&typical(999)).expect("test: valid run");
        assert_eq!(first, second);
    }

    #[test]
    fn different_seed_different_events() {
        let first = run_experiment(&typical(1)).expect("test: valid run");
        let second = run_experiment(&typical(2)).expect("test: valid run");
        assert_ne!(first.events, second.events);
    }

    #[test]
    fn concurrent_runs_are_isolated() {
        let config = typical(31);
        let expected = run_experiment(&config).expect("test: valid run");
        let results: Vec<ExperimentResult> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| run_experiment(&config).expect("test: valid run")))
                .collect();
            handles.into_iter().map(|h| h.join().expect("test: thread")).collect()
        });
        for r in results {
            assert_eq!(r, expected);
        }
    }

    // ========== Selection protocol ==========

    #[test]
    fn forced_exploration_gives_every_arm_ten_events() {
        for arm_count in 2..=5usize {
            let labels = ["A", "B", "C", "D", "E"];
            let table: Vec<(&str, f64, f64, f64)> = labels[..arm_count]
                .iter()
                .enumerate()
                .map(|(i, &l)| (l, 10.0 + i as f64, 12.0 + i as f64, 0.2))
                .collect();
            let config = fast(ExperimentConfig::new("c", "c", arms(&table), 5, 200, 0.1, 0.9));
            let mut exp = PriceExperiment::new(config).expect("test: valid config");
            let mut source = SimulatedOutcomes::new();
            for _ in 0..(10 * arm_count) {
                exp.step(&mut source).expect("test: step");
            }
            for (label, p) in exp.posteriors() {
                assert_eq!(p.n, 10, "arm {label} after exploration");
            }
            for (i, e) in exp.events().iter().enumerate() {
                assert_eq!(e.arm, labels[i / 10]);
            }
        }
    }

    #[test]
    fn posteriors_only_accumulate() {
        let mut exp = PriceExperiment::new(fast(ExperimentConfig::new(
            "c", "c", three_arms(), 77, 300, 0.10, 0.90,
        )))
        .expect("test: valid config");
        let mut source = SimulatedOutcomes::new();

        while !exp.is_complete() {
            let before = exp.posteriors().clone();
            let event = exp.step(&mut source).expect("test: step");
            let after = exp.posteriors();
            for (label, prev) in &before {
                let next = &after[label];
                if *label == event.arm {
                    assert!(next.alpha >= prev.alpha);
                    assert!(next.beta > prev.beta);
                    assert!(next.a >= prev.a);
                    assert!(next.b >= prev.b);
                    assert_eq!(next.n, prev.n + 1);
                    assert!(((next.a + next.b) - (prev.a + prev.b) - 1.0).abs() < 1e-12);
                } else {
                    assert_eq!(next, prev, "untouched arm {label} changed");
                }
            }
        }
    }

    #[test]
    fn two_arm_minimum_never_adapts() {
        let config = fast(ExperimentConfig::new(
            "c", "c", arms(&[("A", 10.0, 12.0, 0.2), ("B", 11.0, 12.5, 0.21)]), 3, 20, 0.1, 0.9,
        ));
        let mut exp = PriceExperiment::new(config).expect("test: valid config");
        let mut source = SimulatedOutcomes::new();
        while !exp.is_complete() {
            let (_, phase) = exp.next_arm().expect("test: next arm");
            assert_eq!(phase, SelectionPhase::Exploration);
            let event = exp.step(&mut source).expect("test: step");
            assert!(event.seq < 20);
        }
        let result = exp.finish().expect("test: finish");
        assert_eq!(result.event_count, 20);
        assert_eq!(result.posterior_for("A").map(|p| p.n), Some(10));
        assert_eq!(result.posterior_for("B").map(|p| p.n), Some(10));
    }

    // ========== Post-run analysis ==========

    #[test]
    fn probability_of_best_sums_to_one() {
        let result = run_experiment(&typical(12)).expect("test: valid run");
        let total: f64 = result.analysis.probabilities.iter().map(|p| p.prob_best).sum();
        assert!((total - 1.0).abs() < 1e-9, "total {total}");
    }

    #[test]
    fn guardrail_flags_match_threshold() {
        for seed in [4, 5, 6] {
            let config = typical(seed);
            let result = run_experiment(&config).expect("test: valid run");
            for g in &result.analysis.guardrails {
                if g.is_safe {
                    assert!(g.prob_churn_violates_guardrail < config.guardrail_confidence, "{g:?}");
                } else {
                    assert!(g.prob_churn_violates_guardrail >= config.guardrail_confidence, "{g:?}");
                }
            }
        }
    }

    #[test]
    fn baseline_uplift_is_zero() {
        let result = run_experiment(&typical(8)).expect("test: valid run");
        let baseline = result.posterior_for("A").expect("test: baseline row");
        assert_eq!(baseline.uplift_vs_baseline_pct, 0.0);
        if result.recommendation().arm == "A" {
            assert_eq!(result.recommendation().uplift_pct, 0.0);
        }
    }

    #[test]
    fn observed_and_posterior_counts_agree() {
        let result = run_experiment(&typical(13)).expect("test: valid run");
        let observed_total: u64 = result.analysis.observed.iter().map(|o| o.count).sum();
        assert_eq!(observed_total, 1_000);
        for o in &result.analysis.observed {
            let p = result.posterior_for(&o.arm).expect("test: posterior row");
            assert_eq!(o.count, p.n);
        }
    }

    #[test]
    fn recommendation_follows_the_rule() {
        let config = typical(999);
        let result = run_experiment(&config).expect("test: valid run");
        let rec = result.recommendation();
        let safe: Vec<&GuardrailStatus> = result.analysis.guardrails.iter().filter(|g| g.is_safe).collect();

        if safe.is_empty() {
            assert!(rec.fell_back_to_baseline);
            assert_eq!(rec.arm, "A");
        } else {
            assert!(!rec.fell_back_to_baseline);
            let best_safe = safe
                .iter()
                .map(|g| result.posterior_for(&g.arm).expect("test: posterior row").posterior_mean_revenue)
                .fold(f64::NEG_INFINITY, f64::max);
            let rec_revenue = result.posterior_for(&rec.arm).expect("test: posterior row").posterior_mean_revenue;
            assert_eq!(rec_revenue, best_safe);
        }

        let prob = result.probability_for(&rec.arm).expect("test: probability row");
        assert!((rec.confidence_pct - prob.prob_best_by_margin * 100.0).abs() < 1e-9);
        assert_eq!(rec.price, config.price_arms[&rec.arm].price);
    }

    #[test]
    fn analysis_is_idempotent_on_frozen_state() {
        let mut exp = PriceExperiment::new(typical(21)).expect("test: valid config");
        exp.run(&mut SimulatedOutcomes::new()).expect("test: run");
        let frozen = exp.posteriors().clone();

        let first = exp.analyze_with(&mut ChaCha8Rng::seed_from_u64(5)).expect("test: analysis");
        let second = exp.analyze_with(&mut ChaCha8Rng::seed_from_u64(5)).expect("test: analysis");
        assert_eq!(first, second);
        assert_eq!(exp.posteriors(), &frozen);
        assert_eq!(exp.events().len(), 1_000);
    }

    // ========== Scenarios ==========

    #[test]
    fn typical_three_arm_prefers_b_over_c() {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for seed in 0..12 {
            let result = run_experiment(&typical(seed)).expect("test: valid run");
            *counts.entry(result.recommendation().arm.clone()).or_insert(0) += 1;
        }
        let b = counts.get("B").copied().unwrap_or(0);
        let c = counts.get("C").copied().unwrap_or(0);
        assert!(b > c, "B recommended {b} times, C {c} times: {counts:?}");
    }

    #[test]
    fn heavy_churn_arm_rejected_by_guardrail() {
        let table = arms(&[("A", 10.0, 12.0, 0.20), ("B", 12.0, 13.0, 0.50)]);
        let mut rejected = 0;
        for seed in 0..20 {
            let config = fast(ExperimentConfig::new("c", "c", table.clone(), seed, 400, 0.10, 0.90));
            let result = run_experiment(&config).expect("test: valid run");
            let b = result.guardrail_for("B").expect("test: guardrail row");
            if !b.is_safe {
                rejected += 1;
            }
        }
        assert!(rejected >= 14, "only {rejected}/20 runs rejected the heavy-churn arm");
    }

    #[test]
    fn non_first_baseline_drives_cap_and_uplift() {
        let config = typical(17).with_baseline("B");
        let result = run_experiment(&config).expect("test: valid run");
        assert_eq!(result.baseline, "B");

        let b = result.posterior_for("B").expect("test: posterior row");
        assert_eq!(b.uplift_vs_baseline_pct, 0.0);
        let expected_cap = b.posterior_mean_churn * 1.10;
        assert!((result.analysis.guardrail_cap - expected_cap).abs() < 1e-12);

        let rec = result.recommendation();
        let rec_revenue = result.posterior_for(&rec.arm).expect("test: posterior row").posterior_mean_revenue;
        let expected_uplift = (rec_revenue - b.posterior_mean_revenue) / b.posterior_mean_revenue * 100.0;
        assert!((rec.uplift_pct - expected_uplift).abs() < 1e-9);
    }

    // ========== Entry points and errors ==========

    #[test]
    fn positional_entry_point_uses_first_label_as_baseline() {
        let result = run_experiment_with("Demo", "demo-1", three_arms(), 999, 60, 0.10, 0.90)
            .expect("test: valid run");
        assert_eq!(result.baseline, "A");
        assert_eq!(result.creator_name, "Demo");
        assert_eq!(result.creator_id, "demo-1");
        assert_eq!(result.events.len(), 60);
    }

    #[test]
    fn invalid_configurations_fail_fast() {
        let cases = vec![
            ExperimentConfig::new("c", "c", arms(&[("A", 10.0, 12.0, 0.2)]), 1, 100, 0.1, 0.9),
            typical(1).with_event_count(29),
            typical(1).with_baseline("Z"),
            ExperimentConfig::new("c", "c", arms(&[("A", 10.0, 12.0, 0.2), ("B", -1.0, 12.0, 0.2)]), 1, 100, 0.1, 0.9),
            ExperimentConfig::new("c", "c", arms(&[("A", 10.0, 0.0, 0.2), ("B", 11.0, 12.0, 0.2)]), 1, 100, 0.1, 0.9),
            ExperimentConfig::new("c", "c", arms(&[("A", 10.0, 12.0, -0.1), ("B", 11.0, 12.0, 0.2)]), 1, 100, 0.1, 0.9),
        ];
        for config in cases {
            let err = run_experiment(&config).expect_err("test: invalid config");
            assert!(err.is_invalid_configuration(), "{err}");
        }
    }

    // ========== Real outcome ingestion ==========

    /// Fixed outcomes per arm, standing in for observed subscriber data.
    struct Recorded {
        revenue: BTreeMap<String, f64>,
    }

    impl OutcomeSource<ChaCha8Rng> for Recorded {
        fn observe(&mut self, label: &str, _arm: &PriceArm, _rng: &mut ChaCha8Rng) -> Result<Outcome, OutcomeError> {
            Ok(Outcome { revenue: self.revenue[label], churned: false })
        }
    }

    #[test]
    fn external_outcomes_replace_simulation() {
        let mut source = Recorded {
            revenue: [("A".to_string(), 5.0), ("B".to_string(), 50.0), ("C".to_string(), 6.0)]
                .into_iter()
                .collect(),
        };
        let mut exp = PriceExperiment::new(fast(ExperimentConfig::new(
            "c", "c", three_arms(), 2, 200, 0.10, 0.90,
        )))
        .expect("test: valid config");
        exp.run(&mut source).expect("test: run");
        let result = exp.finish().expect("test: finish");

        let b = result.observed_for("B").expect("test: observed row");
        assert!(b.count > 150, "Thompson should exploit B, got {}", b.count);
        assert_eq!(b.mean_revenue, 50.0);
        assert_eq!(b.mean_churn, 0.0);
        assert_eq!(result.recommendation().arm, "B");
    }
}
