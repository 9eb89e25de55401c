// Copyright 2026 Price Lab contributors. All rights reserved.
// Price experiment engine - Conjugate posteriors

//! Per-arm conjugate belief state.
//!
//! Revenue uses a Gamma(alpha, rate = beta) belief over the mean 30-day
//! revenue; churn uses a Beta(a, b) belief over the churn probability. Both
//! start from a flat `(1, 1)` prior and only ever accumulate evidence.

use rand::Rng;
use rand_distr::{Beta, Distribution, Gamma};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A posterior whose parameters cannot define a sampling distribution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PosteriorError {
    #[error("gamma posterior rejected: alpha={alpha}, beta={beta}")]
    Gamma { alpha: f64, beta: f64 },

    #[error("beta posterior rejected: a={a}, b={b}")]
    Beta { a: f64, b: f64 },
}

// ---------------------------------------------------------------------------
// Posterior
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posterior {
    pub alpha: f64,
    pub beta: f64,
    pub a: f64,
    pub b: f64,
    pub n: u64,
}

impl Default for Posterior {
    fn default() -> Self {
        Self { alpha: 1.0, beta: 1.0, a: 1.0, b: 1.0, n: 0 }
    }
}

impl Posterior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observed outcome into the belief.
    ///
    /// Negative revenue is clamped to zero so `alpha` stays monotone.
    pub fn update(&mut self, revenue: f64, churned: bool) {
        let churn = if churned { 1.0 } else { 0.0 };
        self.alpha += revenue.max(0.0);
        self.beta += 1.0;
        self.a += churn;
        self.b += 1.0 - churn;
        self.n += 1;
    }

    pub fn mean_revenue(&self) -> f64 {
        self.alpha / self.beta
    }

    pub fn mean_churn(&self) -> f64 {
        self.a / (self.a + self.b)
    }

    /// Combined churn pseudo-count. The flat prior alone contributes 2.
    pub fn churn_pseudo_count(&self) -> f64 {
        self.a + self.b
    }

    /// True once at least one churn outcome has been folded in.
    pub fn has_churn_evidence(&self) -> bool {
        self.churn_pseudo_count() > 2.0
    }

    pub fn revenue_distribution(&self) -> Result<Gamma<f64>, PosteriorError> {
        Gamma::new(self.alpha, 1.0 / self.beta).map_err(|_| PosteriorError::Gamma {
            alpha: self.alpha,
            beta: self.beta,
        })
    }

    pub fn churn_distribution(&self) -> Result<Beta<f64>, PosteriorError> {
        Beta::new(self.a, self.b).map_err(|_| PosteriorError::Beta { a: self.a, b: self.b })
    }

    /// One Thompson draw from the revenue belief.
    pub fn sample_revenue<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, PosteriorError> {
        Ok(self.revenue_distribution()?.sample(rng))
    }

    /// Monte Carlo estimate of P(churn > cap) from `samples` Beta draws.
    pub fn prob_churn_exceeds<R: Rng + ?Sized>(
        &self,
        cap: f64,
        samples: usize,
        rng: &mut R,
    ) -> Result<f64, PosteriorError> {
        if samples == 0 {
            return Ok(0.0);
        }
        let dist = self.churn_distribution()?;
        let above = (0..samples).filter(|_| dist.sample(rng) > cap).count();
        Ok(above as f64 / samples as f64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn flat_prior() {
        let p = Posterior::new();
        assert_eq!(p.mean_revenue(), 1.0);
        assert_eq!(p.mean_churn(), 0.5);
        assert_eq!(p.n, 0);
        assert!(!p.has_churn_evidence());
    }

    #[test]
    fn update_adds_evidence() {
        let mut p = Posterior::new();
        p.update(12.5, true);
        p.update(7.5, false);
        assert_eq!(p.alpha, 21.0);
        assert_eq!(p.beta, 3.0);
        assert_eq!(p.a, 2.0);
        assert_eq!(p.b, 2.0);
        assert_eq!(p.n, 2);
        assert!((p.mean_revenue() - 7.0).abs() < 1e-12);
        assert!(p.has_churn_evidence());
    }

    #[test]
    fn negative_revenue_does_not_shrink_alpha() {
        let mut p = Posterior::new();
        p.update(-3.0, false);
        assert_eq!(p.alpha, 1.0);
        assert_eq!(p.beta, 2.0);
    }

    #[test]
    fn high_churn_posterior_exceeds_low_cap() {
        let mut p = Posterior::new();
        for i in 0..100 {
            p.update(10.0, i % 2 == 0);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let prob = p.prob_churn_exceeds(0.22, 5_000, &mut rng).expect("test: valid posterior");
        assert!(prob > 0.99, "churn ~0.5 should clear a 0.22 cap, got {prob}");
    }

    #[test]
    fn low_churn_posterior_stays_under_high_cap() {
        let mut p = Posterior::new();
        for i in 0..200 {
            p.update(10.0, i % 10 == 0);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let prob = p.prob_churn_exceeds(0.3, 5_000, &mut rng).expect("test: valid posterior");
        assert!(prob < 0.01, "churn ~0.1 should sit under a 0.3 cap, got {prob}");
    }

    #[test]
    fn revenue_draws_center_on_mean() {
        let mut p = Posterior::new();
        for _ in 0..400 {
            p.update(12.0, false);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let draws: Vec<f64> = (0..2_000)
            .map(|_| p.sample_revenue(&mut rng).expect("test: valid posterior"))
            .collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        assert!((mean - p.mean_revenue()).abs() < 0.1, "sample mean {mean}");
    }

    #[test]
    fn invalid_parameters_surface_as_errors() {
        let p = Posterior { alpha: 0.0, beta: 1.0, a: 1.0, b: 1.0, n: 0 };
        assert!(matches!(p.revenue_distribution(), Err(PosteriorError::Gamma { .. })));
        let p = Posterior { alpha: 1.0, beta: 1.0, a: -1.0, b: 1.0, n: 0 };
        assert!(matches!(p.churn_distribution(), Err(PosteriorError::Beta { .. })));
    }
}
