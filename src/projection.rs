// Copyright 2026 Price Lab contributors. All rights reserved.
// Price experiment engine - MRR price scenario projection

//! Deterministic MRR what-if table for a ladder of candidate prices.
//!
//! Complements the bandit: a creator sees, before running anything, how a
//! flat churn / upgrade assumption plays out at each price.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::money::Money;

pub const MIN_LADDER_STEPS: usize = 2;
pub const MAX_LADDER_STEPS: usize = 7;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("ladder needs 2..=7 steps, got {0}")]
    InvalidSteps(usize),

    #[error("ladder bounds must satisfy 0 < min <= max, got min={min} max={max}")]
    InvalidBounds { min: Money, max: Money },

    #[error("current price must be positive")]
    NonPositivePrice,

    #[error("at least one current subscriber is required")]
    NoSubscribers,

    #[error("{field} must lie in [0, 100], got {value}")]
    InvalidPercent { field: &'static str, value: f64 },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceScenario {
    pub test_price: Money,
    pub stayers: u64,
    pub upgraded: u64,
    pub churned: u64,
    pub current_mrr: Money,
    pub projected_mrr: Money,
    pub mrr_lift: Money,
    pub mrr_lift_pct: Decimal,
}

// ---------------------------------------------------------------------------
// Ladder
// ---------------------------------------------------------------------------

/// `steps` evenly spaced prices from `min` to `max` inclusive, rounded to cents.
pub fn candidate_price_ladder(min: Money, max: Money, steps: usize) -> Result<Vec<Money>, ProjectionError> {
    if !(MIN_LADDER_STEPS..=MAX_LADDER_STEPS).contains(&steps) {
        return Err(ProjectionError::InvalidSteps(steps));
    }
    if !min.is_positive() || max < min {
        return Err(ProjectionError::InvalidBounds { min, max });
    }
    let span = max.0 - min.0;
    let intervals = Decimal::from((steps - 1) as u64);
    Ok((0..steps)
        .map(|i| Money(min.0 + Decimal::from(i as u64) * span / intervals).round_cents())
        .collect())
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

fn percent_fraction(field: &'static str, value: f64) -> Result<Decimal, ProjectionError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ProjectionError::InvalidPercent { field, value });
    }
    Decimal::from_f64(value)
        .map(|d| d / dec!(100))
        .ok_or(ProjectionError::InvalidPercent { field, value })
}

fn floor_count(subscribers: u64, fraction: Decimal) -> u64 {
    let v = (Decimal::from(subscribers) * fraction).floor();
    v.to_u64().unwrap_or(0)
}

/// One row per candidate price.
///
/// `churn_pct` of current subscribers leave; `upgrade_pct` of the rest move to
/// the candidate price; everyone else stays at the current price.
pub fn project_price_scenarios(
    current_price: Money,
    current_subscribers: u64,
    candidates: &[Money],
    churn_pct: f64,
    upgrade_pct: f64,
) -> Result<Vec<PriceScenario>, ProjectionError> {
    if !current_price.is_positive() {
        return Err(ProjectionError::NonPositivePrice);
    }
    if current_subscribers == 0 {
        return Err(ProjectionError::NoSubscribers);
    }
    let churn = percent_fraction("churn_pct", churn_pct)?;
    let upgrade = percent_fraction("upgrade_pct", upgrade_pct)?;

    let churned = floor_count(current_subscribers, churn);
    let upgraded = floor_count(current_subscribers - churned, upgrade);
    let stayers = current_subscribers - churned - upgraded;
    let current_mrr = current_price * current_subscribers;

    Ok(candidates
        .iter()
        .map(|&price| {
            let projected_mrr = current_price * stayers + price * upgraded;
            let lift = projected_mrr - current_mrr;
            let lift_pct = if current_mrr.is_positive() {
                (lift.0 / current_mrr.0 * dec!(100))
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            } else {
                Decimal::ZERO
            };
            PriceScenario {
                test_price: price,
                stayers,
                upgraded,
                churned,
                current_mrr: current_mrr.round_cents(),
                projected_mrr: projected_mrr.round_cents(),
                mrr_lift: lift.round_cents(),
                mrr_lift_pct: lift_pct,
            }
        })
        .collect())
}

/// Row with the highest projected MRR; the first one wins ties.
pub fn best_scenario(rows: &[PriceScenario]) -> Option<&PriceScenario> {
    rows.iter().fold(None, |best, row| match best {
        Some(b) if row.projected_mrr <= b.projected_mrr => Some(b),
        _ => Some(row),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
