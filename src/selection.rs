// Copyright 2026 Price Lab contributors. All rights reserved.
// Price experiment engine - Arm selection

//! Per-event arm selection: round-robin forced exploration, then
//! guardrailed Thompson sampling over the revenue posteriors.

use std::collections::BTreeMap;

use rand::Rng;

use crate::config::EXPLORATION_EVENTS_PER_ARM;
use crate::posterior::{Posterior, PosteriorError};

/// How an arm was chosen for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    Exploration,
    Thompson,
    /// Thompson over all arms because none passed the guardrail.
    ThompsonFailOpen,
}

/// Arm for event `seq` during forced exploration, or `None` once the
/// exploration block (`EXPLORATION_EVENTS_PER_ARM` consecutive events per arm,
/// in label order) is used up.
pub fn exploration_arm<'a>(labels: &'a [String], seq: u64) -> Option<&'a String> {
    let slot = seq / EXPLORATION_EVENTS_PER_ARM;
    usize::try_from(slot).ok().and_then(|i| labels.get(i))
}

/// Draw one revenue sample per candidate and return the arm with the highest
/// draw. Candidates are visited in the order given; ties keep the earlier arm.
pub fn thompson_select<R: Rng + ?Sized>(
    candidates: &[String],
    posteriors: &BTreeMap<String, Posterior>,
    rng: &mut R,
) -> Result<Option<String>, PosteriorError> {
    let mut best: Option<(&String, f64)> = None;
    for label in candidates {
        let Some(posterior) = posteriors.get(label) else {
            continue;
        };
        let draw = posterior.sample_revenue(rng)?;
        match best {
            Some((_, top)) if draw <= top => {}
            _ => best = Some((label, draw)),
        }
    }
    Ok(best.map(|(label, _)| label.clone()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn labels() -> Vec<String> {
        vec!["A".to_string(), "B".to_string(), "C".to_string()]
    }

    #[test]
    fn exploration_blocks_of_ten() {
        let labels = labels();
        assert_eq!(exploration_arm(&labels, 0).map(String::as_str), Some("A"));
        assert_eq!(exploration_arm(&labels, 9).map(String::as_str), Some("A"));
        assert_eq!(exploration_arm(&labels, 10).map(String::as_str), Some("B"));
        assert_eq!(exploration_arm(&labels, 29).map(String::as_str), Some("C"));
        assert_eq!(exploration_arm(&labels, 30), None);
    }

    #[test]
    fn thompson_prefers_dominant_arm() {
        let mut posteriors = BTreeMap::new();
        let mut low = Posterior::new();
        let mut high = Posterior::new();
        for _ in 0..500 {
            low.update(5.0, false);
            high.update(20.0, false);
        }
        posteriors.insert("A".to_string(), low);
        posteriors.insert("B".to_string(), high);

        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let candidates = vec!["A".to_string(), "B".to_string()];
        for _ in 0..50 {
            let pick = thompson_select(&candidates, &posteriors, &mut rng).expect("test: valid posteriors");
            assert_eq!(pick.as_deref(), Some("B"));
        }
    }

    #[test]
    fn thompson_respects_candidate_set() {
        let mut posteriors = BTreeMap::new();
        let mut high = Posterior::new();
        for _ in 0..100 {
            high.update(30.0, false);
        }
        posteriors.insert("A".to_string(), Posterior::new());
        posteriors.insert("B".to_string(), high);

        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let pick = thompson_select(&["A".to_string()], &posteriors, &mut rng).expect("test: valid posteriors");
        assert_eq!(pick.as_deref(), Some("A"));
    }

    #[test]
    fn empty_candidates_select_nothing() {
        let posteriors = BTreeMap::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(thompson_select(&[], &posteriors, &mut rng).expect("test: empty"), None);
    }
}
