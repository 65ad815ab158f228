#![deny(warnings)]

//! Scoring engine: per-match points, totals and reward checkpoints.
//!
//! A simulated match is worth 1 point whatever was picked, and 3 when the
//! pick matches the outcome. Checkpoints fire once each, the first time the
//! running total reaches their threshold.

use pickem_core::{BracketTree, Match, Side, ValidationError, MATCH_COUNT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// Points for a match whose pick equals its outcome.
pub const CORRECT_PICK_POINTS: u32 = 3;
/// Points for any other simulated match.
pub const DECIDED_MATCH_POINTS: u32 = 1;
/// Highest attainable total.
pub const MAX_SCORE: u32 = CORRECT_PICK_POINTS * MATCH_COUNT as u32;

/// How a match's pick compares to its outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchVerdict {
    /// Not simulated yet.
    Pending,
    /// Simulated, but nothing was picked.
    Unpicked,
    Correct,
    Incorrect,
}

/// Result shown next to an occupant once the match is simulated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    Win,
    Lose,
    Neutral,
}

pub fn verdict(m: &Match) -> MatchVerdict {
    match (&m.pick, &m.outcome) {
        (_, None) => MatchVerdict::Pending,
        (None, Some(_)) => MatchVerdict::Unpicked,
        (Some(p), Some(o)) if p.id == o.id => MatchVerdict::Correct,
        (Some(_), Some(_)) => MatchVerdict::Incorrect,
    }
}

pub fn slot_status(m: &Match, side: Side) -> SlotStatus {
    match (m.slot(side), &m.outcome) {
        (Some(e), Some(o)) if e.id == o.id => SlotStatus::Win,
        (Some(_), Some(_)) => SlotStatus::Lose,
        _ => SlotStatus::Neutral,
    }
}

/// Points for one match: 0 before simulation, 3 for a correct pick, 1 otherwise.
pub fn match_score(m: &Match) -> u32 {
    match verdict(m) {
        MatchVerdict::Pending => 0,
        MatchVerdict::Correct => CORRECT_PICK_POINTS,
        MatchVerdict::Unpicked | MatchVerdict::Incorrect => DECIDED_MATCH_POINTS,
    }
}

/// Sum of [`match_score`] over all seven matches.
pub fn total_score(tree: &BracketTree) -> u32 {
    tree.matches().iter().map(match_score).sum()
}

/// Per-verdict counts behind a total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub correct: u32,
    pub incorrect: u32,
    pub unpicked: u32,
    pub pending: u32,
}

impl ScoreBreakdown {
    pub fn of(tree: &BracketTree) -> Self {
        let mut b = Self::default();
        for m in tree.matches() {
            match verdict(m) {
                MatchVerdict::Correct => b.correct += 1,
                MatchVerdict::Incorrect => b.incorrect += 1,
                MatchVerdict::Unpicked => b.unpicked += 1,
                MatchVerdict::Pending => b.pending += 1,
            }
        }
        b
    }

    pub fn total(&self) -> u32 {
        CORRECT_PICK_POINTS * self.correct + DECIDED_MATCH_POINTS * (self.incorrect + self.unpicked)
    }
}

/// A score threshold bound to a reward.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub threshold: u32,
    pub label: String,
    /// Optional image asset shown with the reward.
    #[serde(default)]
    pub image: Option<String>,
}

impl Checkpoint {
    pub fn new(threshold: u32, label: impl Into<String>) -> Self {
        Self {
            threshold,
            label: label.into(),
            image: None,
        }
    }
}

/// Bronze, silver and gold crates at 6, 12 and 18 points.
pub fn default_checkpoints() -> Vec<Checkpoint> {
    [(6, "Bronze crate", "bronze"), (12, "Silver crate", "silver"), (18, "Gold crate", "gold")]
        .into_iter()
        .map(|(threshold, label, slug)| Checkpoint {
            threshold,
            label: label.to_string(),
            image: Some(format!("/{slug}-crate.png")),
        })
        .collect()
}

/// Thresholds must be positive and strictly ascending; labels non-blank.
pub fn validate_checkpoints(checkpoints: &[Checkpoint]) -> Result<(), ValidationError> {
    if checkpoints.is_empty() {
        return Err(ValidationError::NoCheckpoints);
    }
    let mut previous: Option<u32> = None;
    for c in checkpoints {
        if c.threshold == 0 {
            return Err(ValidationError::ZeroThreshold);
        }
        if let Some(prev) = previous {
            if c.threshold <= prev {
                return Err(ValidationError::ThresholdsNotAscending {
                    previous: prev,
                    next: c.threshold,
                });
            }
        }
        if c.label.trim().is_empty() {
            return Err(ValidationError::BlankLabel(c.threshold));
        }
        previous = Some(c.threshold);
    }
    Ok(())
}

/// Checkpoints at or below `total` that have not been announced yet, in ascending order.
pub fn newly_reached(
    total: u32,
    announced: &BTreeSet<u32>,
    checkpoints: &[Checkpoint],
) -> Vec<Checkpoint> {
    checkpoints
        .iter()
        .filter(|c| total >= c.threshold && !announced.contains(&c.threshold))
        .cloned()
        .collect()
}

/// Fraction of the highest threshold reached, capped at 1.0.
pub fn progress(total: u32, checkpoints: &[Checkpoint]) -> f32 {
    match checkpoints.iter().map(|c| c.threshold).max() {
        Some(top) if top > 0 => (total as f32 / top as f32).min(1.0),
        _ => 0.0,
    }
}

/// Default announcement text for a reached checkpoint.
pub fn celebration_message(c: &Checkpoint) -> String {
    match c.threshold {
        6 => format!("Nice! Your first milestone is in: {} (6 points).", c.label),
        12 => format!("Keep going! Halfway there: {} (12 points).", c.label),
        18 => format!("Brilliant! You reached the top: {} (18 points).", c.label),
        n => format!("Congratulations! Checkpoint reached: {} ({n} points).", c.label),
    }
}

/// Monotonic set of thresholds already announced in this bracket lifetime.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CheckpointLedger {
    announced: BTreeSet<u32>,
}

impl CheckpointLedger {
    pub fn announced(&self) -> &BTreeSet<u32> {
        &self.announced
    }

    /// Record and return the checkpoints `total` reaches for the first time.
    pub fn observe(&mut self, total: u32, checkpoints: &[Checkpoint]) -> Vec<Checkpoint> {
        let reached = newly_reached(total, &self.announced, checkpoints);
        for c in &reached {
            info!(threshold = c.threshold, label = %c.label, total, "checkpoint reached");
            self.announced.insert(c.threshold);
        }
        reached
    }

    pub fn clear(&mut self) {
        self.announced.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pickem_core::{EntrantRegistry, MatchId};
    use proptest::prelude::*;

    fn picked_tree(side: Side) -> BracketTree {
        let mut t = BracketTree::new(&EntrantRegistry::default());
        for id in MatchId::ALL {
            t.apply_pick(id, side).unwrap();
        }
        t
    }

    #[test]
    fn unsimulated_bracket_scores_zero() {
        assert_eq!(total_score(&picked_tree(Side::A)), 0);
        assert!(picked_tree(Side::A)
            .matches()
            .iter()
            .all(|m| verdict(m) == MatchVerdict::Pending));
    }

    #[test]
    fn all_correct_scores_maximum() {
        let mut t = picked_tree(Side::A);
        let all_a: Vec<_> = MatchId::ALL.iter().map(|id| (*id, Side::A)).collect();
        t.apply_outcomes(&all_a).unwrap();
        assert_eq!(total_score(&t), MAX_SCORE);
        assert_eq!(MAX_SCORE, 21);
    }

    #[test]
    fn all_wrong_scores_participation_only() {
        let mut t = picked_tree(Side::A);
        let all_b: Vec<_> = MatchId::ALL.iter().map(|id| (*id, Side::B)).collect();
        t.apply_outcomes(&all_b).unwrap();
        assert_eq!(total_score(&t), 7);
        let m = t.get(MatchId::Final).unwrap();
        assert_eq!(verdict(m), MatchVerdict::Incorrect);
        assert_eq!(slot_status(m, Side::A), SlotStatus::Lose);
        assert_eq!(slot_status(m, Side::B), SlotStatus::Win);
    }

    #[test]
    fn unpicked_simulated_match_scores_one() {
        let mut t = BracketTree::new(&EntrantRegistry::default());
        t.apply_outcomes(&[(MatchId::Quarterfinal(0), Side::A)]).unwrap();
        let m = t.get(MatchId::Quarterfinal(0)).unwrap();
        assert_eq!(verdict(m), MatchVerdict::Unpicked);
        assert_eq!(match_score(m), 1);
        assert_eq!(total_score(&t), 1);
        let empty = t.get(MatchId::Final).unwrap();
        assert_eq!(slot_status(empty, Side::A), SlotStatus::Neutral);
    }

    #[test]
    fn checkpoints_fire_once() {
        let cps = default_checkpoints();
        let mut ledger = CheckpointLedger::default();
        assert!(ledger.observe(5, &cps).is_empty());
        let first = ledger.observe(6, &cps);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].label, "Bronze crate");
        assert!(ledger.observe(7, &cps).is_empty());
        assert!(ledger.observe(2, &cps).is_empty());
        let jump: Vec<u32> = ledger.observe(21, &cps).iter().map(|c| c.threshold).collect();
        assert_eq!(jump, vec![12, 18]);
        assert!(ledger.observe(21, &cps).is_empty());
        ledger.clear();
        assert_eq!(ledger.observe(12, &cps).len(), 2);
    }

    #[test]
    fn pure_evaluation_respects_announced_set() {
        let cps = default_checkpoints();
        let announced: BTreeSet<u32> = [6].into_iter().collect();
        let reached = newly_reached(13, &announced, &cps);
        assert_eq!(reached, vec![cps[1].clone()]);
    }

    #[test]
    fn checkpoint_validation() {
        assert_eq!(validate_checkpoints(&[]), Err(ValidationError::NoCheckpoints));
        assert!(validate_checkpoints(&default_checkpoints()).is_ok());
        let bad = vec![Checkpoint::new(6, "a"), Checkpoint::new(6, "b")];
        assert_eq!(
            validate_checkpoints(&bad),
            Err(ValidationError::ThresholdsNotAscending { previous: 6, next: 6 })
        );
        assert_eq!(
            validate_checkpoints(&[Checkpoint::new(0, "zero")]),
            Err(ValidationError::ZeroThreshold)
        );
        assert_eq!(
            validate_checkpoints(&[Checkpoint::new(3, " ")]),
            Err(ValidationError::BlankLabel(3))
        );
    }

    #[test]
    fn progress_is_capped() {
        let cps = default_checkpoints();
        assert_eq!(progress(0, &cps), 0.0);
        assert_eq!(progress(9, &cps), 0.5);
        assert_eq!(progress(21, &cps), 1.0);
        assert_eq!(progress(5, &[]), 0.0);
    }

    #[test]
    fn messages_name_the_reward() {
        for c in default_checkpoints() {
            assert!(celebration_message(&c).contains(&c.label));
        }
        assert!(celebration_message(&Checkpoint::new(9, "Mystery box")).contains("9 points"));
    }

    proptest! {
        #[test]
        fn score_matches_breakdown_and_stays_in_range(seed in any::<u64>(), sides in proptest::collection::vec(any::<bool>(), 7)) {
            let mut t = BracketTree::new(&EntrantRegistry::default());
            for (id, a) in MatchId::ALL.iter().zip(sides) {
                t.apply_pick(*id, if a { Side::A } else { Side::B }).unwrap();
            }
            pickem_sim::simulate_all(&mut t, &mut pickem_sim::session_rng(Some(seed))).unwrap();
            let total = total_score(&t);
            let b = ScoreBreakdown::of(&t);
            prop_assert!(total <= MAX_SCORE);
            prop_assert!(total >= 7);
            prop_assert_eq!(total, b.total());
            prop_assert_eq!(b.pending, 0);
            prop_assert_eq!(b.unpicked, 0);
        }
    }
}
