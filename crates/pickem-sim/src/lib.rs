#![deny(warnings)]

//! Simulation engine: an independent coin flip per match.
//!
//! Outcomes are drawn from whatever occupants a match currently holds, which
//! come from the user's picks rather than from earlier simulated rounds. The
//! simulated results therefore never form a self-consistent tournament; any
//! number of picks from 0 to 7 can turn out correct.

use pickem_core::{BracketError, BracketTree, MatchId, Side};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Generator for a session. A fixed seed makes simulation reproducible.
pub fn session_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Fair draw between the two slots.
pub fn draw_side<R: Rng + ?Sized>(rng: &mut R) -> Side {
    if rng.gen_bool(0.5) {
        Side::A
    } else {
        Side::B
    }
}

/// Draw an outcome for every match holding two participants, without touching the tree.
pub fn draw_outcomes<R: Rng + ?Sized>(tree: &BracketTree, rng: &mut R) -> Vec<(MatchId, Side)> {
    tree.matches()
        .iter()
        .filter(|m| m.is_complete())
        .map(|m| (m.id, draw_side(rng)))
        .collect()
}

/// Simulate every complete match, replacing earlier outcomes in one batch.
/// Returns how many matches were simulated.
pub fn simulate_all<R: Rng + ?Sized>(
    tree: &mut BracketTree,
    rng: &mut R,
) -> Result<usize, BracketError> {
    let outcomes = draw_outcomes(tree, rng);
    tree.apply_outcomes(&outcomes)?;
    for (id, side) in &outcomes {
        debug!(match_id = %id, %side, "outcome drawn");
    }
    Ok(outcomes.len())
}

/// Simulate a single match.
pub fn simulate_match<R: Rng + ?Sized>(
    tree: &mut BracketTree,
    id: MatchId,
    rng: &mut R,
) -> Result<Side, BracketError> {
    if !tree.get(id)?.is_complete() {
        return Err(BracketError::IncompleteMatch(id));
    }
    let side = draw_side(rng);
    tree.apply_outcomes(&[(id, side)])?;
    debug!(match_id = %id, %side, "outcome drawn");
    Ok(side)
}
