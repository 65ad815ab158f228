#![deny(warnings)]

//! Core bracket model for the pick'em engine.
//!
//! This crate defines the fixed entrant registry, the seven-match bracket
//! tree and the propagation rules that move a picked entrant into the next
//! round. All mutations validate first and then apply, so a rejected command
//! never leaves the tree half-updated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Number of entrants in a bracket.
pub const ENTRANT_COUNT: usize = 8;
/// Number of quarterfinal matches.
pub const QUARTERFINAL_COUNT: usize = 4;
/// Number of semifinal matches.
pub const SEMIFINAL_COUNT: usize = 2;
/// Total number of matches in the tree.
pub const MATCH_COUNT: usize = QUARTERFINAL_COUNT + SEMIFINAL_COUNT + 1;

/// Stable entrant identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntrantId(pub u32);

impl fmt::Display for EntrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tournament participant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entrant {
    /// Unique, stable id.
    pub id: EntrantId,
    /// Display name.
    pub name: String,
}

impl Entrant {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: EntrantId(id),
            name: name.into(),
        }
    }
}

/// Seed data used when no configuration is supplied.
pub fn default_entrants() -> Vec<Entrant> {
    [
        "papaneus", "morrog", "faralley", "puxque", "sejecem", "salina", "issy", "milan",
    ]
    .iter()
    .zip(1u32..)
    .map(|(name, id)| Entrant::new(id, *name))
    .collect()
}

/// Validation errors for seed data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The registry must hold exactly eight entrants.
    #[error("expected 8 entrants, got {0}")]
    EntrantCount(usize),
    /// Entrant ids must be unique.
    #[error("duplicate entrant id: {0}")]
    DuplicateEntrant(EntrantId),
    /// Entrant names must not be blank.
    #[error("entrant {0} has a blank name")]
    BlankName(EntrantId),
    /// At least one checkpoint is required.
    #[error("checkpoint list is empty")]
    NoCheckpoints,
    /// Checkpoint thresholds must be > 0.
    #[error("checkpoint threshold must be > 0")]
    ZeroThreshold,
    /// Checkpoint thresholds must be strictly ascending.
    #[error("checkpoint threshold {next} does not follow {previous}")]
    ThresholdsNotAscending { previous: u32, next: u32 },
    /// Reward labels must not be blank.
    #[error("checkpoint at {0} points has a blank label")]
    BlankLabel(u32),
}

/// Errors returned by bracket commands. The tree is untouched when one is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BracketError {
    /// Unknown match id.
    #[error("unknown match reference: {0}")]
    InvalidMatchReference(String),
    /// The match does not hold two participants yet.
    #[error("match {0} does not have two participants")]
    IncompleteMatch(MatchId),
    /// Side selector other than A or B.
    #[error("invalid side selector: {0:?}")]
    InvalidSide(String),
}

/// Validate entrant seed data.
pub fn validate_entrants(entrants: &[Entrant]) -> Result<(), ValidationError> {
    if entrants.len() != ENTRANT_COUNT {
        return Err(ValidationError::EntrantCount(entrants.len()));
    }
    let mut ids = BTreeSet::new();
    for e in entrants {
        if e.name.trim().is_empty() {
            return Err(ValidationError::BlankName(e.id));
        }
        if !ids.insert(e.id) {
            return Err(ValidationError::DuplicateEntrant(e.id));
        }
    }
    Ok(())
}

/// The fixed, ordered list of eight entrants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntrantRegistry {
    entrants: Vec<Entrant>,
}

impl EntrantRegistry {
    pub fn new(entrants: Vec<Entrant>) -> Result<Self, ValidationError> {
        validate_entrants(&entrants)?;
        Ok(Self { entrants })
    }

    pub fn entrants(&self) -> &[Entrant] {
        &self.entrants
    }

    /// Initial occupants of quarterfinal `index`: entrants `2i` and `2i + 1`.
    pub fn pairing(&self, index: usize) -> Option<(&Entrant, &Entrant)> {
        self.entrants
            .get(2 * index)
            .zip(self.entrants.get(2 * index + 1))
    }
}

impl Default for EntrantRegistry {
    fn default() -> Self {
        Self {
            entrants: default_entrants(),
        }
    }
}

/// Bracket rounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Round {
    Quarterfinal,
    Semifinal,
    Final,
}

/// Slot selector within a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn select<'a, T>(self, a: &'a T, b: &'a T) -> &'a T {
        match self {
            Side::A => a,
            Side::B => b,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("A"),
            Side::B => f.write_str("B"),
        }
    }
}

impl FromStr for Side {
    type Err = BracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Side::A),
            "B" | "b" => Ok(Side::B),
            other => Err(BracketError::InvalidSide(other.to_string())),
        }
    }
}

impl TryFrom<char> for Side {
    type Error = BracketError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            'A' | 'a' => Ok(Side::A),
            'B' | 'b' => Ok(Side::B),
            other => Err(BracketError::InvalidSide(other.to_string())),
        }
    }
}

/// Position of a match in the tree. Indexes are zero-based; display names are
/// `QF1..QF4`, `SF1`, `SF2` and `F`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MatchId {
    Quarterfinal(u8),
    Semifinal(u8),
    Final,
}

impl MatchId {
    /// All matches in bracket order.
    pub const ALL: [MatchId; MATCH_COUNT] = [
        MatchId::Quarterfinal(0),
        MatchId::Quarterfinal(1),
        MatchId::Quarterfinal(2),
        MatchId::Quarterfinal(3),
        MatchId::Semifinal(0),
        MatchId::Semifinal(1),
        MatchId::Final,
    ];

    /// Index into the tree, or `None` when the id names no match.
    pub fn position(self) -> Option<usize> {
        match self {
            MatchId::Quarterfinal(i) if usize::from(i) < QUARTERFINAL_COUNT => Some(usize::from(i)),
            MatchId::Semifinal(i) if usize::from(i) < SEMIFINAL_COUNT => {
                Some(QUARTERFINAL_COUNT + usize::from(i))
            }
            MatchId::Final => Some(MATCH_COUNT - 1),
            _ => None,
        }
    }

    pub fn round(self) -> Round {
        match self {
            MatchId::Quarterfinal(_) => Round::Quarterfinal,
            MatchId::Semifinal(_) => Round::Semifinal,
            MatchId::Final => Round::Final,
        }
    }

    /// Downstream match and the slot this match's pick lands in.
    /// The first feeder of a pair fills slot A, the second slot B.
    pub fn target(self) -> Option<(MatchId, Side)> {
        let side = |i: u8| if i % 2 == 0 { Side::A } else { Side::B };
        match self {
            MatchId::Quarterfinal(i) => Some((MatchId::Semifinal(i / 2), side(i))),
            MatchId::Semifinal(i) => Some((MatchId::Final, side(i))),
            MatchId::Final => None,
        }
    }

    fn checked(self) -> Result<usize, BracketError> {
        self.position()
            .ok_or_else(|| BracketError::InvalidMatchReference(self.to_string()))
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchId::Quarterfinal(i) => write!(f, "QF{}", u16::from(*i) + 1),
            MatchId::Semifinal(i) => write!(f, "SF{}", u16::from(*i) + 1),
            MatchId::Final => f.write_str("F"),
        }
    }
}

impl FromStr for MatchId {
    type Err = BracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BracketError::InvalidMatchReference(s.to_string());
        let upper = s.trim().to_ascii_uppercase();
        let numbered = |rest: &str, count: usize| -> Result<u8, BracketError> {
            let n: u8 = rest.parse().map_err(|_| invalid())?;
            if n == 0 || usize::from(n) > count {
                return Err(invalid());
            }
            Ok(n - 1)
        };
        if upper == "F" || upper == "FINAL" {
            Ok(MatchId::Final)
        } else if let Some(rest) = upper.strip_prefix("QF") {
            Ok(MatchId::Quarterfinal(numbered(rest, QUARTERFINAL_COUNT)?))
        } else if let Some(rest) = upper.strip_prefix("SF") {
            Ok(MatchId::Semifinal(numbered(rest, SEMIFINAL_COUNT)?))
        } else {
            Err(invalid())
        }
    }
}

impl TryFrom<String> for MatchId {
    type Error = BracketError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MatchId> for String {
    fn from(id: MatchId) -> Self {
        id.to_string()
    }
}

/// One bracket node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Match {
    pub id: MatchId,
    /// Occupant of slot A; `None` is TBD.
    pub slot_a: Option<Entrant>,
    /// Occupant of slot B; `None` is TBD.
    pub slot_b: Option<Entrant>,
    /// The user's selection, always one of the current occupants.
    pub pick: Option<Entrant>,
    /// The simulated result, always one of the current occupants.
    pub outcome: Option<Entrant>,
}

impl Match {
    fn empty(id: MatchId) -> Self {
        Self {
            id,
            slot_a: None,
            slot_b: None,
            pick: None,
            outcome: None,
        }
    }

    pub fn slot(&self, side: Side) -> Option<&Entrant> {
        match side {
            Side::A => self.slot_a.as_ref(),
            Side::B => self.slot_b.as_ref(),
        }
    }

    /// Both occupants, when the match is complete.
    pub fn participants(&self) -> Option<(&Entrant, &Entrant)> {
        self.slot_a.as_ref().zip(self.slot_b.as_ref())
    }

    pub fn is_complete(&self) -> bool {
        self.participants().is_some()
    }

    /// Slot currently occupied by `entrant`.
    pub fn side_of(&self, entrant: &Entrant) -> Option<Side> {
        if self.slot_a.as_ref().is_some_and(|a| a.id == entrant.id) {
            Some(Side::A)
        } else if self.slot_b.as_ref().is_some_and(|b| b.id == entrant.id) {
            Some(Side::B)
        } else {
            None
        }
    }

    fn entrant_on(&self, side: Side) -> Result<Entrant, BracketError> {
        self.participants()
            .map(|(a, b)| side.select(a, b).clone())
            .ok_or(BracketError::IncompleteMatch(self.id))
    }

    fn vacate(&mut self, side: Side) {
        match side {
            Side::A => self.slot_a = None,
            Side::B => self.slot_b = None,
        }
        if self.outcome.take().is_some() {
            debug!(match_id = %self.id, "slot vacated, outcome cleared");
        }
    }

    fn occupy(&mut self, side: Side, entrant: Entrant) {
        match side {
            Side::A => self.slot_a = Some(entrant),
            Side::B => self.slot_b = Some(entrant),
        }
        if self
            .outcome
            .as_ref()
            .is_some_and(|o| self.side_of(o).is_none())
        {
            debug!(match_id = %self.id, "outcome no longer references an occupant, clearing");
            self.outcome = None;
        }
    }
}

/// Seven matches arranged as `QF[0..4] -> SF[0..2] -> F`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BracketTree {
    matches: [Match; MATCH_COUNT],
}

impl BracketTree {
    /// Fresh tree: quarterfinals paired from the registry, everything else empty.
    pub fn new(registry: &EntrantRegistry) -> Self {
        let matches = MatchId::ALL.map(|id| {
            let mut m = Match::empty(id);
            if let MatchId::Quarterfinal(i) = id {
                if let Some((a, b)) = registry.pairing(usize::from(i)) {
                    m.slot_a = Some(a.clone());
                    m.slot_b = Some(b.clone());
                }
            }
            m
        });
        Self { matches }
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn get(&self, id: MatchId) -> Result<&Match, BracketError> {
        let pos = id.checked()?;
        Ok(&self.matches[pos])
    }

    pub fn round(&self, round: Round) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(move |m| m.id.round() == round)
    }

    /// The entrant picked to win the final.
    pub fn champion(&self) -> Option<&Entrant> {
        self.matches[MATCH_COUNT - 1].pick.as_ref()
    }

    /// Record a pick and push the winner into the downstream slot.
    ///
    /// The downstream match's pick and every pick below it are cleared on each
    /// call, even when the occupant did not actually change.
    pub fn apply_pick(&mut self, id: MatchId, side: Side) -> Result<(), BracketError> {
        let pos = id.checked()?;
        let winner = self.matches[pos].entrant_on(side).map_err(|e| {
            warn!(match_id = %id, %side, "pick rejected: {e}");
            e
        })?;
        let target = match id.target() {
            Some((target, slot)) => Some((target.checked()?, target, slot)),
            None => None,
        };

        debug!(match_id = %id, %side, entrant = %winner.name, "pick applied");
        self.matches[pos].pick = Some(winner.clone());
        if let Some((target_pos, target, slot)) = target {
            self.matches[target_pos].occupy(slot, winner);
            self.clear_picks_from(target);
        }
        Ok(())
    }

    /// Clear picks from `start` down to the final. A cleared pick also vacates
    /// the slot it had filled in its own target.
    fn clear_picks_from(&mut self, start: MatchId) {
        let mut next = Some(start);
        while let Some(current) = next {
            let target = current.target();
            if let Some(pos) = current.position() {
                if self.matches[pos].pick.take().is_some() {
                    debug!(match_id = %current, "downstream pick cleared");
                    if let Some((t, slot)) = target {
                        if let Some(tpos) = t.position() {
                            self.matches[tpos].vacate(slot);
                        }
                    }
                }
            }
            next = target.map(|(t, _)| t);
        }
    }

    /// Write a batch of outcomes. Every entry is checked before any is written.
    pub fn apply_outcomes(&mut self, outcomes: &[(MatchId, Side)]) -> Result<(), BracketError> {
        let mut resolved = Vec::with_capacity(outcomes.len());
        for &(id, side) in outcomes {
            let pos = id.checked()?;
            resolved.push((pos, self.matches[pos].entrant_on(side)?));
        }
        for (pos, entrant) in resolved {
            self.matches[pos].outcome = Some(entrant);
        }
        Ok(())
    }
}
