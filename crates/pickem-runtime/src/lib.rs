#![deny(warnings)]

//! Session runtime for the pick'em bracket.
//!
//! A [`Session`] is the single owner of one bracket: the tree, the random
//! generator used for simulation and the set of checkpoints already
//! announced. Every mutation goes through [`Session::apply_pick`],
//! [`Session::simulate_all`] or [`Session::reset`]; each returns the updated
//! [`SessionSnapshot`].

use pickem_core::{
    default_entrants, BracketError, BracketTree, Entrant, EntrantRegistry, MatchId, Side,
    ValidationError,
};
use pickem_score::{
    celebration_message, default_checkpoints, progress, total_score, validate_checkpoints,
    Checkpoint, CheckpointLedger, ScoreBreakdown,
};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Seed data for a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickemConfig {
    /// Eight entrants; quarterfinal `i` pairs entrants `2i` and `2i + 1`.
    pub entrants: Vec<Entrant>,
    /// Ascending reward thresholds.
    pub checkpoints: Vec<Checkpoint>,
    /// Fixed seed for reproducible simulation; entropy when absent.
    pub rng_seed: Option<u64>,
}

impl Default for PickemConfig {
    fn default() -> Self {
        Self {
            entrants: default_entrants(),
            checkpoints: default_checkpoints(),
            rng_seed: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl PickemConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: PickemConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        pickem_core::validate_entrants(&self.entrants)?;
        validate_checkpoints(&self.checkpoints)
    }
}

/// Receives each checkpoint the first time it is reached.
pub trait CheckpointSink {
    fn checkpoint_reached(&mut self, checkpoint: &Checkpoint, total: u32);
}

impl<F: FnMut(&Checkpoint, u32)> CheckpointSink for F {
    fn checkpoint_reached(&mut self, checkpoint: &Checkpoint, total: u32) {
        self(checkpoint, total)
    }
}

/// Sink that logs the celebration message.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl CheckpointSink for LogSink {
    fn checkpoint_reached(&mut self, checkpoint: &Checkpoint, total: u32) {
        info!(total, "{}", celebration_message(checkpoint));
    }
}

/// Read-only view handed to the presentation layer after each command.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub bracket: BracketTree,
    pub score: u32,
    pub breakdown: ScoreBreakdown,
    pub champion: Option<Entrant>,
    /// Fraction of the top checkpoint reached, in [0, 1].
    pub progress: f32,
    /// Checkpoints reached for the first time by the command that produced this snapshot.
    pub newly_reached: Vec<Checkpoint>,
}

pub struct Session {
    registry: EntrantRegistry,
    checkpoints: Vec<Checkpoint>,
    tree: BracketTree,
    rng: ChaCha8Rng,
    ledger: CheckpointLedger,
    last_reached: Vec<Checkpoint>,
    sinks: Vec<Box<dyn CheckpointSink>>,
}

impl Session {
    pub fn new(config: PickemConfig) -> Result<Self, ConfigError> {
        validate_checkpoints(&config.checkpoints)?;
        let registry = EntrantRegistry::new(config.entrants)?;
        info!(seed = ?config.rng_seed, "session created");
        Ok(Self {
            tree: BracketTree::new(&registry),
            registry,
            checkpoints: config.checkpoints,
            rng: pickem_sim::session_rng(config.rng_seed),
            ledger: CheckpointLedger::default(),
            last_reached: Vec::new(),
            sinks: Vec::new(),
        })
    }

    /// Register a collaborator to be told about newly reached checkpoints.
    pub fn add_sink<S: CheckpointSink + 'static>(&mut self, sink: S) {
        self.sinks.push(Box::new(sink));
    }

    pub fn registry(&self) -> &EntrantRegistry {
        &self.registry
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn bracket(&self) -> &BracketTree {
        &self.tree
    }

    pub fn score(&self) -> u32 {
        total_score(&self.tree)
    }

    /// Checkpoints reached for the first time by the most recent command.
    pub fn newly_reached_checkpoints(&self) -> &[Checkpoint] {
        &self.last_reached
    }

    pub fn announced(&self) -> &BTreeSet<u32> {
        self.ledger.announced()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let score = self.score();
        SessionSnapshot {
            bracket: self.tree.clone(),
            score,
            breakdown: ScoreBreakdown::of(&self.tree),
            champion: self.tree.champion().cloned(),
            progress: progress(score, &self.checkpoints),
            newly_reached: self.last_reached.clone(),
        }
    }

    pub fn apply_pick(&mut self, id: MatchId, side: Side) -> Result<SessionSnapshot, BracketError> {
        self.tree.apply_pick(id, side)?;
        Ok(self.settle())
    }

    /// Same as [`Session::apply_pick`] with textual match id and side, e.g. `("SF2", "B")`.
    pub fn apply_pick_str(&mut self, id: &str, side: &str) -> Result<SessionSnapshot, BracketError> {
        let parsed = id
            .parse::<MatchId>()
            .and_then(|id| side.parse::<Side>().map(|side| (id, side)));
        match parsed {
            Ok((id, side)) => self.apply_pick(id, side),
            Err(e) => {
                warn!(id, side, "pick rejected: {e}");
                Err(e)
            }
        }
    }

    /// Draw a fresh outcome for every match holding two participants.
    pub fn simulate_all(&mut self) -> Result<SessionSnapshot, BracketError> {
        let n = pickem_sim::simulate_all(&mut self.tree, &mut self.rng)?;
        info!(simulated = n, "bracket simulated");
        Ok(self.settle())
    }

    pub fn simulate_match(&mut self, id: MatchId) -> Result<SessionSnapshot, BracketError> {
        pickem_sim::simulate_match(&mut self.tree, id, &mut self.rng).map_err(|e| {
            warn!(match_id = %id, "simulation rejected: {e}");
            e
        })?;
        Ok(self.settle())
    }

    /// Discard all picks, outcomes and announced checkpoints.
    pub fn reset(&mut self) -> SessionSnapshot {
        self.tree = BracketTree::new(&self.registry);
        self.ledger.clear();
        self.last_reached.clear();
        info!("session reset");
        self.snapshot()
    }

    fn settle(&mut self) -> SessionSnapshot {
        let total = self.score();
        self.last_reached = self.ledger.observe(total, &self.checkpoints);
        for c in &self.last_reached {
            for sink in &mut self.sinks {
                sink.checkpoint_reached(c, total);
            }
        }
        self.snapshot()
    }
}
