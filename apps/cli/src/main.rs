#![deny(warnings)]

//! Headless CLI: fill in a bracket, simulate it and report the score.

use anyhow::{bail, Context, Result};
use pickem_core::{Entrant, MatchId, Side, MATCH_COUNT};
use pickem_runtime::{LogSink, PickemConfig, Session, SessionSnapshot};
use pickem_score::{verdict, Checkpoint, MatchVerdict, MAX_SCORE};
use serde::Serialize;
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    seed: Option<u64>,
    picks: Option<String>,
    simulate: Option<u32>,
    json: bool,
}

fn value<T, I>(flag: &str, it: &mut I) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    I: Iterator<Item = String>,
{
    let Some(raw) = it.next() else {
        bail!("{flag} needs a value");
    };
    raw.parse()
        .with_context(|| format!("invalid value for {flag}: {raw:?}"))
}

fn parse_args<I: Iterator<Item = String>>(mut it: I) -> Result<Args> {
    let mut args = Args::default();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = Some(value(&arg, &mut it)?),
            "--seed" => args.seed = Some(value(&arg, &mut it)?),
            "--picks" => args.picks = Some(value(&arg, &mut it)?),
            "--simulate" => args.simulate = Some(value(&arg, &mut it)?),
            "--json" => args.json = true,
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

/// Sides in bracket order `QF1..QF4, SF1, SF2, F`, e.g. `AABAABA`.
fn parse_picks(text: &str) -> Result<Vec<(MatchId, Side)>> {
    let sides = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .map(Side::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    if sides.len() > MATCH_COUNT {
        bail!("at most {MATCH_COUNT} picks, got {}", sides.len());
    }
    Ok(MatchId::ALL.into_iter().zip(sides).collect())
}

fn name(e: Option<&Entrant>) -> &str {
    e.map(|e| e.name.as_str()).unwrap_or("TBD")
}

fn print_report(session: &Session, snap: &SessionSnapshot, reached: &[Checkpoint]) {
    let entrants: Vec<&str> = session
        .registry()
        .entrants()
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    println!("Entrants: {}", entrants.join(", "));
    for m in snap.bracket.matches() {
        let tag = match verdict(m) {
            MatchVerdict::Pending => "",
            MatchVerdict::Unpicked => "unpicked",
            MatchVerdict::Correct => "correct",
            MatchVerdict::Incorrect => "wrong",
        };
        println!(
            "{:<4} {:>10} vs {:<10} | pick: {:<10} | outcome: {:<10} {}",
            m.id.to_string(),
            name(m.slot_a.as_ref()),
            name(m.slot_b.as_ref()),
            name(m.pick.as_ref()),
            name(m.outcome.as_ref()),
            tag
        );
    }
    println!("Champion: {}", name(snap.champion.as_ref()));
    println!(
        "Score: {} / {} | progress: {:.0}%",
        snap.score,
        MAX_SCORE,
        snap.progress * 100.0
    );
    let goals: Vec<String> = session
        .checkpoints()
        .iter()
        .map(|c| format!("{} {}", c.threshold, c.label))
        .collect();
    println!("Goals: {}", goals.join(" / "));
    for c in reached {
        println!("Checkpoint: {} ({} points)", c.label, c.threshold);
    }
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    snapshot: &'a SessionSnapshot,
    reached: &'a [Checkpoint],
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    info!(git_sha = env!("GIT_SHA"), ?args, "starting CLI");

    let mut config = match &args.config {
        Some(path) => PickemConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => PickemConfig::default(),
    };
    if args.seed.is_some() {
        config.rng_seed = args.seed;
    }
    let picks = parse_picks(args.picks.as_deref().unwrap_or(""))?;

    let mut session = Session::new(config)?;
    session.add_sink(LogSink);

    let mut reached = Vec::new();
    for (id, side) in picks {
        let snap = session
            .apply_pick(id, side)
            .with_context(|| format!("picking {side} in {id}"))?;
        reached.extend(snap.newly_reached);
    }
    for _ in 0..args.simulate.unwrap_or(1) {
        reached.extend(session.simulate_all()?.newly_reached);
    }

    let snap = session.snapshot();
    if args.json {
        let report = Report {
            snapshot: &snap,
            reached: &reached,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&session, &snap, &reached);
    }
    Ok(())
}
