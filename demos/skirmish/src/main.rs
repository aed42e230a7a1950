//! skirmish: a small economy-and-combat scenario for the rust_uai controller.
//!
//! Two workers gather and build while a pair of infantry marches in column
//! toward an enemy outpost.  Pass a scenario CSV path to run a different
//! map; the scripted commands only apply to the built-in one.
//!
//! Set `RUST_LOG=debug` (or `RUST_LOG=uai_behavior=trace`) to watch the
//! state machines work.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use uai_core::{EntityId, PlayerId, Point, SimConfig, SimTime};
use uai_sim::{Command, Sim, SimBuilder, SimObserver, SimWorld, TurnStats, load_scenario_csv, load_scenario_reader};

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:            u64 = 42;
const TURN_LENGTH_MS:  u32 = 200;
const TOTAL_TURNS:     u64 = 900; // three minutes of game time
const REPORT_INTERVAL: u64 = 150;
const REINFORCEMENTS:  usize = 2;

const RESOURCES: [&str; 3] = ["food", "wood", "stone"];

// Entity ids of the built-in scenario, in row order.
const WORKER_A:   EntityId = EntityId(1);
const WORKER_B:   EntityId = EntityId(2);
const SPEARMAN_A: EntityId = EntityId(3);
const SPEARMAN_B: EntityId = EntityId(4);
const TREE_A:     EntityId = EntityId(7);
const TREE_B:     EntityId = EntityId(8);
const FOUNDATION: EntityId = EntityId(9);

const SCENARIO_CSV: &str = include_str!("../scenario.csv");

// ── Progress observer ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Progress {
    removed: usize,
    events:  usize,
}

impl SimObserver for Progress {
    fn on_turn_start(&mut self, turn: u64, now: SimTime) {
        if turn % REPORT_INTERVAL == 0 {
            println!("  turn {turn:>4}  t={:>6.1}s  events so far {}", now.0 as f64 / 1000.0, self.events);
        }
    }

    fn on_turn_end(&mut self, turn: u64, stats: &TurnStats, _world: &SimWorld) {
        self.events += stats.events;
        if stats.removed > 0 {
            self.removed += stats.removed;
            info!(turn, removed = stats.removed, "entities left the world");
        }
    }

    fn on_sim_end(&mut self, turns: u64, world: &SimWorld) {
        println!("  finished after {turns} turns, {} entities remain, {} removed", world.len(), self.removed);
    }
}

// ── Scripted opening ──────────────────────────────────────────────────────────

fn opening(sim: &mut Sim) -> Result<()> {
    sim.command(WORKER_A, Command::Gather(TREE_A), false)?;
    sim.command(WORKER_B, Command::Repair(FOUNDATION), false)?;
    sim.command(WORKER_B, Command::Gather(TREE_B), true)?;

    let column = sim.form_formation(&[SPEARMAN_A, SPEARMAN_B])?;
    sim.command(column, Command::Walk(Point::new(40.0, 3.0)), false)?;
    println!("Opening: workers on wood and the house, column {column} marching east");
    Ok(())
}

// ── Summary ───────────────────────────────────────────────────────────────────

fn print_summary(sim: &Sim) {
    let world = &sim.world;

    println!();
    println!("Stockpiles:");
    for player in [PlayerId(1), PlayerId(2)] {
        let line: Vec<String> = RESOURCES
            .iter()
            .map(|r| format!("{r} {:.0}", world.stockpile(player, r)))
            .collect();
        println!("  {player}: {}", line.join(", "));
    }

    let mut survivors: BTreeMap<PlayerId, Vec<String>> = BTreeMap::new();
    for ai in sim.units() {
        let Some(entity) = world.entity(ai.entity()) else { continue };
        if ai.is_formation_controller() {
            continue;
        }
        let hp = entity.health.map(|h| h.hp).unwrap_or_default();
        survivors.entry(entity.owner).or_default().push(format!(
            "{} {} ({hp} hp, {}, {})",
            entity.template,
            entity.id,
            ai.stance(),
            ai.state_path().unwrap_or("-"),
        ));
    }

    println!();
    println!("Surviving units:");
    for (owner, units) in survivors {
        for unit in units {
            println!("  {owner}: {unit}");
        }
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let path = std::env::args_os().nth(1).map(PathBuf::from);

    println!("=== skirmish: rust_uai unit behavior ===");
    println!("Turns: {TOTAL_TURNS} x {TURN_LENGTH_MS} ms  |  Seed: {SEED}");

    // 1. Load the scenario.
    let spawns = match &path {
        Some(path) => load_scenario_csv(path).with_context(|| format!("loading {}", path.display()))?,
        None => load_scenario_reader(Cursor::new(SCENARIO_CSV))?,
    };
    println!("Scenario: {} entities", spawns.len());

    // 2. Build the world and give every unit its controller.
    let config = SimConfig { turn_length_ms: TURN_LENGTH_MS, total_turns: TOTAL_TURNS, seed: SEED };
    let mut builder = SimBuilder::new(config).players(2).spawns(spawns);
    if path.is_none() {
        // Reinforcements behind the outpost; placed after the CSV rows so
        // the scripted ids stay put.
        builder = builder.scatter("infantry", PlayerId(2), Point::new(78.0, 0.0), REINFORCEMENTS, 6.0);
    }
    let mut sim = builder.build()?;
    println!("Units under control: {}", sim.units().count());

    // 3. The built-in map comes with orders.
    if path.is_none() {
        opening(&mut sim)?;
    }

    // 4. Run.
    println!();
    let started = Instant::now();
    let mut progress = Progress::default();
    sim.run(&mut progress)?;
    println!("  wall time {:.1?}", started.elapsed());

    print_summary(&sim);
    Ok(())
}
