//! Headless battle: loads the sample data, fields two mirrored lineups,
//! fights to a winner, prints snapshots and verifies determinism.
//!
//! Run with: `cargo run --package autochess-data --example headless_battle`
//! Set `RUST_LOG=autochess_core=debug` to trace every controller decision.

use std::path::Path;

use autochess_core::engine::Engine;
use autochess_core::id::{NodeIndex, Team, TileRef};
use autochess_data::{load_game_data, GameData};
use tracing_subscriber::EnvFilter;

const MAX_SECONDS: f32 = 300.0;
const FRAME: f32 = 1.0 / 60.0;

/// Unit name and battle column, front row first.
const LINEUP: [(&str, u32); 5] = [
    ("knight", 2),
    ("squire", 4),
    ("archer", 1),
    ("mage", 3),
    ("archer", 5),
];

fn field_lineup(data: &GameData) -> Engine {
    let mut engine = data.build_engine().expect("sample units are valid");
    let columns = data.layout.battle_columns;
    let last_row = data.layout.battle_rows - 1;

    for (i, (name, column)) in LINEUP.iter().enumerate() {
        let template = engine
            .template_by_name(name)
            .unwrap_or_else(|| panic!("unit '{name}' missing from sample data"));
        let row = if i < 2 { 1 } else { 0 };

        for (team, row) in [(Team::Player, row), (Team::Enemy, last_row - row)] {
            let id = engine.place_agent(team, template).expect("bench has room");
            let node = NodeIndex(row * columns + column);
            engine
                .move_agent_to_node(id, TileRef::battle(node))
                .expect("lineup tiles are distinct");
        }
    }
    engine.flush_events();
    engine
}

/// Fight until a winner or the time limit. Returns the state hash.
fn fight(engine: &mut Engine) -> u64 {
    engine.start_round();
    let mut elapsed = 0.0;
    while engine.winner().is_none() && elapsed < MAX_SECONDS {
        engine.advance(FRAME);
        elapsed += FRAME;
    }
    let winner = engine.end_round();
    println!("    Winner after {:.1}s: {winner:?}", engine.sim_state.elapsed);
    engine.state_hash()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let data_dir = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/data"));
    let data = load_game_data(data_dir).unwrap_or_else(|e| panic!("failed to load sample data: {e}"));
    println!(
        "Loaded {} units on a {}x{} board\n",
        data.templates.len(),
        data.layout.battle_columns,
        data.layout.battle_rows
    );

    // Run 1
    println!("--- Run 1 ---");
    let mut engine = field_lineup(&data);
    let hash1 = fight(&mut engine);

    for snap in engine.snapshot_agents() {
        println!(
            "      [{:>7}] {:?} {:?} hp={:>6.1} ({:>3.0}%) mana={:>5.1} tile={:?}",
            snap.name,
            snap.team,
            snap.state,
            snap.health.max(0.0),
            snap.health_fraction * 100.0,
            snap.mana,
            snap.tile.node,
        );
    }
    println!("    State hash = {hash1:#018x}\n");

    // Run 2 -- determinism check
    println!("--- Run 2 ---");
    let mut engine = field_lineup(&data);
    let hash2 = fight(&mut engine);

    if hash1 == hash2 {
        println!("    Determinism: PASS (hashes match)");
    } else {
        println!("    Determinism: FAIL! hash1={hash1:#018x} != hash2={hash2:#018x}");
        std::process::exit(1);
    }
}
