//! The shipped sample data loads and produces a playable engine.

use std::path::Path;

use autochess_core::combat::Archetype;
use autochess_core::id::{NodeIndex, Team, TileRef};
use autochess_core::sim::SimulationStrategy;
use autochess_core::test_utils::*;
use autochess_data::load_game_data;

fn sample_dir() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/data"))
}

#[test]
fn sample_data_loads() {
    let data = load_game_data(sample_dir()).unwrap();
    assert!(matches!(data.config.strategy, SimulationStrategy::Fixed { .. }));
    assert_eq!(data.layout.battle_columns, 7);

    let names: Vec<&str> = data.templates.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["dummy", "knight", "squire", "archer", "mage"]);

    let squire = &data.templates[2];
    assert_eq!(squire.stats.armor, 60.0);
    assert_eq!(squire.stats.health, 550.0);
    assert_eq!(data.templates[4].archetype, Archetype::Caster);
}

#[test]
fn sample_units_fight_to_a_winner() {
    let data = load_game_data(sample_dir()).unwrap();
    let mut engine = data.build_engine().unwrap();
    let knight = engine.template_by_name("knight").unwrap();
    let mage = engine.template_by_name("mage").unwrap();

    engine.place_agent_at(Team::Player, knight, TileRef::battle(NodeIndex(3))).unwrap();
    engine.place_agent_at(Team::Enemy, mage, TileRef::battle(NodeIndex(52))).unwrap();
    engine.start_round();

    let (winner, _) = run_until_winner(&mut engine, 0.1, 20_000);
    assert!(winner.is_some());
    assert_occupancy_consistent(&engine);
}
