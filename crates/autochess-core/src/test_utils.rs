//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use std::cell::RefCell;
use std::rc::Rc;

use crate::agent::{AgentTemplate, StatBlock};
use crate::board::BoardLayout;
use crate::combat::Archetype;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::event::{Event, EventKind};
use crate::id::{AgentId, GridId, NodeIndex, Team, TileRef};

// ===========================================================================
// Template constructors
// ===========================================================================

/// A striker with the default stat block.
pub fn dummy_template(name: &str) -> AgentTemplate {
    AgentTemplate::new(name, Archetype::Striker, StatBlock::default())
}

pub fn with_stats(name: &str, stats: StatBlock) -> AgentTemplate {
    AgentTemplate::new(name, Archetype::Striker, stats)
}

/// A caster that never crits.
pub fn caster_template(name: &str) -> AgentTemplate {
    AgentTemplate::new(
        name,
        Archetype::Caster,
        StatBlock {
            damage: 40.0,
            crit_rate: 0.0,
            range: 3.0,
            ..StatBlock::default()
        },
    )
}

// ===========================================================================
// Engine builders
// ===========================================================================

/// 4x4 battle grid, 4 bench slots per team.
pub fn small_layout() -> BoardLayout {
    BoardLayout {
        battle_columns: 4,
        battle_rows: 4,
        spacing: 1.0,
        bench_slots: 4,
    }
}

/// Small board with a `dummy` template registered.
pub fn small_engine() -> Engine {
    engine_with_layout(&small_layout(), EngineConfig::default())
}

pub fn engine_with_layout(layout: &BoardLayout, config: EngineConfig) -> Engine {
    let mut engine = Engine::new(layout.build(config.adjacency_threshold), config);
    engine
        .register_template(dummy_template("dummy"))
        .expect("dummy template is valid");
    engine
}

/// Default board with `per_side` dummies on each team's home rows: players
/// fill from node 0 upward, enemies from the last node downward.
pub fn build_battle(per_side: usize, config: EngineConfig) -> Engine {
    let mut engine = engine_with_layout(&BoardLayout::default(), config);
    let t = engine.template_by_name("dummy").expect("registered above");
    let last = engine.board().battle.graph().node_count() as u32 - 1;
    for i in 0..per_side as u32 {
        engine
            .place_agent_at(Team::Player, t, TileRef::battle(NodeIndex(i)))
            .expect("player tile is free");
        engine
            .place_agent_at(Team::Enemy, t, TileRef::battle(NodeIndex(last - i)))
            .expect("enemy tile is free");
    }
    engine
}

// ===========================================================================
// Running
// ===========================================================================

pub fn run_ticks(engine: &mut Engine, ticks: usize, dt: f32) {
    for _ in 0..ticks {
        engine.tick(dt);
    }
}

/// Tick until one side is wiped out or `max_ticks` pass. Returns the winner
/// and the number of ticks run.
pub fn run_until_winner(engine: &mut Engine, dt: f32, max_ticks: usize) -> (Option<Team>, usize) {
    for tick in 0..max_ticks {
        if let Some(team) = engine.winner() {
            return (Some(team), tick);
        }
        engine.tick(dt);
    }
    (engine.winner(), max_ticks)
}

// ===========================================================================
// Event recording
// ===========================================================================

/// Subscribe to `kind` and collect every delivered event.
pub fn record_events(engine: &mut Engine, kind: EventKind) -> Rc<RefCell<Vec<Event>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    engine.on_passive(kind, Box::new(move |event| sink.borrow_mut().push(event.clone())));
    log
}

// ===========================================================================
// Invariant checks
// ===========================================================================

/// Occupancy agrees with the agents on every grid:
/// - the graph's occupied flags match the registry's holders
/// - every holder is a living agent standing on or stepping to that node
/// - every living agent holds its tile, and its destination if moving
/// - dead agents hold nothing
pub fn assert_occupancy_consistent(engine: &Engine) {
    for grid in crate::board::Board::GRIDS {
        let registry = engine.board().grid(grid);
        for node in registry.graph().nodes() {
            let index = node.index();
            let holder = registry.holder(index);
            assert_eq!(
                node.is_occupied(),
                holder.is_some(),
                "{grid:?} {index:?}: occupied flag disagrees with holder"
            );
            if let Some(id) = holder {
                let agent = engine.agent(id).expect("holder exists");
                assert!(agent.is_alive(), "{grid:?} {index:?} held by dead agent");
                let stands = agent.tile() == TileRef::new(grid, index);
                let steps = grid == GridId::Battle && agent.destination() == Some(index);
                assert!(stands || steps, "{grid:?} {index:?} held by unrelated agent {id:?}");
            }
        }
    }

    for (id, agent) in engine.agents() {
        let tile = agent.tile();
        let holder = engine.board().grid(tile.grid).holder(tile.node);
        if agent.is_alive() {
            assert_eq!(holder, Some(id), "{id:?} does not hold its tile");
            if let Some(dest) = agent.destination() {
                assert_eq!(engine.board().battle.holder(dest), Some(id));
            }
        } else {
            assert_ne!(holder, Some(id), "dead {id:?} still holds its tile");
        }
    }
}

/// Living agents of `team` on the battle grid.
pub fn fighters(engine: &Engine, team: Team) -> Vec<AgentId> {
    engine
        .agents()
        .filter(|(_, a)| a.team() == team && a.is_alive() && a.tile().grid == GridId::Battle)
        .map(|(id, _)| id)
        .collect()
}
