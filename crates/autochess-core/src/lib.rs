//! Autochess Core -- the positional combat engine for auto-battler games.
//!
//! This crate provides the stat system, the board graphs with pathfinding,
//! tile occupancy, the damage pipeline and the per-agent controller that
//! together resolve a fight between two teams of units.
//!
//! # Tick
//!
//! Each call to [`engine::Engine::tick`] advances the simulation by one step:
//!
//! 1. **Agents** -- While a round is active, every agent runs its controller
//!    in placement order: cooldown, movement, targeting, attack.
//! 2. **Events** -- Buffered events are delivered to listeners.
//! 3. **Bookkeeping** -- The tick counter and elapsed time advance.
//!
//! # Occupancy
//!
//! Every living agent holds the tile it stands on. A step reserves the next
//! tile before the agent leaves, and the old tile is only released on
//! arrival, so two agents never share a tile:
//!
//! ```rust,ignore
//! let t = engine.register_template(template)?;
//! let id = engine.place_agent(Team::Player, t)?; // first free bench slot
//! engine.move_agent_to_node(id, TileRef::battle(NodeIndex(3)))?;
//! engine.start_round();
//! engine.advance(dt);
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns the board and agents and runs the tick loop.
//! - [`attribute::Attribute`] -- A stat with a base value, an optional cap
//!   and ordered flat/percent modifiers.
//! - [`graph::SpatialGraph`] -- Tile positions, adjacency and Dijkstra
//!   shortest paths that avoid occupied tiles.
//! - [`occupancy::OccupancyRegistry`] -- Which agent holds which tile.
//! - [`combat`] -- Targeting, range, cooldowns and damage mitigation.
//! - [`event::EventBus`] -- Typed event bus with buffered delivery.
//! - [`query`] -- Owned snapshots for rendering and UI.

pub mod agent;
pub mod attribute;
pub mod board;
pub mod combat;
pub mod config;
mod controller;
pub mod engine;
pub mod event;
pub mod graph;
pub mod id;
pub mod occupancy;
pub mod query;
pub mod rng;
pub mod sim;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
