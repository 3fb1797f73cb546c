//! The simulation engine: owns the board and the agents and runs the tick
//! loop.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - A [`Board`] (battle grid and both benches, each an occupancy registry)
//! - The agents, in a `SlotMap`, plus the fixed order they are ticked in
//! - Registered [`AgentTemplate`]s
//! - A [`SimState`] and [`SimulationStrategy`]
//! - An [`EventBus`] and the combat [`SimRng`]
//!
//! # Tick
//!
//! Each step visits every agent once, in placement order, and runs its
//! controller (see `controller.rs`). Contested tiles therefore go to the
//! agent placed earlier. Buffered events are delivered at the end of the
//! step.

use glam::Vec3;
use slotmap::SlotMap;
use tracing::{error, info, warn};

use crate::agent::{Agent, AgentState, AgentTemplate, TemplateError};
use crate::attribute::{Modifier, StatKind};
use crate::board::Board;
use crate::config::EngineConfig;
use crate::event::{Event, EventBus, EventFilter, EventKind, PassiveListener, SubscriberPriority};
use crate::id::{AgentId, GridId, ModifierSource, NodeIndex, TemplateId, Team, TileRef};
use crate::occupancy::OccupancyError;
use crate::rng::SimRng;
use crate::sim::{AdvanceResult, SimState, SimulationStrategy, StateHash};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Rejected external commands.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown template: {0:?}")]
    UnknownTemplate(TemplateId),
    #[error("a template named `{0}` is already registered")]
    DuplicateTemplate(String),
    #[error("unknown agent: {0:?}")]
    UnknownAgent(AgentId),
    #[error("agent {0:?} is dead")]
    AgentDead(AgentId),
    #[error("agent {0:?} is between tiles")]
    AgentMoving(AgentId),
    #[error("no free bench slot for {0:?}")]
    BenchFull(Team),
    #[error("no such tile: {0:?}")]
    NoSuchTile(TileRef),
    #[error("{team:?} cannot use {grid:?}")]
    ForeignBench { team: Team, grid: GridId },
    #[error("tile {0:?} is held by an opponent")]
    HeldByOpponent(TileRef),
    #[error("{team:?} already fields {max} agents")]
    TeamFull { team: Team, max: usize },
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Occupancy(#[from] OccupancyError),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Engine {
    pub(crate) board: Board,
    pub(crate) agents: SlotMap<AgentId, Agent>,
    /// Tick order. Append-only; dead agents stay and are skipped.
    pub(crate) order: Vec<AgentId>,
    pub(crate) templates: Vec<AgentTemplate>,
    pub(crate) event_bus: EventBus,
    pub(crate) config: EngineConfig,
    pub(crate) rng: SimRng,
    pub sim_state: SimState,
    pub(crate) paused: bool,
    pub(crate) fight_active: bool,
    pub(crate) round: u32,
    /// Seconds fought in the current round.
    pub(crate) round_elapsed: f32,
}

impl Engine {
    pub fn new(board: Board, config: EngineConfig) -> Self {
        Self {
            board,
            agents: SlotMap::with_key(),
            order: Vec::new(),
            templates: Vec::new(),
            event_bus: EventBus::new(config.event_capacity),
            rng: SimRng::new(config.seed),
            config,
            sim_state: SimState::new(),
            paused: false,
            fight_active: false,
            round: 0,
            round_elapsed: 0.0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn strategy(&self) -> SimulationStrategy {
        self.config.strategy
    }

    // -----------------------------------------------------------------------
    // Templates
    // -----------------------------------------------------------------------

    /// Validate and register a unit template. Names must be unique.
    pub fn register_template(&mut self, template: AgentTemplate) -> Result<TemplateId, CommandError> {
        template.validate()?;
        if self.template_by_name(&template.name).is_some() {
            return Err(CommandError::DuplicateTemplate(template.name));
        }
        let id = TemplateId(self.templates.len() as u32);
        self.templates.push(template);
        Ok(id)
    }

    pub fn template(&self, id: TemplateId) -> Option<&AgentTemplate> {
        self.templates.get(id.0 as usize)
    }

    pub fn template_by_name(&self, name: &str) -> Option<TemplateId> {
        self.templates
            .iter()
            .position(|t| t.name == name)
            .map(|i| TemplateId(i as u32))
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    // -----------------------------------------------------------------------
    // Agents
    // -----------------------------------------------------------------------

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// All agents, dead ones included, in tick order.
    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &Agent)> + '_ {
        self.order
            .iter()
            .filter_map(|&id| self.agents.get(id).map(|agent| (id, agent)))
    }

    pub fn agents_of(&self, team: Team) -> Vec<AgentId> {
        self.agents()
            .filter(|(_, agent)| agent.team == team)
            .map(|(id, _)| id)
            .collect()
    }

    /// Living agents of `team` standing on the battle grid.
    pub fn living_count(&self, team: Team) -> usize {
        self.agents()
            .filter(|(_, a)| a.team == team && a.is_alive() && a.tile.grid == GridId::Battle)
            .count()
    }

    /// The only team with living agents on the battle grid, if exactly one
    /// team has any.
    pub fn winner(&self) -> Option<Team> {
        match (self.living_count(Team::Player), self.living_count(Team::Enemy)) {
            (p, 0) if p > 0 => Some(Team::Player),
            (0, e) if e > 0 => Some(Team::Enemy),
            _ => None,
        }
    }

    /// Spawn an agent on the first free slot of its team's bench.
    pub fn place_agent(&mut self, team: Team, template: TemplateId) -> Result<AgentId, CommandError> {
        let grid = GridId::Bench(team);
        let node = self
            .board
            .grid(grid)
            .free_node_for(team)
            .ok_or(CommandError::BenchFull(team))?;
        self.place_agent_at(team, template, TileRef::new(grid, node))
    }

    /// Spawn an agent on a specific free tile of the battle grid or its
    /// team's bench.
    pub fn place_agent_at(
        &mut self,
        team: Team,
        template: TemplateId,
        tile: TileRef,
    ) -> Result<AgentId, CommandError> {
        check_grid_access(team, tile.grid)?;
        if tile.grid == GridId::Battle {
            self.check_team_room(team)?;
        }
        let position = self
            .board
            .grid(tile.grid)
            .graph()
            .position(tile.node)
            .ok_or(CommandError::NoSuchTile(tile))?;
        let Some(data) = self.templates.get(template.0 as usize) else {
            return Err(CommandError::UnknownTemplate(template));
        };

        let agent = Agent::spawn(template, data, team, tile, position);
        let name = agent.name.clone();
        let id = self.agents.insert(agent);
        if let Err(err) = self.board.grid_mut(tile.grid).reserve(tile.node, id) {
            self.agents.remove(id);
            return Err(err.into());
        }
        self.order.push(id);

        info!(?id, %name, ?team, ?tile, "agent placed");
        self.event_bus.emit(Event::AgentPlaced {
            agent: id,
            team,
            tile,
            tick: self.sim_state.tick,
        });
        Ok(id)
    }

    /// Drag-and-drop relocation. A tile held by a teammate is swapped;
    /// neither agent may be mid-move.
    pub fn move_agent_to_node(&mut self, id: AgentId, to: TileRef) -> Result<(), CommandError> {
        let agent = self.agents.get(id).ok_or(CommandError::UnknownAgent(id))?;
        if !agent.is_alive() {
            warn!(?id, "relocation of a dead agent rejected");
            return Err(CommandError::AgentDead(id));
        }
        if agent.is_moving() {
            return Err(CommandError::AgentMoving(id));
        }
        let team = agent.team;
        let from = agent.tile;
        check_grid_access(team, to.grid)?;
        if !self.board.grid(to.grid).graph().contains(to.node) {
            return Err(CommandError::NoSuchTile(to));
        }
        if from == to {
            return Ok(());
        }
        // Swapping with a fielded teammate keeps the count unchanged.
        if from.grid != GridId::Battle
            && to.grid == GridId::Battle
            && self.board.battle.holder(to.node).is_none()
        {
            self.check_team_room(team)?;
        }

        match self.board.grid(to.grid).holder(to.node) {
            None => {
                self.board.grid_mut(from.grid).release(from.node, id)?;
                self.board.grid_mut(to.grid).reserve(to.node, id)?;
                self.set_tile(id, to);
                self.emit_relocated(id, from, to);
            }
            Some(other) => {
                let Some(occupant) = self.agents.get(other) else {
                    return Err(CommandError::UnknownAgent(other));
                };
                if occupant.team != team {
                    warn!(?id, ?to, "relocation onto an opponent rejected");
                    return Err(CommandError::HeldByOpponent(to));
                }
                if occupant.is_moving() {
                    return Err(CommandError::AgentMoving(other));
                }
                self.board.grid_mut(from.grid).release(from.node, id)?;
                self.board.grid_mut(to.grid).release(to.node, other)?;
                self.board.grid_mut(to.grid).reserve(to.node, id)?;
                self.board.grid_mut(from.grid).reserve(from.node, other)?;
                self.set_tile(id, to);
                self.set_tile(other, from);
                self.emit_relocated(id, from, to);
                self.emit_relocated(other, to, from);
            }
        }
        Ok(())
    }

    fn check_team_room(&self, team: Team) -> Result<(), CommandError> {
        if let Some(max) = self.config.max_fielded
            && self.living_count(team) >= max
        {
            warn!(?team, max, "team is full");
            return Err(CommandError::TeamFull { team, max });
        }
        Ok(())
    }

    fn set_tile(&mut self, id: AgentId, tile: TileRef) {
        let position = self.board.grid(tile.grid).graph().position(tile.node);
        if let Some(agent) = self.agents.get_mut(id) {
            agent.tile = tile;
            if let Some(position) = position {
                agent.position = position;
            }
            if tile.grid != GridId::Battle {
                agent.target = None;
                agent.state = AgentState::Idle;
            }
        }
    }

    fn emit_relocated(&mut self, agent: AgentId, from: TileRef, to: TileRef) {
        info!(?agent, ?from, ?to, "agent relocated");
        self.event_bus.emit(Event::AgentRelocated {
            agent,
            from,
            to,
            tick: self.sim_state.tick,
        });
    }

    /// Attach a modifier to one of an agent's stats.
    pub fn apply_modifier(
        &mut self,
        id: AgentId,
        stat: StatKind,
        modifier: Modifier,
    ) -> Result<(), CommandError> {
        let agent = self.living_agent_mut(id)?;
        agent.stats.get_mut(stat).add_modifier(modifier);
        Ok(())
    }

    /// Strip every modifier from `source` off an agent. Returns whether any
    /// were removed.
    pub fn remove_modifiers_from_source(
        &mut self,
        id: AgentId,
        source: ModifierSource,
    ) -> Result<bool, CommandError> {
        let agent = self.living_agent_mut(id)?;
        Ok(agent.stats.remove_all_from_source(source))
    }

    fn living_agent_mut(&mut self, id: AgentId) -> Result<&mut Agent, CommandError> {
        let agent = self.agents.get_mut(id).ok_or(CommandError::UnknownAgent(id))?;
        if !agent.is_alive() {
            return Err(CommandError::AgentDead(id));
        }
        Ok(agent)
    }

    // -----------------------------------------------------------------------
    // Rounds
    // -----------------------------------------------------------------------

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_fight_active(&self) -> bool {
        self.fight_active
    }

    /// Seconds fought so far in the current round.
    pub fn round_elapsed(&self) -> f32 {
        self.round_elapsed
    }

    /// Begin a fight. Agents only act between `start_round` and `end_round`.
    pub fn start_round(&mut self) {
        if self.fight_active {
            return;
        }
        self.round += 1;
        self.fight_active = true;
        self.round_elapsed = 0.0;
        info!(round = self.round, "round started");
        self.event_bus.emit(Event::RoundStarted {
            round: self.round,
            tick: self.sim_state.tick,
        });
    }

    /// Stop the fight. In-flight steps are cancelled: the reserved node is
    /// released and the agent snaps back to the node it still holds.
    pub fn end_round(&mut self) -> Option<Team> {
        if !self.fight_active {
            return None;
        }
        self.fight_active = false;

        for i in 0..self.order.len() {
            let id = self.order[i];
            let Some(agent) = self.agents.get_mut(id) else {
                continue;
            };
            let reserved = agent.destination.take();
            agent.target = None;
            if agent.is_alive() {
                agent.state = AgentState::Idle;
            }
            let tile = agent.tile;
            if let Some(node) = reserved {
                self.release_or_report(GridId::Battle, node, id);
            }
            if let Some(position) = self.board.grid(tile.grid).graph().position(tile.node)
                && let Some(agent) = self.agents.get_mut(id)
            {
                agent.position = position;
            }
        }

        let winner = self.winner();
        info!(round = self.round, ?winner, "round ended");
        self.event_bus.emit(Event::RoundEnded {
            round: self.round,
            winner,
            tick: self.sim_state.tick,
        });
        self.event_bus.deliver();
        winner
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// While paused, `tick()` and `advance()` are no-ops.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // -----------------------------------------------------------------------
    // Event system
    // -----------------------------------------------------------------------

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.event_bus.on_passive(kind, listener);
    }

    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        self.event_bus.on_passive_filtered(kind, priority, filter, listener);
    }

    /// Deliver events emitted outside a tick (placement, relocation).
    pub fn flush_events(&mut self) {
        self.event_bus.deliver();
    }

    // -----------------------------------------------------------------------
    // Advance
    // -----------------------------------------------------------------------

    /// Run exactly one tick of `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        if self.paused {
            return;
        }
        self.step_internal(dt);
    }

    /// Advance by `dt` seconds of wall-clock time.
    ///
    /// - **Variable**: one tick of `dt`.
    /// - **Fixed**: `dt` is accumulated and as many fixed ticks run as fit.
    pub fn advance(&mut self, dt: f32) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        if self.paused {
            return result;
        }

        match self.config.strategy {
            SimulationStrategy::Variable => {
                self.step_internal(dt);
                result.steps_run = 1;
            }
            SimulationStrategy::Fixed { timestep } => {
                if timestep.is_nan() || timestep <= 0.0 {
                    error!(timestep, "fixed timestep must be positive");
                    return result;
                }
                self.sim_state.accumulator += dt;
                while self.sim_state.accumulator >= timestep {
                    self.sim_state.accumulator -= timestep;
                    self.step_internal(timestep);
                    result.steps_run += 1;
                }
            }
        }
        result
    }

    fn step_internal(&mut self, dt: f32) {
        if self.fight_active {
            for i in 0..self.order.len() {
                let id = self.order[i];
                self.tick_agent(id, dt);
            }

            self.round_elapsed += dt;
            if let Some(limit) = self.config.round_duration
                && self.round_elapsed >= limit
            {
                info!(round = self.round, limit, "round timed out");
                self.end_round();
            }
        }

        self.event_bus.deliver();
        self.sim_state.tick += 1;
        self.sim_state.elapsed += dt as f64;
    }

    // -----------------------------------------------------------------------
    // Death
    // -----------------------------------------------------------------------

    /// Cleanup after an agent's transition to `Dead`: free its tiles, drop
    /// it from every target slot and announce the death. Called exactly once
    /// per death.
    pub(crate) fn handle_death(&mut self, id: AgentId, killer: Option<AgentId>) {
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };
        agent.state = AgentState::Dead;
        agent.target = None;
        let reserved = agent.destination.take();
        let tile = agent.tile;
        let team = agent.team;

        self.release_or_report(tile.grid, tile.node, id);
        if let Some(node) = reserved {
            self.release_or_report(GridId::Battle, node, id);
        }
        for other in self.agents.values_mut() {
            if other.target == Some(id) {
                other.target = None;
            }
        }

        info!(?id, ?team, ?killer, "agent died");
        self.event_bus.emit(Event::AgentDied {
            agent: id,
            team,
            killer,
            tick: self.sim_state.tick,
        });
    }

    /// Release a tile the engine believes `id` holds. A failure means the
    /// occupancy bookkeeping is corrupt: fatal in debug builds.
    pub(crate) fn release_or_report(&mut self, grid: GridId, node: NodeIndex, id: AgentId) {
        if let Err(err) = self.board.grid_mut(grid).release(node, id) {
            report_topology_error(&err);
        }
    }

    // -----------------------------------------------------------------------
    // State hash
    // -----------------------------------------------------------------------

    /// FNV-1a over the tick counter, every agent's tile, position, health
    /// and mana, and every grid's occupancy.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.sim_state.tick);
        h.write_u64(self.rng.state());

        for (_, agent) in self.agents() {
            h.write_u32(agent.is_alive() as u32);
            h.write_u32(grid_tag(agent.tile.grid));
            h.write_u32(agent.tile.node.0);
            h.write_u32(agent.destination.map_or(u32::MAX, |n| n.0));
            write_vec3(&mut h, agent.position);
            h.write_f32(agent.stats.health.value());
            h.write_f32(agent.stats.mana.value());
        }

        for grid in Board::GRIDS {
            let registry = self.board.grid(grid);
            h.write_u32(grid_tag(grid));
            for i in 0..registry.graph().node_count() {
                h.write_u32(!registry.is_free(NodeIndex(i as u32)) as u32);
            }
        }
        h.finish()
    }
}

fn check_grid_access(team: Team, grid: GridId) -> Result<(), CommandError> {
    match grid {
        GridId::Bench(owner) if owner != team => Err(CommandError::ForeignBench { team, grid }),
        _ => Ok(()),
    }
}

pub(crate) fn report_topology_error(err: &OccupancyError) {
    error!(%err, "occupancy invariant violated");
    if cfg!(debug_assertions) {
        panic!("occupancy invariant violated: {err}");
    }
}

fn grid_tag(grid: GridId) -> u32 {
    match grid {
        GridId::Battle => 0,
        GridId::Bench(Team::Player) => 1,
        GridId::Bench(Team::Enemy) => 2,
    }
}

fn write_vec3(h: &mut StateHash, v: Vec3) {
    h.write_f32(v.x);
    h.write_f32(v.y);
    h.write_f32(v.z);
}
