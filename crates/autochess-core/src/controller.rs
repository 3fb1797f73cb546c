//! Per-agent state machine, run once per agent per tick.
//!
//! ```text
//! Idle -> Seeking -> Approaching <-> Attacking
//!   \________\___________\______________\____> Dead
//! ```
//!
//! Order of checks each tick:
//! 1. Dead agents do nothing. Health at or below zero is handled first.
//! 2. The attack cooldown counts down.
//! 3. Agents off the battle grid do nothing else.
//! 4. A step in progress is finished before anything else is decided.
//! 5. A dead or missing target is replaced by the nearest living enemy.
//! 6. In range: attack when the cooldown is ready. Otherwise start a step.
//!
//! # Stepping
//!
//! A step toward the target reserves the next node of the path *before* the
//! agent starts moving and releases the node it leaves only on arrival, so an
//! agent always holds every node it overlaps.

use tracing::debug;

use crate::agent::AgentState;
use crate::combat::{apply_damage, find_target, gain_mana, in_range};
use crate::engine::{Engine, report_topology_error};
use crate::event::Event;
use crate::id::{AgentId, GridId, NodeIndex, Team};

impl Engine {
    pub(crate) fn tick_agent(&mut self, id: AgentId, dt: f32) {
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };
        if !agent.is_alive() {
            return;
        }
        if agent.stats.health.value() <= 0.0 {
            self.handle_death(id, None);
            return;
        }

        agent.cooldown.tick(dt);
        if agent.tile.grid != GridId::Battle {
            return;
        }
        if agent.destination.is_some() {
            self.advance_step(id, dt);
            return;
        }

        let Some(target) = self.current_target(id) else {
            if let Some(agent) = self.agents.get_mut(id) {
                agent.state = AgentState::Seeking;
            }
            return;
        };
        let Some(target_position) = self.agents.get(target).map(|t| t.position) else {
            return;
        };
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };

        if in_range(agent.position, target_position, agent.stats.range.capped_value()) {
            agent.state = AgentState::Attacking;
            if agent.cooldown.is_ready() {
                self.attack(id, target);
            }
        } else {
            agent.state = AgentState::Approaching;
            self.begin_step(id, target, dt);
        }
    }

    fn is_valid_target(&self, team: Team, target: AgentId) -> bool {
        self.agents
            .get(target)
            .is_some_and(|t| t.team != team && t.is_alive() && t.tile.grid == GridId::Battle)
    }

    /// Keep the current target while it is a living enemy on the battle
    /// grid; otherwise pick the nearest one.
    fn current_target(&mut self, id: AgentId) -> Option<AgentId> {
        let agent = self.agents.get(id)?;
        let (team, origin) = (agent.team, agent.position);
        if let Some(target) = agent.target
            && self.is_valid_target(team, target)
        {
            return Some(target);
        }

        let candidates = self.order.iter().filter_map(|&other| {
            let a = self.agents.get(other)?;
            (a.team != team && a.is_alive() && a.tile.grid == GridId::Battle)
                .then_some((other, a.position))
        });
        let found = find_target(origin, candidates);

        if let Some(agent) = self.agents.get_mut(id) {
            agent.target = found;
        }
        if let Some(target) = found {
            debug!(?id, ?target, "target acquired");
            self.event_bus.emit(Event::TargetAcquired {
                agent: id,
                target,
                tick: self.sim_state.tick,
            });
        }
        found
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    /// Pick the closest free tile next to the target, path to it, reserve
    /// the first step and start moving. Any failure just skips this tick.
    fn begin_step(&mut self, id: AgentId, target: AgentId, dt: f32) {
        let Some(target_node) = self.agents.get(target).map(|t| t.tile.node) else {
            return;
        };
        let Some(agent) = self.agents.get(id) else {
            return;
        };
        let (origin, current) = (agent.position, agent.tile.node);
        let battle = &self.board.battle;

        let mut candidates: Vec<(f32, NodeIndex)> = battle
            .graph()
            .neighbors(target_node)
            .map(|n| (n.position().distance(origin), n.index()))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let Some(goal) = candidates
            .iter()
            .map(|&(_, node)| node)
            .find(|&node| battle.is_free(node))
        else {
            debug!(?id, ?target, "no free tile next to target");
            return;
        };

        let path = battle.graph().shortest_path(current, goal);
        let Some(&next) = path.get(1) else {
            debug!(?id, ?goal, "no path to goal");
            return;
        };
        if !battle.is_free(next) {
            return;
        }

        if let Err(err) = self.board.battle.reserve(next, id) {
            report_topology_error(&err);
            return;
        }
        if let Some(agent) = self.agents.get_mut(id) {
            agent.destination = Some(next);
        }
        debug!(?id, ?next, ?goal, "tile reserved");
        self.event_bus.emit(Event::TileReserved {
            agent: id,
            node: next,
            tick: self.sim_state.tick,
        });

        self.advance_step(id, dt);
    }

    /// Move toward the reserved node at `move_speed`. On arrival (within
    /// the arrival epsilon, or when this tick's step would overshoot) snap
    /// onto it and release the node left behind.
    fn advance_step(&mut self, id: AgentId, dt: f32) {
        let epsilon_sq = self.config.arrival_epsilon_sq;
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };
        let Some(destination) = agent.destination else {
            return;
        };
        let Some(goal) = self.board.battle.graph().position(destination) else {
            return;
        };

        let to_goal = goal - agent.position;
        let remaining_sq = to_goal.length_squared();
        let step = agent.stats.move_speed.value() * dt;

        if remaining_sq > epsilon_sq && step * step < remaining_sq {
            agent.position += to_goal / remaining_sq.sqrt() * step;
            return;
        }

        agent.position = goal;
        let from = agent.tile.node;
        agent.tile.node = destination;
        agent.destination = None;
        self.release_or_report(GridId::Battle, from, id);

        debug!(?id, ?from, to = ?destination, "arrived");
        self.event_bus.emit(Event::AgentMoved {
            agent: id,
            from,
            to: destination,
            tick: self.sim_state.tick,
        });
    }

    // -----------------------------------------------------------------------
    // Attacking
    // -----------------------------------------------------------------------

    /// Arm the cooldown and hit the target: an ability when mana is full
    /// (spending all mana), otherwise a basic attack that may crit.
    fn attack(&mut self, id: AgentId, target: AgentId) {
        let tick = self.sim_state.tick;
        let basic_attack_mana = self.config.basic_attack_mana;
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };
        if let Err(err) = agent.cooldown.arm(agent.stats.attack_speed.capped_value()) {
            tracing::error!(?id, %err, "attack skipped");
            return;
        }
        let attacker = agent.archetype.attacker();

        let strike = if agent.stats.mana.is_full() {
            agent.stats.mana.set_base_value(0.0);
            debug!(?id, ?target, "ability cast");
            self.event_bus.emit(Event::AbilityCast {
                agent: id,
                target,
                tick,
            });
            attacker.ability(&agent.stats)
        } else {
            let is_critical = self.rng.chance(agent.stats.crit_rate.capped_value());
            let strike = attacker.basic_attack(&agent.stats, is_critical);
            gain_mana(&mut agent.stats.mana, basic_attack_mana);
            self.event_bus.emit(Event::AttackPerformed {
                attacker: id,
                target,
                is_critical,
                tick,
            });
            Some(strike)
        };

        let Some(strike) = strike else {
            return;
        };
        let Some(defender) = self.agents.get_mut(target) else {
            return;
        };
        let Some(report) = apply_damage(defender, &strike, &self.config) else {
            return;
        };

        debug!(?id, ?target, damage = report.post_mitigation, "hit");
        self.event_bus.emit(Event::DamageTaken {
            agent: target,
            attacker: id,
            report,
            tick,
        });
        if report.killed {
            self.handle_death(target, Some(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::agent::{AgentState, StatBlock};
    use crate::board::BoardLayout;
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use crate::event::{Event, EventKind};
    use crate::id::{NodeIndex, Team, TileRef};
    use crate::test_utils::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// One row of `len` battle tiles, no benches worth mentioning.
    fn corridor(len: u32) -> Engine {
        let layout = BoardLayout {
            battle_columns: len,
            battle_rows: 1,
            spacing: 1.0,
            bench_slots: 1,
        };
        Engine::new(layout.build(1.0), EngineConfig::default())
    }

    // -----------------------------------------------------------------------
    // Test 1: Agents stay idle until the round starts
    // -----------------------------------------------------------------------
    #[test]
    fn nothing_happens_outside_a_round() {
        let mut engine = corridor(5);
        let t = engine.register_template(dummy_template("dummy")).unwrap();
        let p = engine.place_agent_at(Team::Player, t, TileRef::battle(NodeIndex(0))).unwrap();
        engine.place_agent_at(Team::Enemy, t, TileRef::battle(NodeIndex(4))).unwrap();

        run_ticks(&mut engine, 10, 0.1);
        assert_eq!(engine.agent(p).unwrap().state(), AgentState::Idle);
        assert_eq!(engine.agent(p).unwrap().tile().node, NodeIndex(0));
    }

    // -----------------------------------------------------------------------
    // Test 2: Approach along a corridor and stop adjacent
    // -----------------------------------------------------------------------
    #[test]
    fn approaches_until_in_range() {
        let mut engine = corridor(5);
        let t = engine.register_template(dummy_template("dummy")).unwrap();
        let p = engine.place_agent_at(Team::Player, t, TileRef::battle(NodeIndex(0))).unwrap();
        let e = engine.place_agent_at(Team::Enemy, t, TileRef::battle(NodeIndex(4))).unwrap();
        engine.start_round();

        engine.tick(0.1);
        let agent = engine.agent(p).unwrap();
        assert_eq!(agent.state(), AgentState::Approaching);
        assert_eq!(agent.target(), Some(e));
        assert!(agent.is_moving());

        run_ticks(&mut engine, 40, 0.1);
        let (pn, en) = (
            engine.agent(p).unwrap().tile().node.0,
            engine.agent(e).unwrap().tile().node.0,
        );
        assert_eq!(en - pn, 1, "agents should end adjacent");
        assert_eq!(engine.agent(p).unwrap().state(), AgentState::Attacking);
        assert_occupancy_consistent(&engine);
    }

    // -----------------------------------------------------------------------
    // Test 3: A moving agent holds both nodes until arrival
    // -----------------------------------------------------------------------
    #[test]
    fn reservation_precedes_movement() {
        let mut engine = corridor(6);
        let slow = with_stats(
            "slow",
            StatBlock {
                move_speed: 0.5,
                ..StatBlock::default()
            },
        );
        let t = engine.register_template(slow).unwrap();
        let p = engine.place_agent_at(Team::Player, t, TileRef::battle(NodeIndex(0))).unwrap();
        engine.place_agent_at(Team::Enemy, t, TileRef::battle(NodeIndex(5))).unwrap();
        engine.start_round();

        // 0.125 per tick: one tile takes eight ticks.
        engine.tick(0.25);
        assert_eq!(engine.agent(p).unwrap().destination(), Some(NodeIndex(1)));
        assert_eq!(engine.board().battle.holder(NodeIndex(0)), Some(p));
        assert_eq!(engine.board().battle.holder(NodeIndex(1)), Some(p));

        run_ticks(&mut engine, 6, 0.25);
        assert!(engine.agent(p).unwrap().is_moving());
        assert_eq!(engine.board().battle.holder(NodeIndex(0)), Some(p));

        engine.tick(0.25);
        let agent = engine.agent(p).unwrap();
        assert!(!agent.is_moving());
        assert_eq!(agent.tile().node, NodeIndex(1));
        assert!(engine.board().battle.is_free(NodeIndex(0)));
        assert_occupancy_consistent(&engine);
    }

    // -----------------------------------------------------------------------
    // Test 4: Fight to the death
    // -----------------------------------------------------------------------
    #[test]
    fn fight_ends_with_one_death_event() {
        let mut engine = corridor(2);
        let strong = with_stats(
            "strong",
            StatBlock {
                damage: 400.0,
                crit_rate: 0.0,
                armor: 0.0,
                attack_speed: 2.0,
                ..StatBlock::default()
            },
        );
        let weak = with_stats(
            "weak",
            StatBlock {
                health: 100.0,
                armor: 0.0,
                damage: 1.0,
                ..StatBlock::default()
            },
        );
        let ts = engine.register_template(strong).unwrap();
        let tw = engine.register_template(weak).unwrap();
        let p = engine.place_agent_at(Team::Player, ts, TileRef::battle(NodeIndex(0))).unwrap();
        let e = engine.place_agent_at(Team::Enemy, tw, TileRef::battle(NodeIndex(1))).unwrap();

        let deaths = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&deaths);
        engine.on_passive(
            EventKind::AgentDied,
            Box::new(move |ev| sink.borrow_mut().push(ev.clone())),
        );

        engine.start_round();
        run_ticks(&mut engine, 20, 0.1);

        assert!(!engine.agent(e).unwrap().is_alive());
        assert!(engine.board().battle.is_free(NodeIndex(1)));
        assert_eq!(engine.agent(p).unwrap().target(), None);
        assert_eq!(engine.winner(), Some(Team::Player));

        let deaths = deaths.borrow();
        assert_eq!(deaths.len(), 1);
        assert!(matches!(deaths[0], Event::AgentDied { agent, killer: Some(k), .. } if agent == e && k == p));
    }

    // -----------------------------------------------------------------------
    // Test 5: Cooldown gates attacks
    // -----------------------------------------------------------------------
    #[test]
    fn attack_rate_follows_attack_speed() {
        let mut engine = corridor(2);
        let tank = with_stats(
            "tank",
            StatBlock {
                health: 1.0e6,
                attack_speed: 1.0,
                crit_rate: 0.0,
                mana: 0.0,
                max_mana: 1.0e6,
                ..StatBlock::default()
            },
        );
        let t = engine.register_template(tank).unwrap();
        let p = engine.place_agent_at(Team::Player, t, TileRef::battle(NodeIndex(0))).unwrap();
        engine.place_agent_at(Team::Enemy, t, TileRef::battle(NodeIndex(1))).unwrap();

        let attacks = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&attacks);
        engine.on_passive(
            EventKind::AttackPerformed,
            Box::new(move |ev| {
                if matches!(ev, Event::AttackPerformed { attacker, .. } if *attacker == p) {
                    *counter.borrow_mut() += 1;
                }
            }),
        );

        engine.start_round();
        // Attacks at t = 0, 1, 2 within ten ticks of 0.25s (t = 0.0 .. 2.25).
        run_ticks(&mut engine, 10, 0.25);
        assert_eq!(*attacks.borrow(), 3);
    }

    // -----------------------------------------------------------------------
    // Test 6: Full mana casts an ability and resets mana
    // -----------------------------------------------------------------------
    #[test]
    fn full_mana_casts_ability() {
        let mut engine = corridor(2);
        let caster = with_stats(
            "full",
            StatBlock {
                mana: 60.0,
                max_mana: 60.0,
                health: 1.0e6,
                ..StatBlock::default()
            },
        );
        let t = engine.register_template(caster).unwrap();
        let p = engine.place_agent_at(Team::Player, t, TileRef::battle(NodeIndex(0))).unwrap();
        engine.place_agent_at(Team::Enemy, t, TileRef::battle(NodeIndex(1))).unwrap();

        let casts = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&casts);
        engine.on_passive(EventKind::AbilityCast, Box::new(move |_| *counter.borrow_mut() += 1));

        engine.start_round();
        engine.tick(0.1);
        assert_eq!(*casts.borrow(), 2);
        assert_eq!(engine.agent(p).unwrap().stats().mana.value(), 0.0);
    }

    // -----------------------------------------------------------------------
    // Test 7: Bench agents never fight
    // -----------------------------------------------------------------------
    #[test]
    fn bench_agents_are_ignored() {
        let mut engine = corridor(3);
        let t = engine.register_template(dummy_template("dummy")).unwrap();
        let p = engine.place_agent(Team::Player, t).unwrap();
        let e = engine.place_agent_at(Team::Enemy, t, TileRef::battle(NodeIndex(2))).unwrap();
        engine.start_round();
        run_ticks(&mut engine, 5, 0.1);

        assert_eq!(engine.agent(p).unwrap().state(), AgentState::Idle);
        // The enemy has nobody on the battle grid to target.
        assert_eq!(engine.agent(e).unwrap().state(), AgentState::Seeking);
        assert_eq!(engine.agent(e).unwrap().target(), None);
    }

    // -----------------------------------------------------------------------
    // Test 8: Ending a round cancels in-flight steps
    // -----------------------------------------------------------------------
    #[test]
    fn end_round_releases_reserved_tiles() {
        let mut engine = corridor(6);
        let slow = with_stats(
            "slow",
            StatBlock {
                move_speed: 0.1,
                ..StatBlock::default()
            },
        );
        let t = engine.register_template(slow).unwrap();
        let p = engine.place_agent_at(Team::Player, t, TileRef::battle(NodeIndex(0))).unwrap();
        engine.place_agent_at(Team::Enemy, t, TileRef::battle(NodeIndex(5))).unwrap();
        engine.start_round();
        engine.tick(0.1);
        assert!(engine.agent(p).unwrap().is_moving());

        assert_eq!(engine.end_round(), None);
        let agent = engine.agent(p).unwrap();
        assert!(!agent.is_moving());
        assert_eq!(agent.state(), AgentState::Idle);
        assert!(engine.board().battle.is_free(NodeIndex(1)));
        assert_eq!(
            agent.position(),
            engine.board().battle.graph().position(NodeIndex(0)).unwrap()
        );
        assert_occupancy_consistent(&engine);
    }
}
