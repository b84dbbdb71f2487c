//! Pursuit: one hunter (shark or fisher) chases everyone else across the
//! normalized 0-100 room. Touching the hunter eliminates the prey.

use std::{collections::HashMap, time::Duration};

use rand::seq::IndexedRandom;
use serde_json::json;

use super::{ring, round2};
use crate::{
    engine::{EngineContext, EngineSetup, GameOutcome, GameRules},
    state::room::{CENTER, Direction, LifeStatus, Point},
};

const PLAYING: &str = "playing";
const PREY_START_RADIUS: f64 = 35.0;

/// Tunables of one pursuit variant.
#[derive(Debug, Clone, Copy)]
pub struct PursuitConfig {
    /// Scratch key holding the hunter's id.
    pub hunter_key: &'static str,
    /// Role written on the hunter.
    pub hunter_role: &'static str,
    /// Role written on everyone else.
    pub prey_role: &'static str,
    /// Hunter movement per tick, in room percent.
    pub hunter_step: f64,
    /// Prey movement per tick, in room percent.
    pub prey_step: f64,
    /// Catch radius, in room percent.
    pub radius: f64,
    /// Prey win once this much time survives.
    pub duration: Duration,
}

/// Shark: fast hunter, small bite radius.
pub const SHARK: PursuitConfig = PursuitConfig {
    hunter_key: "sharkId",
    hunter_role: "shark",
    prey_role: "swimmer",
    hunter_step: 3.0,
    prey_step: 2.0,
    radius: 8.0,
    duration: Duration::from_secs(60),
};

/// Fisher: slower hunter with a wider net, shorter round.
pub const FISHER: PursuitConfig = PursuitConfig {
    hunter_key: "fisherId",
    hunter_role: "fisher",
    prey_role: "fish",
    hunter_step: 2.5,
    prey_step: 2.0,
    radius: 10.0,
    duration: Duration::from_secs(45),
};

/// Whether two entities touch. Exactly `radius` apart counts as a catch.
pub fn collides(a: Point, b: Point, radius: f64) -> bool {
    a.distance_sq(b) <= radius * radius
}

/// Rules of a pursuit game.
pub struct PursuitRules {
    config: PursuitConfig,
    roster: Vec<String>,
    hunter: Option<String>,
    positions: HashMap<String, Point>,
    caught: Vec<String>,
}

/// Shark registry entry.
pub fn shark(setup: &EngineSetup) -> Box<dyn GameRules> {
    Box::new(PursuitRules::new(setup, SHARK))
}

/// Fisher registry entry.
pub fn fisher(setup: &EngineSetup) -> Box<dyn GameRules> {
    Box::new(PursuitRules::new(setup, FISHER))
}

impl PursuitRules {
    /// Rules for `setup` with the given variant tunables.
    pub fn new(setup: &EngineSetup, config: PursuitConfig) -> Self {
        Self {
            config,
            roster: setup.roster.clone(),
            hunter: None,
            positions: HashMap::new(),
            caught: Vec::new(),
        }
    }

    fn is_prey(&self, id: &str) -> bool {
        self.hunter.as_deref() != Some(id)
    }

    fn free_prey(&self) -> Vec<String> {
        self.roster
            .iter()
            .filter(|id| self.is_prey(id) && !self.caught.contains(id))
            .cloned()
            .collect()
    }

    fn publish(&self, ctx: &mut EngineContext<'_>, id: &str) {
        if let Some(point) = self.positions.get(id) {
            ctx.set_player(id, "posX", round2(point.x));
            ctx.set_player(id, "posY", round2(point.y));
        }
    }
}

impl GameRules for PursuitRules {
    fn tick_interval(&self) -> Duration {
        Duration::from_millis(100)
    }

    fn start(&mut self, ctx: &mut EngineContext<'_>) {
        self.roster = ctx
            .present(&self.roster)
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        let hunter = self.roster.choose(ctx.rng()).cloned();
        self.hunter = hunter.clone();
        let prey: Vec<String> = self
            .roster
            .iter()
            .filter(|id| self.is_prey(id))
            .cloned()
            .collect();

        if let Some(hunter) = &hunter {
            self.positions
                .insert(hunter.clone(), Point::new(CENTER, CENTER));
            ctx.set_scratch(self.config.hunter_key, hunter.as_str());
        }
        for (id, point) in prey.iter().zip(ring(prey.len(), PREY_START_RADIUS)) {
            self.positions.insert(id.clone(), point);
        }

        for id in &self.roster {
            let role = if self.is_prey(id) {
                self.config.prey_role
            } else {
                self.config.hunter_role
            };
            ctx.set_player(id, "role", role);
            ctx.set_player(id, "status", json!(LifeStatus::Alive));
            self.publish(ctx, id);
        }
        ctx.set_phase(PLAYING);
    }

    fn tick(&mut self, ctx: &mut EngineContext<'_>) {
        let Some(hunter) = self.hunter.clone() else {
            ctx.finish(GameOutcome::NoWinner);
            return;
        };

        for (id, player) in ctx.present(&self.roster) {
            if self.caught.iter().any(|caught| caught == id) {
                continue;
            }
            let dir = player.last_move.map_or(Direction::Stop, |intent| intent.dir);
            let (dx, dy) = dir.vector();
            let step = if id == hunter {
                self.config.hunter_step
            } else {
                self.config.prey_step
            };
            if let Some(point) = self.positions.get_mut(id) {
                *point = point.offset(dx * step, dy * step);
            }
            self.publish(ctx, id);
        }

        let hunter_at = self
            .positions
            .get(&hunter)
            .copied()
            .unwrap_or(Point::new(CENTER, CENTER));
        for id in self.free_prey() {
            let Some(point) = self.positions.get(&id).copied() else {
                continue;
            };
            if collides(hunter_at, point, self.config.radius) {
                ctx.set_player(&id, "status", json!(LifeStatus::Dead));
                ctx.set_player(&id, "eliminated", true);
                self.caught.push(id);
            }
        }
        ctx.set_player(&hunter, "score", self.caught.len() as i64);

        let free = self.free_prey();
        if free.is_empty() {
            ctx.finish(GameOutcome::Winner(hunter));
        } else if ctx.elapsed() >= self.config.duration {
            ctx.finish(GameOutcome::TeamVictory(free));
        }
    }
}
