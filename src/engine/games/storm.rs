//! Storm: tilt the phone to stay inside a safe circle that shrinks around the
//! centre of the room. Leaving the circle is elimination.

use std::{collections::HashMap, time::Duration};

use serde_json::json;

use super::{ring, round2};
use crate::{
    engine::{EngineContext, EngineSetup, GameOutcome, GameRules},
    state::room::{CENTER, Gyro, LifeStatus, Point},
};

const SURVIVING: &str = "surviving";
const START_RADIUS: f64 = 50.0;
const END_RADIUS: f64 = 10.0;
const SHRINK_OVER: Duration = Duration::from_secs(60);
const MAX_STEP: f64 = 1.5;
const FULL_TILT_DEG: f64 = 45.0;
const SPAWN_RADIUS: f64 = 20.0;

/// Safe radius after `elapsed` of active play.
pub fn safe_radius(elapsed: Duration) -> f64 {
    let progress = (elapsed.as_secs_f64() / SHRINK_OVER.as_secs_f64()).min(1.0);
    START_RADIUS - (START_RADIUS - END_RADIUS) * progress
}

/// Per-tick displacement for a device orientation.
pub fn tilt_step(gyro: Gyro) -> (f64, f64) {
    let axis = |degrees: f64| (degrees / FULL_TILT_DEG).clamp(-1.0, 1.0) * MAX_STEP;
    (axis(gyro.gamma), axis(gyro.beta))
}

/// Rules of the storm game.
pub struct StormRules {
    roster: Vec<String>,
    positions: HashMap<String, Point>,
    alive: Vec<String>,
}

/// Registry entry.
pub fn factory(setup: &EngineSetup) -> Box<dyn GameRules> {
    Box::new(StormRules::new(setup))
}

impl StormRules {
    /// Rules for the players of `setup`.
    pub fn new(setup: &EngineSetup) -> Self {
        Self {
            roster: setup.roster.clone(),
            positions: HashMap::new(),
            alive: Vec::new(),
        }
    }
}

impl GameRules for StormRules {
    fn tick_interval(&self) -> Duration {
        Duration::from_millis(100)
    }

    fn start(&mut self, ctx: &mut EngineContext<'_>) {
        self.alive = ctx
            .present(&self.roster)
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        for (id, point) in self.alive.iter().zip(ring(self.alive.len(), SPAWN_RADIUS)) {
            self.positions.insert(id.clone(), point);
            ctx.set_player(id, "posX", round2(point.x));
            ctx.set_player(id, "posY", round2(point.y));
            ctx.set_player(id, "status", json!(LifeStatus::Alive));
        }
        ctx.set_scratch(
            "storm",
            json!({"x": CENTER, "y": CENTER, "radius": START_RADIUS}),
        );
        ctx.set_phase(SURVIVING);
    }

    fn tick(&mut self, ctx: &mut EngineContext<'_>) {
        let radius = safe_radius(ctx.elapsed());
        let centre = Point::new(CENTER, CENTER);
        ctx.set_scratch(
            "storm",
            json!({"x": CENTER, "y": CENTER, "radius": round2(radius)}),
        );

        let mut out = Vec::new();
        for id in &self.alive {
            let gyro = ctx
                .player(id)
                .and_then(|player| player.gyro)
                .unwrap_or_default();
            let (dx, dy) = tilt_step(gyro);
            let Some(point) = self.positions.get_mut(id) else {
                continue;
            };
            *point = point.offset(dx, dy);
            ctx.set_player(id, "posX", round2(point.x));
            ctx.set_player(id, "posY", round2(point.y));

            if point.distance_sq(centre) > radius * radius {
                out.push(id.clone());
            } else {
                let survived = ctx.elapsed().as_secs() as i64;
                ctx.set_player(id, "score", survived);
            }
        }

        for id in &out {
            ctx.set_player(id, "status", json!(LifeStatus::Dead));
            ctx.set_player(id, "eliminated", true);
        }
        self.alive.retain(|id| !out.contains(id));

        let contested = self.roster.len() > 1;
        if self.alive.is_empty() || (contested && self.alive.len() == 1) {
            ctx.finish(GameOutcome::survivors(self.alive.clone()));
        } else if ctx.elapsed() >= SHRINK_OVER {
            ctx.finish(GameOutcome::survivors(self.alive.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{player_field, room_with, rng, set_path, setup, step};

    #[test]
    fn circle_shrinks_linearly_then_holds() {
        assert_eq!(safe_radius(Duration::ZERO), 50.0);
        assert_eq!(safe_radius(Duration::from_secs(30)), 30.0);
        assert_eq!(safe_radius(Duration::from_secs(60)), 10.0);
        assert_eq!(safe_radius(Duration::from_secs(90)), 10.0);
    }

    #[test]
    fn tilt_is_clamped_to_the_max_step() {
        assert_eq!(tilt_step(Gyro { beta: 0.0, gamma: 90.0 }), (1.5, 0.0));
        assert_eq!(tilt_step(Gyro { beta: -22.5, gamma: 0.0 }), (0.0, -0.75));
    }

    #[test]
    fn drifting_out_of_the_circle_eliminates() {
        let mut doc = room_with(&["ava", "bo"]);
        let mut rng = rng();
        let mut rules = factory(&setup(&["ava", "bo"]));
        step(&mut doc, 0, &mut rng, |ctx| rules.start(ctx));
        assert_eq!(doc["scratch"]["storm"]["radius"], 50.0);

        // Ava spawns at (70, 50) and tilts hard right; Bo stays put at (30, 50).
        set_path(&mut doc, "players/ava/gyro", json!({"beta": 0.0, "gamma": 60.0}));
        let mut outcome = None;
        let mut elapsed = 0;
        while outcome.is_none() {
            elapsed += 100;
            outcome = step(&mut doc, elapsed, &mut rng, |ctx| rules.tick(ctx));
            assert!(elapsed <= 60_000);
        }

        assert_eq!(outcome, Some(GameOutcome::Winner("bo".into())));
        assert_eq!(player_field(&doc, "ava", "status"), "dead");
    }

    #[test]
    fn several_survivors_share_the_win() {
        let mut doc = room_with(&["ava", "bo", "cy"]);
        let mut rng = rng();
        let mut rules = StormRules::new(&setup(&["ava", "bo", "cy"]));
        step(&mut doc, 0, &mut rng, |ctx| rules.start(ctx));

        // Everyone huddles in the eye of the storm.
        for point in rules.positions.values_mut() {
            *point = Point::new(CENTER, CENTER);
        }
        let outcome = step(&mut doc, 60_000, &mut rng, |ctx| rules.tick(ctx));
        let Some(GameOutcome::TeamVictory(winners)) = outcome else {
            panic!("expected shared survival, got {outcome:?}");
        };
        assert_eq!(winners.len(), 3);
    }
}
