//! Endless runner: three lanes, obstacles scroll toward the runners, swipes
//! up and down change lane. The obstacle list is local to the engine and
//! only mirrored into scratch for display.

use std::{collections::HashMap, time::Duration};

use rand::Rng;
use serde_json::{Value, json};

use super::round2;
use crate::{
    engine::{EngineContext, EngineSetup, GameOutcome, GameRules},
    state::room::{Direction, LifeStatus},
};

const RUNNING: &str = "running";
const LANES: u8 = 3;
const START_LANE: u8 = 1;
const RUNNER_X: f64 = 15.0;
const HIT_HALF_WIDTH: f64 = 4.0;
const OBSTACLE_SPEED: f64 = 2.0;
const SPAWN_EVERY: Duration = Duration::from_millis(1_200);
const DISTANCE_PER_TICK: f64 = 1.0;
const TIME_LIMIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Obstacle {
    lane: u8,
    x: f64,
}

/// Lane after applying a swipe.
pub fn shift_lane(lane: u8, dir: Direction) -> u8 {
    match dir {
        Direction::Up => lane.saturating_sub(1),
        Direction::Down => (lane + 1).min(LANES - 1),
        _ => lane,
    }
}

#[derive(Debug, Clone)]
struct Runner {
    lane: u8,
    distance: f64,
    last_swipe_at: Option<i64>,
    alive: bool,
}

/// Rules of the runner game.
pub struct RunnerRules {
    roster: Vec<String>,
    runners: HashMap<String, Runner>,
    obstacles: Vec<Obstacle>,
    next_spawn: Duration,
}

/// Registry entry.
pub fn factory(setup: &EngineSetup) -> Box<dyn GameRules> {
    Box::new(RunnerRules::new(setup))
}

impl RunnerRules {
    /// Rules for the players of `setup`.
    pub fn new(setup: &EngineSetup) -> Self {
        Self {
            roster: setup.roster.clone(),
            runners: HashMap::new(),
            obstacles: Vec::new(),
            next_spawn: SPAWN_EVERY,
        }
    }

    /// Apply fresh swipes. A swipe is new when its timestamp changed, so
    /// holding a direction does not keep changing lanes.
    fn read_swipes(&mut self, ctx: &mut EngineContext<'_>) {
        for (id, player) in ctx.present(&self.roster) {
            let Some(runner) = self.runners.get_mut(id) else {
                continue;
            };
            let Some(swipe) = player.last_move else {
                continue;
            };
            if !runner.alive || runner.last_swipe_at == Some(swipe.at) {
                continue;
            }
            runner.last_swipe_at = Some(swipe.at);
            runner.lane = shift_lane(runner.lane, swipe.dir);
            ctx.set_player(id, "lane", runner.lane);
        }
    }

    fn publish_obstacles(&self, ctx: &mut EngineContext<'_>) {
        let obstacles: Vec<Value> = self
            .obstacles
            .iter()
            .map(|obstacle| json!({"lane": obstacle.lane, "x": round2(obstacle.x)}))
            .collect();
        ctx.set_scratch("obstacles", obstacles);
    }

    fn standings(&self) -> GameOutcome {
        GameOutcome::top_scorer(self.roster.iter().filter_map(|id| {
            self.runners
                .get(id)
                .map(|runner| (id.as_str(), runner.distance as i64))
        }))
    }
}

impl GameRules for RunnerRules {
    fn tick_interval(&self) -> Duration {
        Duration::from_millis(100)
    }

    fn start(&mut self, ctx: &mut EngineContext<'_>) {
        for (id, player) in ctx.present(&self.roster) {
            self.runners.insert(
                id.to_string(),
                Runner {
                    lane: START_LANE,
                    distance: 0.0,
                    last_swipe_at: player.last_move.map(|swipe| swipe.at),
                    alive: true,
                },
            );
            ctx.set_player(id, "lane", START_LANE);
            ctx.set_player(id, "distance", 0.0);
            ctx.set_player(id, "status", json!(LifeStatus::Alive));
        }
        self.publish_obstacles(ctx);
        ctx.set_phase(RUNNING);
    }

    fn tick(&mut self, ctx: &mut EngineContext<'_>) {
        self.read_swipes(ctx);

        for obstacle in &mut self.obstacles {
            obstacle.x -= OBSTACLE_SPEED;
        }
        self.obstacles.retain(|obstacle| obstacle.x > -HIT_HALF_WIDTH);
        if ctx.elapsed() >= self.next_spawn {
            self.next_spawn += SPAWN_EVERY;
            let lane = ctx.rng().random_range(0..LANES);
            self.obstacles.push(Obstacle { lane, x: 100.0 });
        }

        for id in &self.roster {
            let Some(runner) = self.runners.get_mut(id) else {
                continue;
            };
            if !runner.alive {
                continue;
            }
            let hit = self.obstacles.iter().any(|obstacle| {
                obstacle.lane == runner.lane && (obstacle.x - RUNNER_X).abs() <= HIT_HALF_WIDTH
            });
            if hit {
                runner.alive = false;
                ctx.set_player(id, "status", json!(LifeStatus::Dead));
                ctx.set_player(id, "eliminated", true);
            } else {
                runner.distance += DISTANCE_PER_TICK;
                ctx.set_player(id, "distance", runner.distance);
                ctx.set_player(id, "score", runner.distance as i64);
            }
        }
        self.publish_obstacles(ctx);

        let anyone_running = self.runners.values().any(|runner| runner.alive);
        if !anyone_running || ctx.elapsed() >= TIME_LIMIT {
            ctx.finish(self.standings());
        }
    }

    fn observe(&mut self, ctx: &mut EngineContext<'_>) {
        self.read_swipes(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{player_field, room_with, rng, set_path, setup, step};

    #[test]
    fn lanes_are_clamped() {
        assert_eq!(shift_lane(0, Direction::Up), 0);
        assert_eq!(shift_lane(1, Direction::Up), 0);
        assert_eq!(shift_lane(2, Direction::Down), 2);
        assert_eq!(shift_lane(1, Direction::Left), 1);
    }

    #[test]
    fn each_swipe_moves_one_lane_once() {
        let mut doc = room_with(&["ava"]);
        let mut rng = rng();
        let mut rules = RunnerRules::new(&setup(&["ava"]));
        step(&mut doc, 0, &mut rng, |ctx| rules.start(ctx));
        assert_eq!(player_field(&doc, "ava", "lane"), 1);

        set_path(&mut doc, "players/ava/lastMove", json!({"dir": "up", "at": 10}));
        step(&mut doc, 50, &mut rng, |ctx| rules.observe(ctx));
        step(&mut doc, 60, &mut rng, |ctx| rules.observe(ctx));
        assert_eq!(player_field(&doc, "ava", "lane"), 0);

        set_path(&mut doc, "players/ava/lastMove", json!({"dir": "down", "at": 20}));
        step(&mut doc, 70, &mut rng, |ctx| rules.observe(ctx));
        assert_eq!(player_field(&doc, "ava", "lane"), 1);
    }

    #[test]
    fn obstacle_in_lane_eliminates_and_longest_run_wins() {
        let mut doc = room_with(&["ava", "bo"]);
        let mut rng = rng();
        let mut rules = RunnerRules::new(&setup(&["ava", "bo"]));
        step(&mut doc, 0, &mut rng, |ctx| rules.start(ctx));

        set_path(&mut doc, "players/bo/lastMove", json!({"dir": "down", "at": 5}));
        step(&mut doc, 10, &mut rng, |ctx| rules.observe(ctx));
        rules.obstacles.push(Obstacle { lane: 1, x: RUNNER_X + 6.0 });

        step(&mut doc, 100, &mut rng, |ctx| rules.tick(ctx));
        assert_eq!(player_field(&doc, "ava", "status"), "dead");
        assert_eq!(player_field(&doc, "bo", "distance"), 1.0);

        let mut outcome = None;
        let mut elapsed = 100;
        while outcome.is_none() {
            elapsed += 100;
            rules.obstacles.clear();
            outcome = step(&mut doc, elapsed, &mut rng, |ctx| rules.tick(ctx));
        }
        assert_eq!(elapsed, 60_000);
        assert_eq!(outcome, Some(GameOutcome::Winner("bo".into())));
    }
}
