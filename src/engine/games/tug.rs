//! Tug of war: join-order parity splits the room into red and blue; the rope
//! drifts toward whichever team has tapped more in total.

use std::time::Duration;

use serde_json::json;

use super::{Baseline, round2};
use crate::{
    engine::{EngineContext, EngineSetup, GameOutcome, GameRules},
    state::room::{CENTER, Team},
};

const PLAYING: &str = "playing";
const ROPE_STEP: f64 = 0.5;
const TIME_LIMIT: Duration = Duration::from_secs(60);

/// Team of the `index`-th joiner.
pub fn team_for(index: usize) -> Team {
    if index % 2 == 0 { Team::Red } else { Team::Blue }
}

/// Rules of the tug game. The rope runs 0 (red wins) to 100 (blue wins).
pub struct TugRules {
    roster: Vec<String>,
    baseline: Baseline,
    rope: f64,
}

/// Registry entry.
pub fn factory(setup: &EngineSetup) -> Box<dyn GameRules> {
    Box::new(TugRules {
        roster: setup.roster.clone(),
        baseline: Baseline::default(),
        rope: CENTER,
    })
}

impl TugRules {
    fn members(&self, team: Team) -> Vec<String> {
        self.roster
            .iter()
            .enumerate()
            .filter(|(index, _)| team_for(*index) == team)
            .map(|(_, id)| id.clone())
            .collect()
    }

    fn pull(&self, ctx: &EngineContext<'_>, team: Team) -> u64 {
        self.members(team)
            .iter()
            .filter_map(|id| ctx.player(id).map(|player| (id, player)))
            .map(|(id, player)| u64::from(self.baseline.since(id, player.taps)))
            .sum()
    }
}

impl GameRules for TugRules {
    fn tick_interval(&self) -> Duration {
        Duration::from_millis(100)
    }

    fn start(&mut self, ctx: &mut EngineContext<'_>) {
        self.baseline = Baseline::capture(ctx, &self.roster, |player| player.taps);
        for (index, id) in self.roster.iter().enumerate() {
            ctx.set_player(id, "team", json!(team_for(index)));
        }
        ctx.set_scratch("rope", self.rope);
        ctx.set_phase(PLAYING);
    }

    fn tick(&mut self, ctx: &mut EngineContext<'_>) {
        let red = self.pull(ctx, Team::Red);
        let blue = self.pull(ctx, Team::Blue);
        for (id, player) in ctx.present(&self.roster) {
            ctx.set_player(id, "score", i64::from(self.baseline.since(id, player.taps)));
        }

        if red > blue {
            self.rope = (self.rope - ROPE_STEP).max(0.0);
        } else if blue > red {
            self.rope = (self.rope + ROPE_STEP).min(100.0);
        }
        ctx.set_scratch("rope", round2(self.rope));
        ctx.set_scratch("pull", json!({"red": red, "blue": blue}));

        if self.rope <= 0.0 {
            ctx.finish(GameOutcome::TeamVictory(self.members(Team::Red)));
        } else if self.rope >= 100.0 {
            ctx.finish(GameOutcome::TeamVictory(self.members(Team::Blue)));
        } else if ctx.elapsed() >= TIME_LIMIT {
            let outcome = if self.rope < CENTER {
                GameOutcome::TeamVictory(self.members(Team::Red))
            } else if self.rope > CENTER {
                GameOutcome::TeamVictory(self.members(Team::Blue))
            } else {
                GameOutcome::NoWinner
            };
            ctx.finish(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{player_field, room_with, rng, set_path, setup, step};

    #[test]
    fn teams_alternate_in_join_order() {
        let mut doc = room_with(&["a", "b", "c", "d"]);
        let mut rules = factory(&setup(&["a", "b", "c", "d"]));
        step(&mut doc, 0, &mut rng(), |ctx| rules.start(ctx));

        assert_eq!(player_field(&doc, "a", "team"), "red");
        assert_eq!(player_field(&doc, "b", "team"), "blue");
        assert_eq!(player_field(&doc, "c", "team"), "red");
        assert_eq!(player_field(&doc, "d", "team"), "blue");
    }

    #[test]
    fn stronger_team_drags_the_rope_to_its_end() {
        let mut doc = room_with(&["a", "b", "c"]);
        let mut rng = rng();
        let mut rules = factory(&setup(&["a", "b", "c"]));
        step(&mut doc, 0, &mut rng, |ctx| rules.start(ctx));

        set_path(&mut doc, "players/b/taps", json!(10));
        set_path(&mut doc, "players/a/taps", json!(4));
        set_path(&mut doc, "players/c/taps", json!(5));
        let mut outcome = None;
        for tick in 1..=200 {
            outcome = step(&mut doc, tick * 100, &mut rng, |ctx| rules.tick(ctx));
            if outcome.is_some() {
                break;
            }
        }

        assert_eq!(outcome, Some(GameOutcome::TeamVictory(vec!["b".into()])));
        assert_eq!(doc["scratch"]["rope"], 100.0);
        assert_eq!(player_field(&doc, "a", "score"), 4);
    }

    #[test]
    fn even_pull_at_the_time_limit_has_no_winner() {
        let mut doc = room_with(&["a", "b"]);
        let mut rng = rng();
        let mut rules = factory(&setup(&["a", "b"]));
        step(&mut doc, 0, &mut rng, |ctx| rules.start(ctx));
        let outcome = step(&mut doc, 60_000, &mut rng, |ctx| rules.tick(ctx));
        assert_eq!(outcome, Some(GameOutcome::NoWinner));
    }
}
