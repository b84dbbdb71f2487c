//! Fast-tap: one point per tap inside a fixed window.

use std::time::Duration;

use super::Baseline;
use crate::engine::{EngineContext, EngineSetup, GameOutcome, GameRules};

const PLAY_WINDOW: Duration = Duration::from_secs(10);
const PLAYING: &str = "playing";

/// Rules of the fast-tap game.
pub struct TapRules {
    roster: Vec<String>,
    baseline: Baseline,
}

impl TapRules {
    /// Rules for the players of `setup`.
    pub fn new(setup: &EngineSetup) -> Self {
        Self {
            roster: setup.roster.clone(),
            baseline: Baseline::default(),
        }
    }

    fn scores(&self, ctx: &mut EngineContext<'_>) -> Vec<(String, i64)> {
        let scores: Vec<(String, i64)> = ctx
            .present(&self.roster)
            .into_iter()
            .map(|(id, player)| (id.to_string(), self.baseline.since(id, player.taps) as i64))
            .collect();
        for (id, score) in &scores {
            ctx.set_player(id, "score", *score);
        }
        scores
    }
}

/// Registry entry.
pub fn factory(setup: &EngineSetup) -> Box<dyn GameRules> {
    Box::new(TapRules::new(setup))
}

impl GameRules for TapRules {
    fn tick_interval(&self) -> Duration {
        Duration::from_millis(100)
    }

    fn start(&mut self, ctx: &mut EngineContext<'_>) {
        self.baseline = Baseline::capture(ctx, &self.roster, |player| player.taps);
        ctx.set_phase(PLAYING);
        ctx.set_scratch("endsAt", ctx.now_ms() + PLAY_WINDOW.as_millis() as i64);
    }

    fn tick(&mut self, ctx: &mut EngineContext<'_>) {
        if ctx.elapsed() < PLAY_WINDOW {
            return;
        }
        let scores = self.scores(ctx);
        ctx.finish(GameOutcome::top_scorer(
            scores.iter().map(|(id, score)| (id.as_str(), *score)),
        ));
    }

    fn observe(&mut self, ctx: &mut EngineContext<'_>) {
        self.scores(ctx);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::engine::testing::{player_field, room_with, rng, set_path, setup, step};

    #[test]
    fn taps_become_score_and_window_end_picks_the_leader() {
        let mut doc = room_with(&["ava", "bo"]);
        let mut rng = rng();
        let mut rules = TapRules::new(&setup(&["ava", "bo"]));

        step(&mut doc, 0, &mut rng, |ctx| rules.start(ctx));
        assert_eq!(doc["gamePhase"], "playing");

        set_path(&mut doc, "players/ava/taps", json!(5));
        set_path(&mut doc, "players/bo/taps", json!(3));
        assert!(step(&mut doc, 2_000, &mut rng, |ctx| rules.observe(ctx)).is_none());
        assert_eq!(player_field(&doc, "ava", "score"), 5);
        assert_eq!(player_field(&doc, "bo", "score"), 3);

        assert!(step(&mut doc, 9_900, &mut rng, |ctx| rules.tick(ctx)).is_none());
        let outcome = step(&mut doc, 10_000, &mut rng, |ctx| rules.tick(ctx));
        assert_eq!(outcome, Some(GameOutcome::Winner("ava".into())));
    }

    #[test]
    fn taps_sent_during_the_countdown_do_not_count() {
        let mut doc = room_with(&["ava"]);
        set_path(&mut doc, "players/ava/taps", json!(4));
        let mut rng = rng();
        let mut rules = TapRules::new(&setup(&["ava"]));

        step(&mut doc, 0, &mut rng, |ctx| rules.start(ctx));
        set_path(&mut doc, "players/ava/taps", json!(6));
        step(&mut doc, 100, &mut rng, |ctx| rules.observe(ctx));
        assert_eq!(player_field(&doc, "ava", "score"), 2);
    }

    #[test]
    fn late_joiners_are_not_scored() {
        let mut doc = room_with(&["ava"]);
        let mut rng = rng();
        let mut rules = TapRules::new(&setup(&["ava"]));
        step(&mut doc, 0, &mut rng, |ctx| rules.start(ctx));

        set_path(&mut doc, "players/late", json!({"name": "Late", "joinedAt": 50, "taps": 30}));
        step(&mut doc, 500, &mut rng, |ctx| rules.observe(ctx));
        assert_eq!(player_field(&doc, "late", "score"), &serde_json::Value::Null);

        let outcome = step(&mut doc, 10_000, &mut rng, |ctx| rules.tick(ctx));
        assert_eq!(outcome, Some(GameOutcome::NoWinner));
    }
}
