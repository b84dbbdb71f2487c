//! Reaction time: wait for the signal, then tap first.
//!
//! Clicks are judged against the open time this engine recorded, never
//! against `gamePhase`, since the phase write itself takes time to reach
//! devices. A click after the active phase began but before the signal is a
//! false start and disqualifies the player.

use std::{collections::BTreeMap, time::Duration};

use rand::Rng;
use serde_json::{Map, Value};

use crate::engine::{EngineContext, EngineSetup, GameOutcome, GameRules};

const MIN_DELAY_MS: u64 = 2_000;
const MAX_DELAY_MS: u64 = 5_000;
const TAP_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting { opens_after: Duration },
    Open { at_ms: i64, since: Duration },
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Waiting { .. } => "waiting",
            Phase::Open { .. } => "go",
        }
    }
}

/// Rules of the reaction-time game.
pub struct ReactionRules {
    roster: Vec<String>,
    phase: Phase,
    started_ms: i64,
    times: BTreeMap<String, i64>,
    false_starts: Vec<String>,
}

/// Registry entry.
pub fn factory(setup: &EngineSetup) -> Box<dyn GameRules> {
    Box::new(ReactionRules {
        roster: setup.roster.clone(),
        phase: Phase::Waiting {
            opens_after: Duration::ZERO,
        },
        started_ms: 0,
        times: BTreeMap::new(),
        false_starts: Vec::new(),
    })
}

impl ReactionRules {
    fn judge_clicks(&mut self, ctx: &mut EngineContext<'_>) {
        for (id, player) in ctx.present(&self.roster) {
            let Some(click) = player.last_click else {
                continue;
            };
            if click < self.started_ms
                || self.times.contains_key(id)
                || self.false_starts.iter().any(|other| other == id)
            {
                continue;
            }

            match self.phase {
                Phase::Open { at_ms, .. } if click >= at_ms => {
                    let reaction = click - at_ms;
                    self.times.insert(id.to_string(), reaction);
                    ctx.set_player(id, "score", reaction);
                }
                _ => {
                    self.false_starts.push(id.to_string());
                    ctx.set_player(id, "eliminated", true);
                }
            }
        }

        let published: Map<String, Value> = self
            .times
            .iter()
            .map(|(id, ms)| (id.clone(), Value::from(*ms)))
            .collect();
        if !published.is_empty() {
            ctx.set_scratch("reactionTimes", published);
        }
    }

    fn ranking(&self) -> GameOutcome {
        self.roster
            .iter()
            .filter_map(|id| self.times.get(id).map(|ms| (id, *ms)))
            .min_by_key(|(_, ms)| *ms)
            .map(|(id, _)| GameOutcome::Winner(id.clone()))
            .unwrap_or(GameOutcome::NoWinner)
    }

    fn everyone_done(&self, ctx: &EngineContext<'_>) -> bool {
        ctx.present(&self.roster).into_iter().all(|(id, _)| {
            self.times.contains_key(id) || self.false_starts.iter().any(|other| other == id)
        })
    }
}

impl GameRules for ReactionRules {
    fn tick_interval(&self) -> Duration {
        Duration::from_millis(50)
    }

    fn start(&mut self, ctx: &mut EngineContext<'_>) {
        self.started_ms = ctx.now_ms();
        let delay = ctx.rng().random_range(MIN_DELAY_MS..=MAX_DELAY_MS);
        self.phase = Phase::Waiting {
            opens_after: Duration::from_millis(delay),
        };
        ctx.set_phase(self.phase.as_str());
    }

    fn tick(&mut self, ctx: &mut EngineContext<'_>) {
        match self.phase {
            Phase::Waiting { opens_after } if ctx.elapsed() >= opens_after => {
                self.judge_clicks(ctx);
                self.phase = Phase::Open {
                    at_ms: ctx.now_ms(),
                    since: ctx.elapsed(),
                };
                ctx.set_phase(self.phase.as_str());
                ctx.set_scratch("openedAt", ctx.now_ms());
            }
            Phase::Waiting { .. } => {}
            Phase::Open { since, .. } => {
                self.judge_clicks(ctx);
                if ctx.elapsed() >= since + TAP_WINDOW || self.everyone_done(ctx) {
                    ctx.finish(self.ranking());
                }
            }
        }
    }

    fn observe(&mut self, ctx: &mut EngineContext<'_>) {
        self.judge_clicks(ctx);
        if matches!(self.phase, Phase::Open { .. }) && self.everyone_done(ctx) {
            ctx.finish(self.ranking());
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::engine::testing::{player_field, room_with, rng, set_path, setup, step};

    fn open(doc: &mut Value, rules: &mut Box<dyn GameRules>) -> i64 {
        let mut rng = rng();
        step(doc, 0, &mut rng, |ctx| rules.start(ctx));
        assert_eq!(doc["gamePhase"], "waiting");
        step(doc, 5_000, &mut rng, |ctx| rules.tick(ctx));
        assert_eq!(doc["gamePhase"], "go");
        doc["scratch"]["openedAt"].as_i64().unwrap()
    }

    #[test]
    fn fastest_click_after_the_signal_wins() {
        let mut doc = room_with(&["ava", "bo"]);
        let mut rules = factory(&setup(&["ava", "bo"]));
        let opened = open(&mut doc, &mut rules);

        set_path(&mut doc, "players/bo/lastClick", json!(opened + 180));
        set_path(&mut doc, "players/ava/lastClick", json!(opened + 240));
        let outcome = step(&mut doc, 5_300, &mut rng(), |ctx| rules.observe(ctx));

        assert_eq!(outcome, Some(GameOutcome::Winner("bo".into())));
        assert_eq!(player_field(&doc, "bo", "score"), 180);
    }

    #[test]
    fn click_before_the_recorded_open_time_is_a_false_start() {
        let mut doc = room_with(&["ava", "bo"]);
        let mut rules = factory(&setup(&["ava", "bo"]));
        let mut rng = rng();
        step(&mut doc, 0, &mut rng, |ctx| rules.start(ctx));

        set_path(&mut doc, "players/ava/lastClick", json!(1_500));
        step(&mut doc, 500, &mut rng, |ctx| rules.observe(ctx));
        assert_eq!(player_field(&doc, "ava", "eliminated"), true);

        step(&mut doc, 5_000, &mut rng, |ctx| rules.tick(ctx));
        let opened = doc["scratch"]["openedAt"].as_i64().unwrap();
        set_path(&mut doc, "players/ava/lastClick", json!(opened + 10));
        set_path(&mut doc, "players/bo/lastClick", json!(opened + 400));
        let outcome = step(&mut doc, 5_500, &mut rng, |ctx| rules.observe(ctx));
        assert_eq!(outcome, Some(GameOutcome::Winner("bo".into())));
    }

    #[test]
    fn nobody_clicking_ends_without_winner() {
        let mut doc = room_with(&["ava"]);
        let mut rules = factory(&setup(&["ava"]));
        open(&mut doc, &mut rules);
        let outcome = step(&mut doc, 8_000, &mut rng(), |ctx| rules.tick(ctx));
        assert_eq!(outcome, Some(GameOutcome::NoWinner));
    }
}
