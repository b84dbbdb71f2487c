//! Cooperative boss fight.
//!
//! Boss health and team energy live in one in-memory state updated from a
//! single snapshot per step; the published scratch fields are derived from it.

use std::{collections::HashMap, time::Duration};

use serde_json::Value;
use tracing::debug;

use crate::{
    engine::{EngineContext, EngineSetup, GameOutcome, GameRules, SeenEvents},
    state::room::{BossActionEvent, BossMove},
    store::channel::EventChannel,
};

const FIGHTING: &str = "fighting";
const HEALTH_PER_PLAYER: i64 = 40;
const MAX_ENERGY: i64 = 100;
const ATTACK_DAMAGE: i64 = 2;
const HEAL_AMOUNT: i64 = 3;
const BOSS_STRIKE: i64 = 12;
const STRIKE_EVERY: Duration = Duration::from_secs(3);
const TIME_LIMIT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Arena {
    health: i64,
    energy: i64,
}

/// Rules of the boss fight.
pub struct BossRules {
    roster: Vec<String>,
    arena: Arena,
    strikes: u32,
    seen: SeenEvents,
    damage: HashMap<String, i64>,
}

/// Registry entry.
pub fn factory(setup: &EngineSetup) -> Box<dyn GameRules> {
    Box::new(BossRules {
        roster: setup.roster.clone(),
        arena: Arena {
            health: 0,
            energy: MAX_ENERGY,
        },
        strikes: 0,
        seen: SeenEvents::default(),
        damage: HashMap::new(),
    })
}

impl BossRules {
    fn step(&mut self, ctx: &mut EngineContext<'_>) {
        let pending = ctx.pending(EventChannel::BossActions);
        self.seen.retain_pending(pending);
        for (event_id, payload) in pending {
            ctx.consume(EventChannel::BossActions, event_id);
            if !self.seen.first_time(event_id) {
                continue;
            }
            let Ok(event) = serde_json::from_value::<BossActionEvent>(payload.clone()) else {
                debug!(event = %event_id, "dropping malformed boss action");
                continue;
            };
            if !self.roster.contains(&event.player_id) {
                continue;
            }
            match event.action {
                BossMove::Attack => {
                    self.arena.health = (self.arena.health - ATTACK_DAMAGE).max(0);
                    let dealt = self.damage.entry(event.player_id.clone()).or_default();
                    *dealt += ATTACK_DAMAGE;
                    ctx.set_player(&event.player_id, "score", *dealt);
                }
                BossMove::Heal => {
                    self.arena.energy = (self.arena.energy + HEAL_AMOUNT).min(MAX_ENERGY);
                }
            }
        }

        let due = (ctx.elapsed().as_millis() / STRIKE_EVERY.as_millis()) as u32;
        while self.strikes < due {
            self.strikes += 1;
            self.arena.energy = (self.arena.energy - BOSS_STRIKE).max(0);
        }

        let Arena { health, energy } = self.arena;
        ctx.set_scratch("bossHealth", health);
        ctx.set_scratch("teamEnergy", energy);

        if health == 0 {
            ctx.finish(GameOutcome::TeamVictory(self.roster.clone()));
        } else if energy == 0 || ctx.elapsed() >= TIME_LIMIT {
            ctx.finish(GameOutcome::NoWinner);
        }
    }
}

impl GameRules for BossRules {
    fn tick_interval(&self) -> Duration {
        Duration::from_millis(250)
    }

    fn start(&mut self, ctx: &mut EngineContext<'_>) {
        let fighters = ctx.present(&self.roster).len().max(1) as i64;
        self.arena.health = HEALTH_PER_PLAYER * fighters;
        ctx.set_scratch("bossMaxHealth", self.arena.health);
        ctx.set_scratch("bossHealth", self.arena.health);
        ctx.set_scratch("teamEnergy", self.arena.energy);
        ctx.set_scratch("timeLeft", Value::from(TIME_LIMIT.as_secs()));
        ctx.set_phase(FIGHTING);
    }

    fn tick(&mut self, ctx: &mut EngineContext<'_>) {
        let left = TIME_LIMIT.saturating_sub(ctx.elapsed()).as_secs();
        ctx.set_scratch("timeLeft", left);
        self.step(ctx);
    }

    fn observe(&mut self, ctx: &mut EngineContext<'_>) {
        self.step(ctx);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::engine::testing::{player_field, room_with, rng, set_path, setup, step};

    fn action(doc: &mut Value, event_id: &str, player: &str, action: &str) {
        set_path(
            doc,
            &format!("bossActions/{event_id}"),
            json!({"playerId": player, "action": action, "at": 1}),
        );
    }

    #[test]
    fn attacks_are_consumed_once_and_drain_health() {
        let mut doc = room_with(&["ava"]);
        let mut rng = rng();
        let mut rules = factory(&setup(&["ava"]));
        step(&mut doc, 0, &mut rng, |ctx| rules.start(ctx));
        assert_eq!(doc["scratch"]["bossHealth"], 40);

        action(&mut doc, "e1", "ava", "attack");
        action(&mut doc, "e2", "ava", "attack");
        step(&mut doc, 100, &mut rng, |ctx| rules.observe(ctx));
        assert_eq!(doc["scratch"]["bossHealth"], 36);
        assert!(doc.get("bossActions").is_none_or(|pending| pending.as_object().is_none_or(|map| map.is_empty())));
        assert_eq!(player_field(&doc, "ava", "score"), 4);

        // A stale snapshot still holding e1 must not hit twice.
        action(&mut doc, "e1", "ava", "attack");
        step(&mut doc, 150, &mut rng, |ctx| rules.observe(ctx));
        assert_eq!(doc["scratch"]["bossHealth"], 36);
    }

    #[test]
    fn boss_strikes_drain_energy_until_defeat() {
        let mut doc = room_with(&["ava"]);
        let mut rng = rng();
        let mut rules = factory(&setup(&["ava"]));
        step(&mut doc, 0, &mut rng, |ctx| rules.start(ctx));

        assert!(step(&mut doc, 3_000, &mut rng, |ctx| rules.tick(ctx)).is_none());
        assert_eq!(doc["scratch"]["teamEnergy"], 88);

        action(&mut doc, "h1", "ava", "heal");
        step(&mut doc, 3_100, &mut rng, |ctx| rules.observe(ctx));
        assert_eq!(doc["scratch"]["teamEnergy"], 91);

        let outcome = step(&mut doc, 30_000, &mut rng, |ctx| rules.tick(ctx));
        assert_eq!(outcome, Some(GameOutcome::NoWinner));
        assert_eq!(doc["scratch"]["teamEnergy"], 0);
    }

    #[test]
    fn final_blow_wins_even_when_energy_runs_out_in_the_same_step() {
        let mut doc = room_with(&["ava", "bo"]);
        let mut rng = rng();
        let mut rules = factory(&setup(&["ava", "bo"]));
        step(&mut doc, 0, &mut rng, |ctx| rules.start(ctx));

        for index in 0..40 {
            let who = if index % 2 == 0 { "ava" } else { "bo" };
            action(&mut doc, &format!("a{index:02}"), who, "attack");
        }
        let outcome = step(&mut doc, 27_000, &mut rng, |ctx| rules.tick(ctx));

        assert_eq!(
            outcome,
            Some(GameOutcome::TeamVictory(vec!["ava".into(), "bo".into()]))
        );
        assert_eq!(doc["scratch"]["teamEnergy"], 0);
    }

    #[test]
    fn actions_from_outside_the_roster_are_dropped() {
        let mut doc = room_with(&["ava"]);
        let mut rng = rng();
        let mut rules = factory(&setup(&["ava"]));
        step(&mut doc, 0, &mut rng, |ctx| rules.start(ctx));

        action(&mut doc, "x1", "stranger", "attack");
        step(&mut doc, 100, &mut rng, |ctx| rules.observe(ctx));
        assert_eq!(doc["scratch"]["bossHealth"], 40);
    }
}
