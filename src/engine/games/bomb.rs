//! Hot potato: the holder taps to throw the bomb to someone else before the
//! hidden fuse runs out. Whoever holds it at expiry is out.

use std::{collections::HashMap, time::Duration};

use rand::{Rng, seq::IndexedRandom};
use serde_json::json;

use crate::{
    engine::{EngineContext, EngineSetup, GameOutcome, GameRules},
    state::room::LifeStatus,
};

const PLAYING: &str = "playing";
const MIN_FUSE_MS: u64 = 8_000;
const MAX_FUSE_MS: u64 = 15_000;

/// Rules of the hot potato game.
pub struct BombRules {
    roster: Vec<String>,
    alive: Vec<String>,
    holder: Option<String>,
    fuse_ends: Duration,
    taps: HashMap<String, u32>,
}

/// Registry entry.
pub fn factory(setup: &EngineSetup) -> Box<dyn GameRules> {
    Box::new(BombRules {
        roster: setup.roster.clone(),
        alive: Vec::new(),
        holder: None,
        fuse_ends: Duration::ZERO,
        taps: HashMap::new(),
    })
}

impl BombRules {
    fn hand_to(&mut self, ctx: &mut EngineContext<'_>, holder: Option<String>) {
        match &holder {
            Some(id) => ctx.set_scratch("bombHolderId", id.as_str()),
            None => ctx.set_scratch("bombHolderId", serde_json::Value::Null),
        }
        self.holder = holder;
    }

    fn light_fuse(&mut self, ctx: &mut EngineContext<'_>) {
        let fuse = ctx.rng().random_range(MIN_FUSE_MS..=MAX_FUSE_MS);
        self.fuse_ends = ctx.elapsed() + Duration::from_millis(fuse);
    }

    fn random_other(&self, ctx: &mut EngineContext<'_>, current: &str) -> Option<String> {
        let others: Vec<&String> = self.alive.iter().filter(|id| *id != current).collect();
        others.choose(ctx.rng()).map(|id| (*id).clone())
    }

    fn sample_taps(&mut self, ctx: &EngineContext<'_>) -> Vec<String> {
        let mut tapped = Vec::new();
        for (id, player) in ctx.present(&self.roster) {
            let previous = self.taps.insert(id.to_string(), player.taps).unwrap_or(0);
            if player.taps > previous {
                tapped.push(id.to_string());
            }
        }
        tapped
    }

    fn check_end(&self, ctx: &mut EngineContext<'_>) {
        let contested = self.roster.len() > 1;
        if self.alive.is_empty() || (contested && self.alive.len() == 1) {
            ctx.finish(GameOutcome::survivors(self.alive.clone()));
        }
    }
}

impl GameRules for BombRules {
    fn tick_interval(&self) -> Duration {
        Duration::from_millis(100)
    }

    fn start(&mut self, ctx: &mut EngineContext<'_>) {
        self.alive = ctx
            .present(&self.roster)
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        self.sample_taps(ctx);
        for id in &self.alive {
            ctx.set_player(id, "status", json!(LifeStatus::Alive));
        }
        let first = self.alive.choose(ctx.rng()).cloned();
        self.hand_to(ctx, first);
        self.light_fuse(ctx);
        ctx.set_phase(PLAYING);
        self.check_end(ctx);
    }

    fn tick(&mut self, ctx: &mut EngineContext<'_>) {
        if ctx.elapsed() < self.fuse_ends {
            return;
        }
        if let Some(victim) = self.holder.take() {
            self.alive.retain(|id| *id != victim);
            ctx.set_player(&victim, "status", json!(LifeStatus::Dead));
            ctx.set_player(&victim, "eliminated", true);
            for id in &self.alive {
                let survived = ctx.player(id).map_or(0, |player| player.score) + 1;
                ctx.set_player(id, "score", survived);
            }
        }

        let next = self.alive.choose(ctx.rng()).cloned();
        self.hand_to(ctx, next);
        self.light_fuse(ctx);
        self.check_end(ctx);
    }

    fn observe(&mut self, ctx: &mut EngineContext<'_>) {
        let tapped = self.sample_taps(ctx);
        let Some(holder) = self.holder.clone() else {
            return;
        };
        if tapped.contains(&holder) {
            if let Some(target) = self.random_other(ctx, &holder) {
                self.hand_to(ctx, Some(target));
            }
        }
    }
}
