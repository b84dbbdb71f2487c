//! Shake to climb: every accepted shake lifts the climber two percent.

use std::time::Duration;

use super::Baseline;
use crate::engine::{EngineContext, EngineSetup, GameOutcome, GameRules};

const CLIMBING: &str = "climbing";
const CLIMB_PER_SHAKE: f64 = 2.0;
const SUMMIT: f64 = 100.0;
const TIME_LIMIT: Duration = Duration::from_secs(45);

/// Height reached after `shakes` accepted shakes.
pub fn climb_height(shakes: u32) -> f64 {
    (f64::from(shakes) * CLIMB_PER_SHAKE).min(SUMMIT)
}

/// Rules of the climbing race.
pub struct ClimbRules {
    roster: Vec<String>,
    baseline: Baseline,
}

/// Registry entry.
pub fn factory(setup: &EngineSetup) -> Box<dyn GameRules> {
    Box::new(ClimbRules {
        roster: setup.roster.clone(),
        baseline: Baseline::default(),
    })
}

impl ClimbRules {
    fn heights(&self, ctx: &mut EngineContext<'_>) -> Vec<(String, f64)> {
        let heights: Vec<(String, f64)> = ctx
            .present(&self.roster)
            .into_iter()
            .map(|(id, player)| {
                let shakes = self.baseline.since(id, player.shake_count);
                (id.to_string(), climb_height(shakes))
            })
            .collect();
        for (id, height) in &heights {
            ctx.set_player(id, "climbPos", *height);
            ctx.set_player(id, "score", *height as i64);
        }
        heights
    }
}

impl GameRules for ClimbRules {
    fn tick_interval(&self) -> Duration {
        Duration::from_millis(200)
    }

    fn start(&mut self, ctx: &mut EngineContext<'_>) {
        self.baseline = Baseline::capture(ctx, &self.roster, |player| player.shake_count);
        for id in &self.roster {
            ctx.set_player(id, "climbPos", 0.0);
        }
        ctx.set_phase(CLIMBING);
    }

    fn tick(&mut self, ctx: &mut EngineContext<'_>) {
        let heights = self.heights(ctx);
        if ctx.elapsed() >= TIME_LIMIT {
            ctx.finish(GameOutcome::top_scorer(
                heights.iter().map(|(id, height)| (id.as_str(), *height as i64)),
            ));
        }
    }

    fn observe(&mut self, ctx: &mut EngineContext<'_>) {
        let heights = self.heights(ctx);
        if let Some((id, _)) = heights.iter().find(|(_, height)| *height >= SUMMIT) {
            ctx.finish(GameOutcome::Winner(id.clone()));
        }
    }
}
