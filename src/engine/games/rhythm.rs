//! Rhythm: tap on the beat. Hits arrive on the `rhythmHits` channel and are
//! judged against the nearest scheduled beat, once per player per beat.

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use serde_json::json;
use tracing::debug;

use crate::{
    engine::{EngineContext, EngineSetup, GameOutcome, GameRules, SeenEvents},
    state::room::RhythmHitEvent,
    store::channel::EventChannel,
};

const PLAYING: &str = "playing";
const BEATS: i64 = 24;
const BEAT_MS: i64 = 800;
const PERFECT_MS: i64 = 120;
const GOOD_MS: i64 = 250;

/// Points for a hit `offset_ms` away from its beat.
pub fn grade(offset_ms: i64) -> i64 {
    match offset_ms.abs() {
        offset if offset <= PERFECT_MS => 3,
        offset if offset <= GOOD_MS => 1,
        _ => 0,
    }
}

/// Rules of the rhythm game.
pub struct RhythmRules {
    roster: Vec<String>,
    first_beat_ms: i64,
    judged: HashSet<(String, i64)>,
    seen: SeenEvents,
    points: HashMap<String, i64>,
}

/// Registry entry.
pub fn factory(setup: &EngineSetup) -> Box<dyn GameRules> {
    Box::new(RhythmRules {
        roster: setup.roster.clone(),
        first_beat_ms: 0,
        judged: HashSet::new(),
        seen: SeenEvents::default(),
        points: HashMap::new(),
    })
}

impl RhythmRules {
    fn beat_at(&self, index: i64) -> i64 {
        self.first_beat_ms + index * BEAT_MS
    }

    /// Beat closest to `at_ms`, if within the schedule.
    fn nearest_beat(&self, at_ms: i64) -> Option<i64> {
        // `at_ms` is device-written; anything off the schedule is dropped.
        let relative = at_ms.saturating_sub(self.first_beat_ms);
        let index = relative.checked_add(BEAT_MS / 2)?.div_euclid(BEAT_MS);
        (0..BEATS).contains(&index).then_some(index)
    }

    fn judge_hits(&mut self, ctx: &mut EngineContext<'_>) {
        let pending = ctx.pending(EventChannel::RhythmHits);
        self.seen.retain_pending(pending);
        for (event_id, payload) in pending {
            ctx.consume(EventChannel::RhythmHits, event_id);
            if !self.seen.first_time(event_id) {
                continue;
            }
            let Ok(hit) = serde_json::from_value::<RhythmHitEvent>(payload.clone()) else {
                debug!(event = %event_id, "dropping malformed rhythm hit");
                continue;
            };
            if !self.roster.contains(&hit.player_id) {
                continue;
            }
            let Some(beat) = self.nearest_beat(hit.at) else {
                continue;
            };
            if !self.judged.insert((hit.player_id.clone(), beat)) {
                continue;
            }
            let points = grade(hit.at - self.beat_at(beat));
            if points > 0 {
                let total = self.points.entry(hit.player_id.clone()).or_default();
                *total += points;
                ctx.set_player(&hit.player_id, "score", *total);
            }
        }
    }
}

impl GameRules for RhythmRules {
    fn tick_interval(&self) -> Duration {
        Duration::from_millis(50)
    }

    fn start(&mut self, ctx: &mut EngineContext<'_>) {
        self.first_beat_ms = ctx.now_ms() + BEAT_MS;
        ctx.set_scratch(
            "beats",
            json!({"firstAt": self.first_beat_ms, "interval": BEAT_MS, "count": BEATS}),
        );
        ctx.set_phase(PLAYING);
    }

    fn tick(&mut self, ctx: &mut EngineContext<'_>) {
        self.judge_hits(ctx);
        let now = ctx.now_ms();
        let current = ((now - self.first_beat_ms) / BEAT_MS).clamp(-1, BEATS - 1);
        ctx.set_scratch("beatIndex", current);

        if now > self.beat_at(BEATS - 1) + GOOD_MS {
            let scores = self
                .roster
                .iter()
                .map(|id| (id.as_str(), self.points.get(id).copied().unwrap_or(0)));
            ctx.finish(GameOutcome::top_scorer(scores));
        }
    }

    fn observe(&mut self, ctx: &mut EngineContext<'_>) {
        self.judge_hits(ctx);
    }
}
