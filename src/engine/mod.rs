//! Game engines: the common contract every minigame implements, the scoped
//! task that drives one engine, and the dispatcher that keeps at most one
//! engine mounted per room.

pub mod dispatcher;
pub mod games;
mod runner;

use std::{collections::HashSet, time::Duration};

use rand::rngs::StdRng;
use serde_json::{Map, Value, json};

use crate::{
    state::room::{Player, Room},
    store::{channel::EventChannel, paths, value_at},
};

pub use self::{
    dispatcher::{Dispatcher, EngineReport, GameRegistry, MountKey},
    runner::{EngineHandle, EngineOptions, TerminationCallback, spawn_engine},
};

/// Phase written by the host when a game starts, before the engine mounts.
pub const STARTING_PHASE: &str = "starting";
/// Phase published while the runner counts down.
pub const COUNTDOWN_PHASE: &str = "countdown";
/// Phase written by the host once the engine reported its result.
pub const FINISHED_PHASE: &str = "finished";

/// Result handed to the termination callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOutcome {
    /// A single principal won.
    Winner(String),
    /// A group won together (team games, cooperative wins, shared survival).
    TeamVictory(Vec<String>),
    /// Nobody won.
    NoWinner,
}

impl GameOutcome {
    /// Pick the highest score; ties go to the entry listed first, a top score
    /// of zero (or less) means nobody won.
    pub fn top_scorer<'p>(entries: impl IntoIterator<Item = (&'p str, i64)>) -> Self {
        let mut best: Option<(&str, i64)> = None;
        for (id, score) in entries {
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((id, score));
            }
        }
        match best {
            Some((id, score)) if score > 0 => GameOutcome::Winner(id.to_string()),
            _ => GameOutcome::NoWinner,
        }
    }

    /// Outcome for a set of survivors: one is a winner, several win together.
    pub fn survivors(mut ids: Vec<String>) -> Self {
        match ids.len() {
            0 => GameOutcome::NoWinner,
            1 => GameOutcome::Winner(ids.remove(0)),
            _ => GameOutcome::TeamVictory(ids),
        }
    }

    /// Every principal credited with the win.
    pub fn winners(&self) -> Vec<&str> {
        match self {
            GameOutcome::Winner(id) => vec![id.as_str()],
            GameOutcome::TeamVictory(ids) => ids.iter().map(String::as_str).collect(),
            GameOutcome::NoWinner => Vec::new(),
        }
    }

    /// Short tag of the outcome: `winner`, `team` or `none`.
    pub fn kind(&self) -> &'static str {
        match self {
            GameOutcome::Winner(_) => "winner",
            GameOutcome::TeamVictory(_) => "team",
            GameOutcome::NoWinner => "none",
        }
    }

    /// Document written under `scratch/result` once the game ends.
    pub fn to_record(&self) -> Value {
        json!({"kind": self.kind(), "winners": self.winners()})
    }
}

/// Construction inputs of an engine.
#[derive(Debug, Clone)]
pub struct EngineSetup {
    /// Room code.
    pub code: String,
    /// Participants at mount time, in join order.
    pub roster: Vec<String>,
}

/// Rules of one minigame.
///
/// The runner owns the countdown; afterwards it calls [`GameRules::start`]
/// once, [`GameRules::tick`] on every interval and [`GameRules::observe`]
/// whenever the room document changes. Every call gets a fresh, consistent
/// snapshot and its writes land in one atomic update.
pub trait GameRules: Send + Sync + 'static {
    /// Period of [`GameRules::tick`].
    fn tick_interval(&self) -> Duration;

    /// Enter the active phase.
    fn start(&mut self, ctx: &mut EngineContext<'_>);

    /// Advance clocks and physics.
    fn tick(&mut self, ctx: &mut EngineContext<'_>);

    /// React to player-submitted fields. Defaults to nothing; games that only
    /// sample on ticks leave it alone.
    fn observe(&mut self, _ctx: &mut EngineContext<'_>) {}
}

/// View handed to [`GameRules`] for one step.
pub struct EngineContext<'a> {
    snapshot: &'a Value,
    room: &'a Room,
    elapsed: Duration,
    now_ms: i64,
    rng: &'a mut StdRng,
    writes: Map<String, Value>,
    outcome: Option<GameOutcome>,
}

impl<'a> EngineContext<'a> {
    /// Build a context over a decoded room and the raw document it came from.
    pub fn new(
        snapshot: &'a Value,
        room: &'a Room,
        elapsed: Duration,
        now_ms: i64,
        rng: &'a mut StdRng,
    ) -> Self {
        Self {
            snapshot,
            room,
            elapsed,
            now_ms,
            rng,
            writes: Map::new(),
            outcome: None,
        }
    }

    /// Current room document.
    pub fn room(&self) -> &'a Room {
        self.room
    }

    /// Player entry, if still present.
    pub fn player(&self, id: &str) -> Option<&'a Player> {
        self.room.players.get(id)
    }

    /// `ids` that are still present, in the given order.
    pub fn present<'r>(&self, ids: &'r [String]) -> Vec<(&'r str, &'a Player)> {
        ids.iter()
            .filter_map(|id| self.player(id).map(|player| (id.as_str(), player)))
            .collect()
    }

    /// Time since the active phase began.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Wall clock in epoch milliseconds.
    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    /// Engine-owned random source.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut *self.rng
    }

    /// Queue a write at `path`, relative to the room. Values already present
    /// in the snapshot are skipped so observe/write cycles settle.
    pub fn write(&mut self, path: impl Into<String>, value: impl Into<Value>) {
        let path = path.into();
        let value = value.into();
        let unchanged = match value_at(self.snapshot, &path) {
            Some(current) => *current == value,
            None => value.is_null(),
        };
        if unchanged {
            self.writes.remove(&path);
        } else {
            self.writes.insert(path, value);
        }
    }

    /// Publish the engine's phase name.
    pub fn set_phase(&mut self, phase: &str) {
        self.write("gamePhase", phase);
    }

    /// Write a scratch field.
    pub fn set_scratch(&mut self, key: &str, value: impl Into<Value>) {
        self.write(paths::scratch_field(key), value);
    }

    /// Write a derived player field.
    pub fn set_player(&mut self, id: &str, field: &str, value: impl Into<Value>) {
        self.write(paths::player_field(id, field), value);
    }

    /// Pending events of a one-shot channel.
    pub fn pending(&self, channel: EventChannel) -> &'a Map<String, Value> {
        match channel {
            EventChannel::Reactions => &self.room.reactions,
            EventChannel::BossActions => &self.room.boss_actions,
            EventChannel::RhythmHits => &self.room.rhythm_hits,
        }
    }

    /// Delete a processed event.
    pub fn consume(&mut self, channel: EventChannel, event_id: &str) {
        self.write(channel.entry(event_id), Value::Null);
    }

    /// Decide the game. Only the first decision counts.
    pub fn finish(&mut self, outcome: GameOutcome) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
    }

    /// Whether a decision was taken during this step.
    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Queued writes and the decision, if any.
    pub fn into_parts(self) -> (Map<String, Value>, Option<GameOutcome>) {
        (self.writes, self.outcome)
    }
}

/// Event ids handled by an engine that may still be visible in a coalesced
/// snapshot. Ids that left the channel are forgotten.
#[derive(Debug, Default)]
pub struct SeenEvents {
    ids: HashSet<String>,
}

impl SeenEvents {
    /// Record `event_id`; false when it was already handled.
    pub fn first_time(&mut self, event_id: &str) -> bool {
        self.ids.insert(event_id.to_string())
    }

    /// Drop ids no longer pending.
    pub fn retain_pending(&mut self, pending: &Map<String, Value>) {
        self.ids.retain(|id| pending.contains_key(id));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers shared by engine unit tests.

    use rand::SeedableRng;
    use serde_json::{Value, json};

    use super::*;

    /// Room document with `players` (id, name) joined in order.
    pub(crate) fn room_with(players: &[&str]) -> Value {
        let mut entries = Map::new();
        for (index, id) in players.iter().enumerate() {
            entries.insert(
                id.to_string(),
                json!({"name": id, "color": "#ef4444", "joinedAt": index as i64 + 1, "score": 0}),
            );
        }
        json!({
            "host": "host",
            "status": "playing",
            "gameType": "tap",
            "gamePhase": "starting",
            "createdAt": 0,
            "startedAt": 100,
            "players": entries,
        })
    }

    pub(crate) fn setup(players: &[&str]) -> EngineSetup {
        EngineSetup {
            code: "ABCD".into(),
            roster: players.iter().map(|id| id.to_string()).collect(),
        }
    }

    pub(crate) fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    /// Run one step against `doc`, apply its writes and return the decision.
    pub(crate) fn step(
        doc: &mut Value,
        elapsed_ms: u64,
        rng: &mut StdRng,
        call: impl FnOnce(&mut EngineContext<'_>),
    ) -> Option<GameOutcome> {
        let snapshot = doc.clone();
        let room = Room::from_snapshot(Some(&snapshot)).expect("room decodes");
        let mut ctx = EngineContext::new(
            &snapshot,
            &room,
            Duration::from_millis(elapsed_ms),
            1_000 + elapsed_ms as i64,
            rng,
        );
        call(&mut ctx);
        let (writes, outcome) = ctx.into_parts();
        for (path, value) in writes {
            set_path(doc, &path, value);
        }
        outcome
    }

    /// Write `value` at a slash path of `doc`, null deleting.
    pub(crate) fn set_path(doc: &mut Value, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('/').collect();
        let (last, parents) = segments.split_last().expect("non-empty path");
        let mut node = doc;
        for segment in parents {
            node = node
                .as_object_mut()
                .expect("object")
                .entry(segment.to_string())
                .or_insert_with(|| json!({}));
        }
        let map = node.as_object_mut().expect("object");
        if value.is_null() {
            map.remove(*last);
        } else {
            map.insert(last.to_string(), value);
        }
    }

    pub(crate) fn player_field<'v>(doc: &'v Value, id: &str, field: &str) -> &'v Value {
        &doc["players"][id][field]
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use serde_json::json;

    use super::*;

    #[test]
    fn top_scorer_breaks_ties_by_listing_order() {
        let outcome = GameOutcome::top_scorer([("ava", 4), ("bo", 7), ("cy", 7)]);
        assert_eq!(outcome, GameOutcome::Winner("bo".into()));
    }

    #[test]
    fn zero_top_score_means_no_winner() {
        assert_eq!(
            GameOutcome::top_scorer([("ava", 0), ("bo", 0)]),
            GameOutcome::NoWinner
        );
        assert_eq!(GameOutcome::top_scorer([]), GameOutcome::NoWinner);
    }

    #[test]
    fn result_record_lists_winners() {
        let record = GameOutcome::TeamVictory(vec!["a".into(), "b".into()]).to_record();
        assert_eq!(record, json!({"kind": "team", "winners": ["a", "b"]}));
        assert_eq!(
            GameOutcome::NoWinner.to_record(),
            json!({"kind": "none", "winners": []})
        );
    }

    #[test]
    fn unchanged_writes_are_dropped_and_first_decision_sticks() {
        let snapshot = json!({"gamePhase": "playing", "players": {"p1": {"score": 3}}});
        let room = Room::from_snapshot(Some(&snapshot)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = EngineContext::new(&snapshot, &room, Duration::ZERO, 0, &mut rng);

        ctx.set_phase("playing");
        ctx.set_player("p1", "score", 3);
        ctx.set_player("p1", "score", 4);
        ctx.set_scratch("missing", Value::Null);
        ctx.finish(GameOutcome::Winner("p1".into()));
        ctx.finish(GameOutcome::NoWinner);

        let (writes, outcome) = ctx.into_parts();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes["players/p1/score"], json!(4));
        assert_eq!(outcome, Some(GameOutcome::Winner("p1".into())));
    }

    #[test]
    fn rewriting_the_current_value_cancels_a_queued_change() {
        let snapshot = json!({"scratch": {"rope": 50.0}});
        let room = Room::from_snapshot(Some(&snapshot)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = EngineContext::new(&snapshot, &room, Duration::ZERO, 0, &mut rng);

        ctx.set_scratch("rope", 51.0);
        ctx.set_scratch("rope", 50.0);
        assert!(ctx.into_parts().0.is_empty());
    }

    #[test]
    fn seen_events_forget_consumed_ids() {
        let mut seen = SeenEvents::default();
        assert!(seen.first_time("e1"));
        assert!(!seen.first_time("e1"));

        seen.retain_pending(&Map::new());
        assert!(seen.first_time("e1"));
    }
}
