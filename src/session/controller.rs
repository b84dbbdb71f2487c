//! Host-side room lifecycle: creation, game selection, start, result and
//! return to the lobby. Every lifecycle write goes through the room state
//! machine so a write that fails or times out leaves the phase untouched.

use std::{sync::Arc, time::Duration};

use serde_json::{Map, Value, json};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::room_code;
use crate::{
    agent::resume::{ResumeCache, ResumeState, ViewMode},
    clock::Clock,
    config::AppConfig,
    engine::{FINISHED_PHASE, GameOutcome, GameRegistry, STARTING_PHASE},
    error::ServiceError,
    identity::PrincipalId,
    state::{
        game_kind::GameKind,
        room::{Room, RoomStatus, TRANSIENT_PLAYER_FIELDS},
        state_machine::{GameProgress, Plan, RoomEvent, RoomPhase, RoomStateMachine},
    },
    store::{SharedStore, channel::EventChannel, paths, to_value},
};

/// Lifecycle owner of one room, held by its host.
pub struct SessionController {
    store: Arc<dyn SharedStore>,
    registry: Arc<GameRegistry>,
    clock: Clock,
    code: String,
    host: PrincipalId,
    selected: Option<GameKind>,
    machine: RoomStateMachine,
    transition_timeout: Duration,
}

impl SessionController {
    /// Create a room under a fresh code. Codes already in use are skipped,
    /// giving up after the configured number of attempts.
    pub async fn create_room(
        store: Arc<dyn SharedStore>,
        registry: Arc<GameRegistry>,
        config: &AppConfig,
        clock: Clock,
        host: PrincipalId,
    ) -> Result<Self, ServiceError> {
        for attempt in 1..=config.room_code_attempts() {
            let code = room_code::generate(&mut rand::rng());
            if store.get(&paths::room(&code)).await?.is_some() {
                debug!(attempt, room = %code, "room code already taken");
                continue;
            }
            return Self::open(store, registry, config, clock, host, code).await;
        }

        warn!(
            attempts = config.room_code_attempts(),
            "no free room code found"
        );
        Err(ServiceError::InvalidState(
            "could not allocate a room code".into(),
        ))
    }

    /// Create a room under a caller-chosen code.
    pub async fn create_room_with_code(
        store: Arc<dyn SharedStore>,
        registry: Arc<GameRegistry>,
        config: &AppConfig,
        clock: Clock,
        host: PrincipalId,
        code: &str,
    ) -> Result<Self, ServiceError> {
        let code = room_code::normalize(code)
            .ok_or_else(|| ServiceError::InvalidInput(format!("`{code}` is not a room code")))?;
        if store.get(&paths::room(&code)).await?.is_some() {
            return Err(ServiceError::InvalidState(format!(
                "room {code} already exists"
            )));
        }
        Self::open(store, registry, config, clock, host, code).await
    }

    /// Take control of an existing room again, e.g. after the host display
    /// reloaded. Only the principal that created the room may resume it.
    pub async fn resume(
        store: Arc<dyn SharedStore>,
        registry: Arc<GameRegistry>,
        config: &AppConfig,
        clock: Clock,
        host: PrincipalId,
        code: &str,
    ) -> Result<Self, ServiceError> {
        let code = room_code::normalize(code)
            .ok_or_else(|| ServiceError::InvalidInput(format!("`{code}` is not a room code")))?;
        let snapshot = store.get(&paths::room(&code)).await?;
        let room = Room::from_snapshot(snapshot.as_ref())
            .ok_or_else(|| ServiceError::NotFound(format!("room {code}")))?;
        if room.host != host {
            return Err(ServiceError::Unauthorized(format!(
                "room {code} belongs to another host"
            )));
        }

        let selected = room.game_type.parse().ok();
        info!(room = %code, host = %host, "host resumed room");
        Ok(Self {
            store,
            registry,
            clock,
            code,
            host,
            selected,
            machine: RoomStateMachine::at(phase_of(&room)),
            transition_timeout: config.transition_timeout(),
        })
    }

    /// Resume the room this display hosted before a restart, as recorded by
    /// [`SessionController::remember_in`]. Returns `None` when the cache holds
    /// no host view. A room that is gone or now refuses us clears the cache.
    pub async fn resume_cached(
        store: Arc<dyn SharedStore>,
        registry: Arc<GameRegistry>,
        config: &AppConfig,
        clock: Clock,
        cache: &ResumeCache,
    ) -> Result<Option<Self>, ServiceError> {
        let state = cache.load();
        let Some((code, host)) = state.target(ViewMode::Host) else {
            return Ok(None);
        };

        match Self::resume(store, registry, config, clock, host.to_string(), code).await {
            Ok(controller) => Ok(Some(controller)),
            Err(err) => {
                if let Err(clear) = cache.clear() {
                    warn!(error = %clear, "failed to clear resume cache");
                }
                Err(err)
            }
        }
    }

    /// Record this room as the display's current view.
    pub fn remember_in(&self, cache: &ResumeCache) {
        let state = ResumeState::in_room(ViewMode::Host, &self.code, &self.host);
        if let Err(err) = cache.save(&state) {
            warn!(room = %self.code, error = %err, "failed to save resume cache");
        }
    }

    async fn open(
        store: Arc<dyn SharedStore>,
        registry: Arc<GameRegistry>,
        config: &AppConfig,
        clock: Clock,
        host: PrincipalId,
        code: String,
    ) -> Result<Self, ServiceError> {
        let room = Room::new_lobby(host.clone(), clock.now_ms());
        store.set(&paths::room(&code), to_value(&room)?).await?;
        info!(room = %code, host = %host, "room created");

        Ok(Self {
            store,
            registry,
            clock,
            code,
            host,
            selected: None,
            machine: RoomStateMachine::new(),
            transition_timeout: config.transition_timeout(),
        })
    }

    /// Code of the controlled room.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Principal that owns the room.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Game picked for the next start.
    pub fn selected(&self) -> Option<GameKind> {
        self.selected
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> RoomPhase {
        self.machine.phase()
    }

    /// Pick the game to start next. Purely local until [`Self::start_game`].
    pub fn select_game(&mut self, tag: &str) -> Result<GameKind, ServiceError> {
        let kind: GameKind = tag
            .parse()
            .map_err(|_| ServiceError::InvalidInput(format!("unknown game `{tag}`")))?;
        if !self.registry.contains(kind) {
            return Err(ServiceError::InvalidInput(format!(
                "game `{tag}` is not available"
            )));
        }
        self.selected = Some(kind);
        debug!(room = %self.code, game = %kind, "game selected");
        Ok(kind)
    }

    /// Reset every per-game field and hand the room to the selected game's
    /// engine. Refused, without writing anything, while nobody has joined.
    pub async fn start_game(&mut self) -> Result<GameKind, ServiceError> {
        let game = self
            .selected
            .ok_or_else(|| ServiceError::InvalidState("no game selected".into()))?;

        let snapshot = self.store.get(&paths::room(&self.code)).await?;
        let room = Room::from_snapshot(snapshot.as_ref())
            .ok_or_else(|| ServiceError::NotFound(format!("room {}", self.code)))?;
        if room.players.is_empty() {
            return Err(ServiceError::InvalidState(
                "cannot start a game without players".into(),
            ));
        }

        let mut fields = Map::new();
        for id in room.players.keys() {
            for field in TRANSIENT_PLAYER_FIELDS {
                fields.insert(paths::player_field(id, field), Value::Null);
            }
            fields.insert(paths::player_field(id, "score"), json!(0));
        }
        fields.insert("scratch".into(), Value::Null);
        for channel in [
            EventChannel::Reactions,
            EventChannel::BossActions,
            EventChannel::RhythmHits,
        ] {
            fields.insert(channel.key().into(), Value::Null);
        }
        fields.insert("status".into(), to_value(&RoomStatus::Playing)?);
        fields.insert("gameType".into(), json!(game.as_str()));
        fields.insert("gamePhase".into(), json!(STARTING_PHASE));
        fields.insert("startedAt".into(), json!(self.clock.now_ms()));

        self.run_transition(RoomEvent::StartGame(game), fields)
            .await?;
        info!(
            room = %self.code,
            game = %game,
            players = room.players.len(),
            "game started"
        );
        Ok(game)
    }

    /// Publish the engine's decision. The room stays on the result until the
    /// host returns to the lobby; a second decision for the same game is refused.
    pub async fn on_game_end(&mut self, outcome: &GameOutcome) -> Result<(), ServiceError> {
        let mut fields = Map::new();
        fields.insert("gamePhase".into(), json!(FINISHED_PHASE));
        fields.insert(paths::scratch_field("result"), outcome.to_record());

        self.run_transition(RoomEvent::GameEnded, fields).await?;
        info!(room = %self.code, winners = ?outcome.winners(), "game finished");
        Ok(())
    }

    /// Return to the lobby, aborting a running game.
    pub async fn back_to_lobby(&mut self) -> Result<(), ServiceError> {
        let mut fields = Map::new();
        fields.insert("status".into(), to_value(&RoomStatus::Lobby)?);
        fields.insert("gameType".into(), json!(""));
        fields.insert("gamePhase".into(), json!(""));

        self.run_transition(RoomEvent::BackToLobby, fields).await?;
        info!(room = %self.code, "back to lobby");
        Ok(())
    }

    /// Plan `event`, write `fields` into the room and commit the phase only
    /// once the write landed.
    async fn run_transition(
        &mut self,
        event: RoomEvent,
        fields: Map<String, Value>,
    ) -> Result<RoomPhase, ServiceError> {
        let Plan { id: plan_id, .. } = self.machine.plan(event)?;

        let write = self.store.update(&paths::room(&self.code), fields);
        let outcome = match timeout(self.transition_timeout, write).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => {
                warn!(
                    room = %self.code,
                    ?event,
                    timeout_ms = self.transition_timeout.as_millis(),
                    "room transition timed out"
                );
                Err(ServiceError::Timeout)
            }
        };

        match outcome {
            Ok(()) => Ok(self.machine.apply(plan_id)?),
            Err(err) => {
                if let Err(abort_err) = self.machine.abort(plan_id) {
                    warn!(
                        room = %self.code,
                        ?event,
                        error = ?abort_err,
                        "failed to abort room transition"
                    );
                }
                Err(err)
            }
        }
    }
}

fn phase_of(room: &Room) -> RoomPhase {
    match room.active_game() {
        Some(game) => RoomPhase::Playing {
            game,
            progress: if room.game_phase == FINISHED_PHASE {
                GameProgress::Finished
            } else {
                GameProgress::Running
            },
        },
        None => RoomPhase::Lobby,
    }
}

#[cfg(test)]
mod tests {
    use futures::future::{self, BoxFuture};
    use serde_json::json;

    use super::*;
    use crate::store::{MemoryStore, StoreResult, Subscription, testing::RecordingStore};

    fn config() -> AppConfig {
        AppConfig::default()
    }

    async fn controller(store: &MemoryStore) -> SessionController {
        SessionController::create_room_with_code(
            Arc::new(store.clone()),
            Arc::new(GameRegistry::builtin()),
            &config(),
            Clock::starting_at(1_000),
            "host-1".into(),
            "abcd",
        )
        .await
        .unwrap()
    }

    async fn add_player(store: &MemoryStore, id: &str, extra: Value) {
        let mut player = json!({"name": id, "joinedAt": 1, "score": 7});
        if let (Some(player), Some(extra)) = (player.as_object_mut(), extra.as_object()) {
            player.extend(extra.clone());
        }
        store
            .set(&paths::player("ABCD", id), player)
            .await
            .unwrap();
    }

    async fn room(store: &MemoryStore) -> Value {
        store.get("rooms/ABCD").await.unwrap().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn creating_a_room_writes_a_lobby() {
        let store = MemoryStore::new();
        let controller = controller(&store).await;
        assert_eq!(controller.code(), "ABCD");

        let doc = room(&store).await;
        assert_eq!(doc["host"], "host-1");
        assert_eq!(doc["status"], "lobby");
        assert_eq!(doc["createdAt"], 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn taken_codes_are_refused() {
        let store = MemoryStore::new();
        controller(&store).await;
        let err = SessionController::create_room_with_code(
            Arc::new(store.clone()),
            Arc::new(GameRegistry::builtin()),
            &config(),
            Clock::starting_at(0),
            "host-2".into(),
            "ABCD",
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn generated_rooms_get_distinct_codes() {
        let store = MemoryStore::new();
        let mut codes = Vec::new();
        for _ in 0..5 {
            let controller = SessionController::create_room(
                Arc::new(store.clone()),
                Arc::new(GameRegistry::builtin()),
                &config(),
                Clock::starting_at(0),
                "host".into(),
            )
            .await
            .unwrap();
            assert!(room_code::normalize(controller.code()).is_some());
            codes.push(controller.code().to_string());
        }
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_games_cannot_be_selected() {
        let store = MemoryStore::new();
        let mut controller = controller(&store).await;
        assert!(matches!(
            controller.select_game("karaoke"),
            Err(ServiceError::InvalidInput(_))
        ));

        let mut controller = SessionController {
            registry: Arc::new(GameRegistry::empty()),
            ..controller
        };
        assert!(controller.select_game("tap").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_room_refuses_to_start_without_writing() {
        let store = RecordingStore::new();
        let mut controller = SessionController::create_room_with_code(
            Arc::new(store.clone()),
            Arc::new(GameRegistry::builtin()),
            &config(),
            Clock::starting_at(0),
            "host".into(),
            "ABCD",
        )
        .await
        .unwrap();
        controller.select_game("tap").unwrap();
        let writes = store.write_count();

        let err = controller.start_game().await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(store.write_count(), writes);
        assert_eq!(controller.phase(), RoomPhase::Lobby);
    }

    #[tokio::test(start_paused = true)]
    async fn start_resets_every_per_game_field() {
        let store = MemoryStore::new();
        let mut controller = controller(&store).await;
        add_player(
            &store,
            "ava",
            json!({"taps": 40, "eliminated": true, "vote": 2, "lobbyX": 12.0}),
        )
        .await;
        add_player(&store, "bo", json!({"memoryInput": [1, 2]})).await;
        store
            .update(
                "rooms/ABCD",
                Map::from_iter([
                    ("scratch/result".to_string(), json!({"kind": "none"})),
                    ("reactions/r1".to_string(), json!({"emoji": "x"})),
                ]),
            )
            .await
            .unwrap();

        controller.select_game("tap").unwrap();
        assert_eq!(controller.start_game().await.unwrap(), GameKind::Tap);

        let doc = room(&store).await;
        assert_eq!(doc["status"], "playing");
        assert_eq!(doc["gameType"], "tap");
        assert_eq!(doc["gamePhase"], STARTING_PHASE);
        assert_eq!(doc["startedAt"], 1_000);
        assert!(doc.get("scratch").is_none());
        assert!(doc.get("reactions").is_none());

        let ava = &doc["players"]["ava"];
        assert_eq!(ava["score"], 0);
        assert!(ava.get("taps").is_none());
        assert!(ava.get("eliminated").is_none());
        assert!(ava.get("vote").is_none());
        assert_eq!(ava["lobbyX"], 12.0);
        assert_eq!(ava["name"], "ava");
        assert!(doc["players"]["bo"].get("memoryInput").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn result_is_published_once() {
        let store = MemoryStore::new();
        let mut controller = controller(&store).await;
        add_player(&store, "ava", json!({})).await;
        controller.select_game("tap").unwrap();
        controller.start_game().await.unwrap();

        controller
            .on_game_end(&GameOutcome::Winner("ava".into()))
            .await
            .unwrap();
        let doc = room(&store).await;
        assert_eq!(doc["gamePhase"], FINISHED_PHASE);
        assert_eq!(
            doc["scratch"]["result"],
            json!({"kind": "winner", "winners": ["ava"]})
        );

        let err = controller
            .on_game_end(&GameOutcome::NoWinner)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(room(&store).await["scratch"]["result"]["kind"], "winner");
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_lobby_clears_the_game_and_keeps_players() {
        let store = MemoryStore::new();
        let mut controller = controller(&store).await;
        add_player(&store, "ava", json!({})).await;
        controller.select_game("bomb").unwrap();
        controller.start_game().await.unwrap();

        controller.back_to_lobby().await.unwrap();
        let doc = room(&store).await;
        assert_eq!(doc["status"], "lobby");
        assert_eq!(doc["gameType"], "");
        assert_eq!(doc["gamePhase"], "");
        assert!(doc["players"].get("ava").is_some());
        assert_eq!(controller.phase(), RoomPhase::Lobby);

        // The selection survives so the same game can be replayed.
        controller.start_game().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_creator_can_resume() {
        let store = MemoryStore::new();
        let mut original = controller(&store).await;
        add_player(&store, "ava", json!({})).await;
        original.select_game("quiz").unwrap();
        original.start_game().await.unwrap();

        let settings = config();
        let resume = |host: &str| {
            SessionController::resume(
                Arc::new(store.clone()),
                Arc::new(GameRegistry::builtin()),
                &settings,
                Clock::starting_at(0),
                host.to_string(),
                "abcd",
            )
        };
        assert!(matches!(
            resume("intruder").await.err().unwrap(),
            ServiceError::Unauthorized(_)
        ));

        let resumed = resume("host-1").await.unwrap();
        assert_eq!(resumed.selected(), Some(GameKind::Quiz));
        assert_eq!(
            resumed.phase(),
            RoomPhase::Playing {
                game: GameKind::Quiz,
                progress: GameProgress::Running,
            }
        );
    }

    /// Store whose writes never complete.
    struct StalledStore(MemoryStore);

    impl SharedStore for StalledStore {
        fn get(&self, path: &str) -> BoxFuture<'static, StoreResult<Option<Value>>> {
            self.0.get(path)
        }

        fn subscribe(&self, path: &str) -> BoxFuture<'static, StoreResult<Subscription>> {
            self.0.subscribe(path)
        }

        fn update(&self, _: &str, _: Map<String, Value>) -> BoxFuture<'static, StoreResult<()>> {
            Box::pin(future::pending())
        }

        fn set(&self, path: &str, value: Value) -> BoxFuture<'static, StoreResult<()>> {
            self.0.set(path, value)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_write_times_out_and_keeps_the_phase() {
        let memory = MemoryStore::new();
        let mut controller = SessionController::create_room_with_code(
            Arc::new(StalledStore(memory.clone())),
            Arc::new(GameRegistry::builtin()),
            &config(),
            Clock::starting_at(0),
            "host".into(),
            "ABCD",
        )
        .await
        .unwrap();
        add_player(&memory, "ava", json!({})).await;
        controller.select_game("tap").unwrap();

        let err = controller.start_game().await.unwrap_err();
        assert!(matches!(err, ServiceError::Timeout));
        assert_eq!(controller.phase(), RoomPhase::Lobby);
        assert_eq!(controller.machine.snapshot().pending, None);
    }
}
