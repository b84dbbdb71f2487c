//! Controller side of a room: one agent per device, owning that device's
//! player entry and turning its input into room writes.

pub mod avatar;
mod intent;
pub mod motion;
pub mod resume;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info, trace, warn};
use utoipa::ToSchema;

use self::{
    intent::Effect,
    motion::ShakeDetector,
    resume::{ResumeCache, ResumeState, ViewMode},
};
use crate::{
    clock::Clock,
    config::AppConfig,
    error::ServiceError,
    identity::PrincipalId,
    session::room_code,
    state::room::{Player, Room},
    store::{SharedStore, Subscription, channel, paths, to_value},
};

pub use self::intent::{Intent, LOBBY_STEP};

/// Longest accepted display name, in characters.
pub const MAX_NAME_CHARS: usize = 24;

/// Outcome of the device's motion permission prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SensorAccess {
    /// The user allowed motion access.
    #[default]
    Granted,
    /// The user refused; motion games show a prompt instead.
    Denied,
    /// The platform does not gate motion access.
    Unsupported,
}

impl SensorAccess {
    /// Whether motion intents may be sent.
    pub fn allows_motion(self) -> bool {
        self != SensorAccess::Denied
    }
}

/// What became of an emitted intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum IntentOutcome {
    /// The intent was written to the room.
    Applied,
    /// The intent means nothing in the room's current state.
    Ignored,
    /// Motion access was denied on this device.
    SensorsDisabled,
}

/// Trim and validate a display name.
pub fn validate_name(raw: &str) -> Result<String, ServiceError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ServiceError::InvalidInput(format!(
            "name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

/// One device taking part in a room.
pub struct PlayerAgent {
    store: Arc<dyn SharedStore>,
    code: String,
    principal: PrincipalId,
    clock: Clock,
    subscription: Subscription,
    sensors: SensorAccess,
    shake: ShakeDetector,
    resume: Option<ResumeCache>,
}

impl PlayerAgent {
    /// Attach to room `code`. A room that does not exist is terminal.
    pub async fn connect(
        store: Arc<dyn SharedStore>,
        code: &str,
        principal: PrincipalId,
        clock: Clock,
    ) -> Result<Self, ServiceError> {
        let code = room_code::normalize(code)
            .ok_or_else(|| ServiceError::InvalidInput(format!("`{code}` is not a room code")))?;
        let subscription = store.subscribe(&paths::room(&code)).await?;
        if subscription.borrow().is_none() {
            return Err(ServiceError::NotFound(format!("room {code}")));
        }

        debug!(room = %code, player = %principal, "controller connected");
        Ok(Self {
            store,
            code,
            principal,
            clock,
            subscription,
            sensors: SensorAccess::default(),
            shake: ShakeDetector::default(),
            resume: None,
        })
    }

    /// Reattach to the room a previous session of this device had joined,
    /// as the same principal. Returns `None` when the cache holds no
    /// controller view. A room that is gone clears the cache.
    pub async fn resume(
        store: Arc<dyn SharedStore>,
        cache: ResumeCache,
        clock: Clock,
    ) -> Result<Option<Self>, ServiceError> {
        let state = cache.load();
        let Some((code, principal)) = state.target(ViewMode::Controller) else {
            return Ok(None);
        };

        match Self::connect(store, code, principal.to_string(), clock).await {
            Ok(agent) => {
                info!(room = %agent.code, player = %agent.principal, "controller resumed");
                Ok(Some(agent.remember_in(cache)))
            }
            Err(err) => {
                if let Err(clear) = cache.clear() {
                    warn!(error = %clear, "failed to clear resume cache");
                }
                Err(err)
            }
        }
    }

    /// Record every successful join in `cache` so a reload can resume.
    pub fn remember_in(mut self, cache: ResumeCache) -> Self {
        self.resume = Some(cache);
        self
    }

    /// Code of the joined room.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Principal id of this device.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Latest room state seen by this device.
    pub fn room(&self) -> Option<Room> {
        Room::from_snapshot(self.subscription.borrow().as_ref())
    }

    /// This device's entry, once joined.
    pub fn player(&self) -> Option<Player> {
        self.room()?.players.remove(&self.principal)
    }

    /// Wait for the room to change. Returns `false` once the store goes away.
    pub async fn changed(&mut self) -> bool {
        self.subscription.changed().await.is_ok()
    }

    /// Enter the room under `name`. An avatar that cannot be processed is
    /// dropped rather than failing the join.
    pub async fn join(
        &mut self,
        name: &str,
        avatar: Option<Vec<u8>>,
        sensors: SensorAccess,
        config: &AppConfig,
    ) -> Result<Player, ServiceError> {
        let name = validate_name(name)?;
        let room = self
            .room()
            .ok_or_else(|| ServiceError::NotFound(format!("room {}", self.code)))?;
        let avatar = match avatar {
            Some(bytes) => encode_avatar(bytes).await,
            None => None,
        };
        self.sensors = sensors;

        let path = paths::player(&self.code, &self.principal);
        let player = match room.players.get(&self.principal) {
            Some(existing) => {
                let color = if config.is_palette_color(&existing.color) {
                    existing.color.clone()
                } else {
                    config.random_color(&mut rand::rng())
                };
                let mut fields = Map::new();
                fields.insert("name".into(), json!(name));
                fields.insert("color".into(), json!(color));
                fields.insert("avatar".into(), avatar.clone().map_or(Value::Null, Value::from));
                fields.insert("online".into(), json!(true));
                self.store.update(&path, fields).await?;
                Player {
                    name,
                    color,
                    avatar,
                    online: Some(true),
                    ..existing.clone()
                }
            }
            None => {
                let player = Player {
                    name,
                    color: config.random_color(&mut rand::rng()),
                    avatar,
                    online: Some(true),
                    joined_at: self.clock.now_ms(),
                    ..Player::default()
                };
                self.store.set(&path, to_value(&player)?).await?;
                player
            }
        };

        info!(
            room = %self.code,
            player = %self.principal,
            name = %player.name,
            sensors = ?sensors,
            "player joined"
        );
        if let Some(cache) = &self.resume {
            let state = ResumeState::in_room(ViewMode::Controller, &self.code, &self.principal);
            if let Err(err) = cache.save(&state) {
                warn!(room = %self.code, error = %err, "failed to save resume cache");
            }
        }
        Ok(player)
    }

    /// Mark the device as gone. The entry stays so a game in progress keeps
    /// its roster.
    pub async fn leave(&self) -> Result<(), ServiceError> {
        if self.player().is_none() {
            return Ok(());
        }
        let mut fields = Map::new();
        fields.insert("avatar".into(), Value::Null);
        fields.insert("online".into(), json!(false));
        self.store
            .update(&paths::player(&self.code, &self.principal), fields)
            .await?;
        debug!(room = %self.code, player = %self.principal, "player left");
        Ok(())
    }

    /// Apply `intent` to whatever the room is doing right now.
    pub async fn emit_intent(&mut self, intent: Intent) -> Result<IntentOutcome, ServiceError> {
        let room = self
            .room()
            .ok_or_else(|| ServiceError::NotFound(format!("room {}", self.code)))?;
        let Some(player) = room.players.get(&self.principal) else {
            return Err(ServiceError::InvalidState("join the room first".into()));
        };
        if intent.is_motion() && !self.sensors.allows_motion() {
            return Ok(IntentOutcome::SensorsDisabled);
        }

        let now = self.clock.now_ms();
        let Some(effect) = intent::plan(
            &room,
            &self.principal,
            player,
            &intent,
            now,
            &mut self.shake,
        ) else {
            trace!(room = %self.code, player = %self.principal, ?intent, "intent ignored");
            return Ok(IntentOutcome::Ignored);
        };

        match effect {
            Effect::Player(fields) => {
                self.store
                    .update(&paths::player(&self.code, &self.principal), fields)
                    .await?;
            }
            Effect::Event(target, payload) => {
                channel::push(self.store.as_ref(), &self.code, target, &payload, now).await?;
            }
        }
        trace!(room = %self.code, player = %self.principal, ?intent, "intent applied");
        Ok(IntentOutcome::Applied)
    }
}

async fn encode_avatar(bytes: Vec<u8>) -> Option<String> {
    match tokio::task::spawn_blocking(move || avatar::encode_avatar(&bytes)).await {
        Ok(Ok(url)) => Some(url),
        Ok(Err(err)) => {
            warn!(error = %err, "avatar dropped");
            None
        }
        Err(err) => {
            warn!(error = %err, "avatar encoding task failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        state::room::Direction,
        store::{MemoryStore, testing::RecordingStore},
    };

    async fn lobby(store: &MemoryStore) {
        store
            .set(
                "rooms/ABCD",
                json!({"host": "h", "status": "lobby", "gameType": "", "createdAt": 1}),
            )
            .await
            .unwrap();
    }

    async fn agent(store: &MemoryStore, principal: &str) -> PlayerAgent {
        PlayerAgent::connect(
            Arc::new(store.clone()),
            "abcd",
            principal.into(),
            Clock::starting_at(10_000),
        )
        .await
        .unwrap()
    }

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(validate_name("  Ava ").unwrap(), "Ava");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_CHARS)).is_ok());
        assert!(validate_name(&"x".repeat(MAX_NAME_CHARS + 1)).is_err());
    }

    #[tokio::test]
    async fn missing_room_is_not_found() {
        let store = MemoryStore::new();
        let err = PlayerAgent::connect(Arc::new(store), "WXYZ", "p".into(), Clock::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn blank_name_writes_nothing() {
        let store = RecordingStore::new();
        store
            .set("rooms/ABCD", json!({"host": "h"}))
            .await
            .unwrap();
        let writes = store.write_count();
        let mut agent = PlayerAgent::connect(Arc::new(store.clone()), "ABCD", "p".into(), Clock::new())
            .await
            .unwrap();

        let err = agent
            .join(" ", None, SensorAccess::Granted, &AppConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test(start_paused = true)]
    async fn join_writes_a_fresh_player() {
        let store = MemoryStore::new();
        lobby(&store).await;
        let mut agent = agent(&store, "ava").await;
        let config = AppConfig::default();

        let player = agent
            .join(" Ava ", Some(b"not an image".to_vec()), SensorAccess::Granted, &config)
            .await
            .unwrap();
        assert_eq!(player.name, "Ava");
        assert!(config.is_palette_color(&player.color));
        assert_eq!(player.avatar, None);

        let stored = store.get("rooms/ABCD/players/ava").await.unwrap().unwrap();
        assert_eq!(stored["name"], "Ava");
        assert_eq!(stored["joinedAt"], 10_000);
        assert_eq!(stored["score"], 0);
        assert_eq!(stored["online"], true);
        assert_eq!(agent.player().unwrap().name, "Ava");
    }

    #[tokio::test]
    async fn rejoining_keeps_join_order_and_leave_keeps_the_entry() {
        let store = MemoryStore::new();
        lobby(&store).await;
        let mut agent = agent(&store, "ava").await;
        let config = AppConfig::default();
        let first = agent
            .join("Ava", None, SensorAccess::Granted, &config)
            .await
            .unwrap();

        agent.leave().await.unwrap();
        let stored = store.get("rooms/ABCD/players/ava").await.unwrap().unwrap();
        assert_eq!(stored["online"], false);

        let again = agent
            .join("Ava B", None, SensorAccess::Granted, &config)
            .await
            .unwrap();
        assert_eq!(again.joined_at, first.joined_at);
        assert_eq!(again.color, first.color);
        assert_eq!(again.name, "Ava B");
    }

    #[tokio::test]
    async fn intents_follow_the_live_room_state() {
        let store = MemoryStore::new();
        lobby(&store).await;
        let mut agent = agent(&store, "ava").await;
        assert!(matches!(
            agent.emit_intent(Intent::Tap).await,
            Err(ServiceError::InvalidState(_))
        ));
        agent
            .join("Ava", None, SensorAccess::Granted, &AppConfig::default())
            .await
            .unwrap();

        let outcome = agent
            .emit_intent(Intent::Move { dir: Direction::Down })
            .await
            .unwrap();
        assert_eq!(outcome, IntentOutcome::Applied);
        assert_eq!(agent.player().unwrap().lobby_y, Some(55.0));
        assert_eq!(agent.emit_intent(Intent::Tap).await.unwrap(), IntentOutcome::Ignored);

        // The host switches the room to fast-tap behind the agent's back.
        let mut fields = Map::new();
        fields.insert("status".into(), json!("playing"));
        fields.insert("gameType".into(), json!("tap"));
        fields.insert("gamePhase".into(), json!("playing"));
        store.update("rooms/ABCD", fields).await.unwrap();

        assert_eq!(agent.emit_intent(Intent::Tap).await.unwrap(), IntentOutcome::Applied);
        assert_eq!(agent.emit_intent(Intent::Tap).await.unwrap(), IntentOutcome::Applied);
        assert_eq!(agent.player().unwrap().taps, 2);
    }

    #[tokio::test]
    async fn denied_sensors_disable_motion_only() {
        let store = MemoryStore::new();
        lobby(&store).await;
        let mut agent = agent(&store, "ava").await;
        agent
            .join("Ava", None, SensorAccess::Denied, &AppConfig::default())
            .await
            .unwrap();

        let shake = Intent::Shake {
            x: 20.0,
            y: 0.0,
            z: 0.0,
        };
        assert_eq!(
            agent.emit_intent(shake).await.unwrap(),
            IntentOutcome::SensorsDisabled
        );
        assert_eq!(
            agent
                .emit_intent(Intent::React { emoji: "👏".into() })
                .await
                .unwrap(),
            IntentOutcome::Applied
        );
        let reactions = store.get("rooms/ABCD/reactions").await.unwrap().unwrap();
        assert_eq!(reactions.as_object().unwrap().len(), 1);
    }
}
