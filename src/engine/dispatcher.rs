use std::{collections::HashMap, sync::Arc};

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{
    EngineHandle, EngineOptions, EngineSetup, FINISHED_PHASE, GameOutcome, GameRules, games,
    spawn_engine,
};
use crate::{
    clock::Clock,
    state::{game_kind::GameKind, room::Room},
    store::SharedStore,
};

/// Builds the rules of one game variant.
pub type EngineFactory = fn(&EngineSetup) -> Box<dyn GameRules>;

/// Lookup table from game tag to engine factory.
pub struct GameRegistry {
    factories: HashMap<GameKind, EngineFactory>,
}

impl GameRegistry {
    /// Registry without any game.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding every built-in game.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(GameKind::Tap, games::tap::factory);
        registry.register(GameKind::Reaction, games::reaction::factory);
        registry.register(GameKind::Simon, games::sequence::simon);
        registry.register(GameKind::Memory, games::sequence::memory);
        registry.register(GameKind::Shark, games::pursuit::shark);
        registry.register(GameKind::Fisher, games::pursuit::fisher);
        registry.register(GameKind::Tug, games::tug::factory);
        registry.register(GameKind::Boss, games::boss::factory);
        registry.register(GameKind::Bomb, games::bomb::factory);
        registry.register(GameKind::Quiz, games::quiz::factory);
        registry.register(GameKind::Climb, games::climb::factory);
        registry.register(GameKind::Rhythm, games::rhythm::factory);
        registry.register(GameKind::Storm, games::storm::factory);
        registry.register(GameKind::Runner, games::runner::factory);
        registry
    }

    /// Add or replace the factory for `kind`.
    pub fn register(&mut self, kind: GameKind, factory: EngineFactory) {
        self.factories.insert(kind, factory);
    }

    /// Whether `kind` can be mounted.
    pub fn contains(&self, kind: GameKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Instantiate the rules for `kind`.
    pub fn create(&self, kind: GameKind, setup: &EngineSetup) -> Option<Box<dyn GameRules>> {
        self.factories.get(&kind).map(|factory| factory(setup))
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Identity of one mounted game: the same tag started twice is two mounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountKey {
    /// Game tag.
    pub kind: GameKind,
    /// `startedAt` of the room when the game was started.
    pub started_at: Option<i64>,
}

impl MountKey {
    /// Key of the game the room wants running, if any.
    pub fn for_room(room: &Room) -> Option<Self> {
        if room.game_phase == FINISHED_PHASE {
            return None;
        }
        room.active_game().map(|kind| Self {
            kind,
            started_at: room.started_at,
        })
    }
}

/// Decision reported by a mounted engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReport {
    /// Mount that decided.
    pub key: MountKey,
    /// Decision.
    pub outcome: GameOutcome,
}

/// Keeps at most one engine mounted for a room, matching its `gameType`.
pub struct Dispatcher {
    store: Arc<dyn SharedStore>,
    code: String,
    registry: Arc<GameRegistry>,
    clock: Clock,
    countdown_ticks: u32,
    reports: mpsc::UnboundedSender<EngineReport>,
    mounted: Option<(MountKey, EngineHandle)>,
}

impl Dispatcher {
    /// Create a dispatcher reporting engine decisions on `reports`.
    pub fn new(
        store: Arc<dyn SharedStore>,
        code: impl Into<String>,
        registry: Arc<GameRegistry>,
        clock: Clock,
        countdown_ticks: u32,
        reports: mpsc::UnboundedSender<EngineReport>,
    ) -> Self {
        Self {
            store,
            code: code.into(),
            registry,
            clock,
            countdown_ticks,
            reports,
            mounted: None,
        }
    }

    /// Key of the mounted engine.
    pub fn current(&self) -> Option<&MountKey> {
        self.mounted.as_ref().map(|(key, _)| key)
    }

    /// Reconcile the mounted engine with the room. The previous engine is
    /// fully unmounted before a new one starts; unknown tags mount nothing.
    pub async fn sync(&mut self, room: Option<&Room>) {
        let desired = room
            .and_then(MountKey::for_room)
            .filter(|key| self.registry.contains(key.kind));

        if self.current() == desired.as_ref() {
            return;
        }

        self.unmount().await;

        let (Some(key), Some(room)) = (desired, room) else {
            return;
        };
        let setup = EngineSetup {
            code: self.code.clone(),
            roster: room.roster_ids(),
        };
        let Some(rules) = self.registry.create(key.kind, &setup) else {
            return;
        };

        info!(
            room = %self.code,
            game = %key.kind,
            players = setup.roster.len(),
            "mounting game engine"
        );
        let reports = self.reports.clone();
        let report_key = key.clone();
        let handle = spawn_engine(
            self.store.clone(),
            self.code.clone(),
            rules,
            EngineOptions {
                clock: self.clock,
                countdown_ticks: self.countdown_ticks,
                seed: None,
            },
            Box::new(move |outcome| {
                let _ = reports.send(EngineReport {
                    key: report_key,
                    outcome,
                });
            }),
        );
        self.mounted = Some((key, handle));
    }

    /// Cancel the mounted engine, if any.
    pub async fn unmount(&mut self) {
        if let Some((key, handle)) = self.mounted.take() {
            debug!(room = %self.code, game = %key.kind, "unmounting game engine");
            handle.unmount().await;
        }
    }
}
