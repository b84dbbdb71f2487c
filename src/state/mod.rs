pub mod game_kind;
pub mod room;
mod sse;
pub mod state_machine;

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::Mutex;

use crate::{
    clock::Clock,
    config::AppConfig,
    engine::GameRegistry,
    identity::{AnonymousIdentity, IdentityProvider},
    session::{HostRuntime, SessionController},
    store::{MemoryStore, SharedStore},
};

pub use self::sse::SseHub;

/// Cheaply clonable handle on the [`AppState`].
pub type SharedState = Arc<AppState>;

/// A room hosted by this process: the lifecycle owner, its background
/// runtime and the hub its display streams listen to.
pub struct HostedRoom {
    token: String,
    controller: Arc<Mutex<SessionController>>,
    // Dropping the room stops its runtime.
    _runtime: HostRuntime,
    events: SseHub,
}

impl HostedRoom {
    /// Bundle a freshly spawned host.
    pub fn new(
        token: String,
        controller: Arc<Mutex<SessionController>>,
        runtime: HostRuntime,
        events: SseHub,
    ) -> Self {
        Self {
            token,
            controller,
            _runtime: runtime,
            events,
        }
    }

    /// Whether `provided` is the token handed out at creation.
    pub fn is_authorized(&self, provided: &str) -> bool {
        self.token == provided
    }

    /// Lifecycle owner of the room.
    pub fn controller(&self) -> &Arc<Mutex<SessionController>> {
        &self.controller
    }

    /// Hub feeding the room's SSE streams.
    pub fn events(&self) -> &SseHub {
        &self.events
    }
}

/// Central application state: the shared store and the rooms hosted here.
pub struct AppState {
    store: Arc<dyn SharedStore>,
    config: AppConfig,
    identity: Arc<dyn IdentityProvider>,
    registry: Arc<GameRegistry>,
    clock: Clock,
    rooms: DashMap<String, Arc<HostedRoom>>,
}

impl AppState {
    /// Construct a new [`AppState`] over an in-process store, wrapped in an
    /// [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_parts(
            Arc::new(MemoryStore::new()),
            config,
            Arc::new(AnonymousIdentity),
            Arc::new(GameRegistry::builtin()),
        )
    }

    /// Construct the state from explicit collaborators.
    pub fn with_parts(
        store: Arc<dyn SharedStore>,
        config: AppConfig,
        identity: Arc<dyn IdentityProvider>,
        registry: Arc<GameRegistry>,
    ) -> SharedState {
        Arc::new(Self {
            store,
            config,
            identity,
            registry,
            clock: Clock::new(),
            rooms: DashMap::new(),
        })
    }

    /// Shared document store.
    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.store
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Issuer of anonymous principal ids.
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }

    /// Games that can be mounted.
    pub fn registry(&self) -> &Arc<GameRegistry> {
        &self.registry
    }

    /// Process clock.
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Room hosted here under `code`, if any.
    pub fn hosted(&self, code: &str) -> Option<Arc<HostedRoom>> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    /// Register a hosted room. Returns `false` when the code is already hosted.
    pub fn host(&self, code: String, room: HostedRoom) -> bool {
        match self.rooms.entry(code) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(room));
                true
            }
        }
    }

    /// Number of rooms hosted by this process.
    pub fn hosted_count(&self) -> usize {
        self.rooms.len()
    }
}
