//! The host's background task: keeps the room's engine mounted, turns engine
//! decisions into lifecycle transitions and drains the reaction channel for
//! the display.

use std::sync::Arc;

use tokio::{
    sync::{Mutex, broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::SessionController;
use crate::{
    clock::Clock,
    engine::{Dispatcher, EngineReport, GameOutcome, GameRegistry, SeenEvents},
    state::{
        game_kind::GameKind,
        room::{ReactionEvent, Room},
    },
    store::{SharedStore, channel, channel::EventChannel, paths},
};

const DISPLAY_BUFFER: usize = 64;

/// Something the host display should render outside of the room document.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    /// A controller sent an emoji.
    Reaction(ReactionEvent),
    /// The engine decided and the result was published.
    GameEnded {
        /// Game that ended.
        game: GameKind,
        /// Decision of the engine.
        outcome: GameOutcome,
    },
}

/// Knobs of the host runtime.
#[derive(Debug, Clone, Copy)]
pub struct HostOptions {
    /// Clock handed to mounted engines.
    pub clock: Clock,
    /// Countdown ticks before each game.
    pub countdown_ticks: u32,
}

/// Handle on a running host task; dropping it stops the task and its engine.
pub struct HostRuntime {
    task: Option<JoinHandle<()>>,
    events: broadcast::Sender<DisplayEvent>,
}

impl HostRuntime {
    /// Start hosting the room owned by `controller`.
    pub fn spawn(
        store: Arc<dyn SharedStore>,
        controller: Arc<Mutex<SessionController>>,
        registry: Arc<GameRegistry>,
        code: String,
        options: HostOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(DISPLAY_BUFFER);
        let host = Host {
            store,
            controller,
            code,
            events: events.clone(),
            seen: SeenEvents::default(),
        };
        let task = tokio::spawn(host.run(registry, options));
        Self {
            task: Some(task),
            events,
        }
    }

    /// Receive display events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.events.subscribe()
    }

    /// Stop hosting and wait until the engine is gone.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for HostRuntime {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Host {
    store: Arc<dyn SharedStore>,
    controller: Arc<Mutex<SessionController>>,
    code: String,
    events: broadcast::Sender<DisplayEvent>,
    seen: SeenEvents,
}

impl Host {
    async fn run(mut self, registry: Arc<GameRegistry>, options: HostOptions) {
        let mut subscription = match self.store.subscribe(&paths::room(&self.code)).await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(room = %self.code, error = %err, "host could not subscribe to room");
                return;
            }
        };
        let (reports_tx, mut reports) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new(
            self.store.clone(),
            self.code.clone(),
            registry,
            options.clock,
            options.countdown_ticks,
            reports_tx,
        );
        info!(room = %self.code, "host runtime started");

        loop {
            let snapshot = subscription.borrow_and_update().clone();
            let room = Room::from_snapshot(snapshot.as_ref());
            dispatcher.sync(room.as_ref()).await;
            if let Some(room) = &room {
                self.drain_reactions(room).await;
            }

            tokio::select! {
                changed = subscription.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(report) = reports.recv() => {
                    self.handle_report(report, &dispatcher).await;
                }
            }
        }

        dispatcher.unmount().await;
        debug!(room = %self.code, "host runtime stopped");
    }

    /// Publish an engine decision, unless the engine that made it was already
    /// replaced (back to lobby, restart) by the time it arrived.
    async fn handle_report(&self, report: EngineReport, dispatcher: &Dispatcher) {
        if dispatcher.current() != Some(&report.key) {
            debug!(room = %self.code, game = %report.key.kind, "dropping stale engine report");
            return;
        }

        let published = self
            .controller
            .lock()
            .await
            .on_game_end(&report.outcome)
            .await;
        match published {
            Ok(()) => {
                let _ = self.events.send(DisplayEvent::GameEnded {
                    game: report.key.kind,
                    outcome: report.outcome,
                });
            }
            Err(err) => {
                warn!(room = %self.code, error = %err, "failed to publish game result");
            }
        }
    }

    async fn drain_reactions(&mut self, room: &Room) {
        self.seen.retain_pending(&room.reactions);
        for (event_id, payload) in &room.reactions {
            if !self.seen.first_time(event_id) {
                continue;
            }
            match serde_json::from_value::<ReactionEvent>(payload.clone()) {
                Ok(reaction) => {
                    let _ = self.events.send(DisplayEvent::Reaction(reaction));
                }
                Err(err) => debug!(event = %event_id, error = %err, "dropping malformed reaction"),
            }
            if let Err(err) =
                channel::consume(self.store.as_ref(), &self.code, EventChannel::Reactions, event_id)
                    .await
            {
                warn!(room = %self.code, error = %err, "failed to consume reaction");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{config::AppConfig, store::MemoryStore};

    async fn hosted_room(store: &MemoryStore) -> (Arc<Mutex<SessionController>>, HostRuntime) {
        let registry = Arc::new(GameRegistry::builtin());
        let controller = SessionController::create_room_with_code(
            Arc::new(store.clone()),
            registry.clone(),
            &AppConfig::default(),
            Clock::starting_at(0),
            "host".into(),
            "ABCD",
        )
        .await
        .unwrap();
        let controller = Arc::new(Mutex::new(controller));
        let runtime = HostRuntime::spawn(
            Arc::new(store.clone()),
            controller.clone(),
            registry,
            "ABCD".into(),
            HostOptions {
                clock: Clock::starting_at(0),
                countdown_ticks: 0,
            },
        );
        (controller, runtime)
    }

    #[tokio::test(start_paused = true)]
    async fn reactions_are_shown_once_and_consumed() {
        let store = MemoryStore::new();
        let (_controller, runtime) = hosted_room(&store).await;
        let mut events = runtime.subscribe();

        let reaction = ReactionEvent {
            player_id: "ava".into(),
            emoji: "🎉".into(),
            at: 5,
        };
        channel::push(&store, "ABCD", EventChannel::Reactions, &reaction, 5)
            .await
            .unwrap();

        let shown = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(shown, DisplayEvent::Reaction(reaction));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.get("rooms/ABCD/reactions").await.unwrap().is_none());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn engine_decision_finishes_the_game() {
        let store = MemoryStore::new();
        let (controller, runtime) = hosted_room(&store).await;
        let mut events = runtime.subscribe();
        store
            .set(
                &paths::player("ABCD", "ava"),
                json!({"name": "Ava", "joinedAt": 1}),
            )
            .await
            .unwrap();

        {
            let mut controller = controller.lock().await;
            controller.select_game("tap").unwrap();
            controller.start_game().await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        for taps in 1..=3 {
            store
                .set("rooms/ABCD/players/ava/taps", json!(taps))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let event = tokio::time::timeout(Duration::from_secs(15), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            DisplayEvent::GameEnded {
                game: GameKind::Tap,
                outcome: GameOutcome::Winner("ava".into()),
            }
        );

        let doc = store.get("rooms/ABCD").await.unwrap().unwrap();
        assert_eq!(doc["gamePhase"], "finished");
        assert_eq!(doc["scratch"]["result"]["winners"], json!(["ava"]));
        assert_eq!(doc["players"]["ava"]["score"], 3);

        // The finished engine is not remounted.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn returning_to_lobby_drops_the_engine() {
        let store = MemoryStore::new();
        let (controller, runtime) = hosted_room(&store).await;
        let mut events = runtime.subscribe();
        store
            .set(
                &paths::player("ABCD", "ava"),
                json!({"name": "Ava", "joinedAt": 1}),
            )
            .await
            .unwrap();
        {
            let mut controller = controller.lock().await;
            controller.select_game("tap").unwrap();
            controller.start_game().await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        store
            .set("rooms/ABCD/players/ava/taps", json!(4))
            .await
            .unwrap();
        controller.lock().await.back_to_lobby().await.unwrap();

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(events.try_recv().is_err());
        let doc = store.get("rooms/ABCD").await.unwrap().unwrap();
        assert_eq!(doc["status"], "lobby");
        assert!(doc["scratch"].get("result").is_none());
        runtime.shutdown().await;
    }
}
