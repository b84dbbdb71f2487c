use std::{ops::ControlFlow, sync::Arc, time::Duration};

use rand::{SeedableRng, rngs::StdRng};
use serde_json::{Map, Value};
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval, sleep},
};
use tracing::{debug, info, warn};

use super::{COUNTDOWN_PHASE, EngineContext, GameOutcome, GameRules};
use crate::{
    clock::Clock,
    state::room::{Room, RoomStatus},
    store::{SharedStore, Subscription, paths},
};

const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

/// Invoked at most once with the engine's decision.
pub type TerminationCallback = Box<dyn FnOnce(GameOutcome) + Send>;

/// Knobs of one engine run.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Clock stamping engine writes.
    pub clock: Clock,
    /// One-second ticks before the active phase.
    pub countdown_ticks: u32,
    /// Fixed RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

/// Owner of a running engine task. Dropping or unmounting it cancels every
/// timer the engine started.
#[derive(Debug)]
pub struct EngineHandle {
    task: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Cancel the engine and wait until its task is gone, so no write from it
    /// can land afterwards.
    pub async fn unmount(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    /// Whether the engine already decided (or died).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Spawn `rules` for room `code`.
pub fn spawn_engine(
    store: Arc<dyn SharedStore>,
    code: String,
    rules: Box<dyn GameRules>,
    options: EngineOptions,
    on_end: TerminationCallback,
) -> EngineHandle {
    let rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let runner = Runner {
        store,
        path: paths::room(&code),
        code,
        rules,
        clock: options.clock,
        rng,
    };
    let task = tokio::spawn(runner.run(options.countdown_ticks, on_end));
    EngineHandle { task: Some(task) }
}

#[derive(Clone, Copy)]
enum StepKind {
    Start,
    Tick,
    Observe,
}

struct Runner {
    store: Arc<dyn SharedStore>,
    code: String,
    path: String,
    rules: Box<dyn GameRules>,
    clock: Clock,
    rng: StdRng,
}

impl Runner {
    async fn run(mut self, countdown_ticks: u32, on_end: TerminationCallback) {
        let mut subscription = match self.store.subscribe(&self.path).await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(room = %self.code, error = %err, "engine could not subscribe to room");
                return;
            }
        };

        for remaining in (1..=countdown_ticks).rev() {
            match still_playing(&mut subscription) {
                None => {
                    info!(room = %self.code, "room disappeared during countdown; stopping engine");
                    return;
                }
                Some(false) => {
                    debug!(room = %self.code, remaining, "room left playing; countdown not published");
                }
                Some(true) => {
                    let mut fields = Map::new();
                    fields.insert("gamePhase".into(), COUNTDOWN_PHASE.into());
                    fields.insert(paths::scratch_field("countdown"), remaining.into());
                    self.flush(fields).await;
                }
            }
            sleep(COUNTDOWN_STEP).await;
        }

        if let Some(outcome) = self.drive(&mut subscription).await {
            info!(room = %self.code, ?outcome, "engine decided");
            on_end(outcome);
        }
    }

    /// Active phase. `None` when the room vanished or the store went away.
    async fn drive(&mut self, subscription: &mut Subscription) -> Option<GameOutcome> {
        let origin = Instant::now();
        if let ControlFlow::Break(outcome) = self.step(subscription, origin, StepKind::Start).await
        {
            return outcome;
        }

        let mut ticker = interval(self.rules.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            let kind = tokio::select! {
                changed = subscription.changed() => match changed {
                    Ok(()) => StepKind::Observe,
                    Err(_) => return None,
                },
                _ = ticker.tick() => StepKind::Tick,
            };

            if let ControlFlow::Break(outcome) = self.step(subscription, origin, kind).await {
                return outcome;
            }
        }
    }

    async fn step(
        &mut self,
        subscription: &mut Subscription,
        origin: Instant,
        kind: StepKind,
    ) -> ControlFlow<Option<GameOutcome>> {
        let snapshot = subscription.borrow_and_update().clone();
        let Some(snapshot) = snapshot else {
            info!(room = %self.code, "room disappeared; stopping engine");
            return ControlFlow::Break(None);
        };
        let Some(room) = Room::from_snapshot(Some(&snapshot)) else {
            return ControlFlow::Continue(());
        };
        if room.status != RoomStatus::Playing {
            debug!(room = %self.code, "room left playing; waiting for unmount");
            return ControlFlow::Continue(());
        }

        let mut ctx = EngineContext::new(
            &snapshot,
            &room,
            origin.elapsed(),
            self.clock.now_ms(),
            &mut self.rng,
        );
        match kind {
            StepKind::Start => {
                ctx.set_scratch("countdown", Value::Null);
                self.rules.start(&mut ctx);
            }
            StepKind::Tick => self.rules.tick(&mut ctx),
            StepKind::Observe => self.rules.observe(&mut ctx),
        }
        let (writes, outcome) = ctx.into_parts();
        self.flush(writes).await;

        match outcome {
            Some(outcome) => ControlFlow::Break(Some(outcome)),
            None => ControlFlow::Continue(()),
        }
    }

    async fn flush(&self, writes: Map<String, Value>) {
        if writes.is_empty() {
            return;
        }
        if let Err(err) = self.store.update(&self.path, writes).await {
            warn!(room = %self.code, error = %err, "engine write failed");
        }
    }
}

/// Whether the latest room snapshot is still playing; `None` once the room is gone.
fn still_playing(subscription: &mut Subscription) -> Option<bool> {
    let snapshot = subscription.borrow_and_update();
    let snapshot = snapshot.as_ref()?;
    Some(Room::from_snapshot(Some(snapshot)).is_some_and(|room| room.status == RoomStatus::Playing))
}
