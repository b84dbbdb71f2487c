use std::sync::Arc;

use tokio::sync::{
    Mutex,
    broadcast::{self, error::RecvError},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::room::{CreateRoomRequest, LifecycleResponse, RoomCreated, RoomView, SelectGameRequest},
    error::ServiceError,
    services::sse_events,
    session::{DisplayEvent, HostOptions, HostRuntime, SessionController, room_code},
    state::{HostedRoom, SharedState, SseHub},
    store::paths,
};

const ROOM_EVENTS_CAPACITY: usize = 32;

/// Open a room, or take back the room named in the request, and host it here.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<RoomCreated, ServiceError> {
    let host = request
        .principal
        .unwrap_or_else(|| state.identity().issue());
    let store = state.store().clone();
    let registry = state.registry().clone();

    let controller = match request.code {
        Some(code) => {
            let code = normalize(&code)?;
            if state.hosted(&code).is_some() {
                return Err(ServiceError::InvalidState(format!(
                    "room {code} is already hosted"
                )));
            }
            if store.get(&paths::room(&code)).await?.is_some() {
                SessionController::resume(store, registry, state.config(), state.clock(), host, &code)
                    .await?
            } else {
                SessionController::create_room_with_code(
                    store,
                    registry,
                    state.config(),
                    state.clock(),
                    host,
                    &code,
                )
                .await?
            }
        }
        None => {
            SessionController::create_room(store, registry, state.config(), state.clock(), host)
                .await?
        }
    };

    host_controller(state, controller)
}

/// Host again the room remembered in the configured host resume cache.
/// Returns `None` when no cache is configured or it holds no host view.
pub async fn resume_remembered(state: &SharedState) -> Result<Option<RoomCreated>, ServiceError> {
    let Some(cache) = state.config().host_resume_cache() else {
        return Ok(None);
    };
    let Some(controller) = SessionController::resume_cached(
        state.store().clone(),
        state.registry().clone(),
        state.config(),
        state.clock(),
        &cache,
    )
    .await?
    else {
        return Ok(None);
    };
    host_controller(state, controller).map(Some)
}

/// Spawn the runtime of `controller`, register it and remember it as the
/// display's room when a resume cache is configured.
fn host_controller(
    state: &SharedState,
    controller: SessionController,
) -> Result<RoomCreated, ServiceError> {
    let code = controller.code().to_string();
    let host = controller.host().to_string();
    if let Some(cache) = state.config().host_resume_cache() {
        controller.remember_in(&cache);
    }
    let token = Uuid::new_v4().simple().to_string();
    let controller = Arc::new(Mutex::new(controller));
    let runtime = HostRuntime::spawn(
        state.store().clone(),
        controller.clone(),
        state.registry().clone(),
        code.clone(),
        HostOptions {
            clock: state.clock(),
            countdown_ticks: state.config().countdown_ticks(),
        },
    );
    let events = SseHub::new(ROOM_EVENTS_CAPACITY);
    forward_display_events(code.clone(), runtime.subscribe(), events.clone());

    if !state.host(code.clone(), HostedRoom::new(token.clone(), controller, runtime, events)) {
        return Err(ServiceError::InvalidState(format!(
            "room {code} is already hosted"
        )));
    }

    info!(room = %code, host = %host, "room hosted");
    Ok(RoomCreated {
        join_url: room_code::join_url(state.config().public_url(), &code),
        code,
        host,
        host_token: token,
    })
}

/// Read the current room document.
pub async fn room_view(state: &SharedState, code: &str) -> Result<RoomView, ServiceError> {
    let code = normalize(code)?;
    let room = state
        .store()
        .get(&paths::room(&code))
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room {code}")))?;

    Ok(RoomView {
        join_url: room_code::join_url(state.config().public_url(), &code),
        hosted: state.hosted(&code).is_some(),
        code,
        room,
    })
}

/// Resolve the hosted room `code`, checking the host token.
pub fn authorize(
    state: &SharedState,
    code: &str,
    token: &str,
) -> Result<Arc<HostedRoom>, ServiceError> {
    let code = normalize(code)?;
    let room = state
        .hosted(&code)
        .ok_or_else(|| ServiceError::NotFound(format!("room {code} is not hosted here")))?;
    if !room.is_authorized(token) {
        return Err(ServiceError::Unauthorized("invalid host token".into()));
    }
    Ok(room)
}

/// Pick the game the next start will mount.
pub async fn select_game(
    room: &HostedRoom,
    request: SelectGameRequest,
) -> Result<LifecycleResponse, ServiceError> {
    let mut controller = room.controller().lock().await;
    let game = controller.select_game(&request.game)?;
    sse_events::broadcast_game_selected(room.events(), game);
    Ok(lifecycle(&controller))
}

/// Start the selected game.
pub async fn start_game(room: &HostedRoom) -> Result<LifecycleResponse, ServiceError> {
    let mut controller = room.controller().lock().await;
    controller.start_game().await?;
    let response = lifecycle(&controller);
    sse_events::broadcast_phase_changed(room.events(), response.phase);
    Ok(response)
}

/// Abort or close the current game and return to the lobby.
pub async fn back_to_lobby(room: &HostedRoom) -> Result<LifecycleResponse, ServiceError> {
    let mut controller = room.controller().lock().await;
    controller.back_to_lobby().await?;
    let response = lifecycle(&controller);
    sse_events::broadcast_phase_changed(room.events(), response.phase);
    Ok(response)
}

fn lifecycle(controller: &SessionController) -> LifecycleResponse {
    LifecycleResponse {
        code: controller.code().to_string(),
        selected: controller.selected(),
        phase: controller.phase().into(),
    }
}

fn normalize(code: &str) -> Result<String, ServiceError> {
    room_code::normalize(code)
        .ok_or_else(|| ServiceError::InvalidInput(format!("`{code}` is not a room code")))
}

/// Pipe host runtime events into the room's SSE hub until the runtime stops.
fn forward_display_events(
    code: String,
    mut display: broadcast::Receiver<DisplayEvent>,
    hub: SseHub,
) {
    tokio::spawn(async move {
        loop {
            match display.recv().await {
                Ok(event) => sse_events::broadcast_display_event(&hub, &event),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(room = %code, skipped, "display events lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(room = %code, "display forwarder stopped");
    });
}
