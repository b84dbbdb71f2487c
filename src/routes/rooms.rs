use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::room::{CreateRoomRequest, LifecycleResponse, RoomCreated, RoomView, SelectGameRequest},
    error::AppError,
    services::room_service,
    state::{HostedRoom, SharedState},
};

const HOST_TOKEN_HEADER: &str = "x-host-token";

/// Room creation plus the host-only lifecycle endpoints.
pub fn router(state: SharedState) -> Router<SharedState> {
    let host_routes = Router::new()
        .route("/rooms/{code}/game", post(select_game))
        .route("/rooms/{code}/start", post(start_game))
        .route("/rooms/{code}/lobby", post(back_to_lobby))
        .route_layer(middleware::from_fn_with_state(state, require_host_token));

    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{code}", get(get_room))
        .merge(host_routes)
}

/// Open a room hosted by this server.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room hosted", body = RoomCreated),
        (status = 401, description = "The requested room belongs to another host"),
        (status = 409, description = "The requested room is already hosted")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<RoomCreated>), AppError> {
    let created = room_service::create_room(&state, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Read a room document.
#[utoipa::path(
    get,
    path = "/rooms/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code, any case")),
    responses(
        (status = 200, description = "Room document", body = RoomView),
        (status = 404, description = "No such room")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(room_service::room_view(&state, &code).await?))
}

/// Pick the next game.
#[utoipa::path(
    post,
    path = "/rooms/{code}/game",
    tag = "rooms",
    params(("X-Host-Token" = String, Header, description = "Host token returned at room creation"),
    ("code" = String, Path, description = "Room code")),
    request_body = SelectGameRequest,
    responses(
        (status = 200, description = "Game selected", body = LifecycleResponse),
        (status = 400, description = "Unknown game")
    )
)]
pub async fn select_game(
    Extension(room): Extension<Arc<HostedRoom>>,
    Valid(Json(request)): Valid<Json<SelectGameRequest>>,
) -> Result<Json<LifecycleResponse>, AppError> {
    Ok(Json(room_service::select_game(&room, request).await?))
}

/// Start the selected game.
#[utoipa::path(
    post,
    path = "/rooms/{code}/start",
    tag = "rooms",
    params(("X-Host-Token" = String, Header, description = "Host token returned at room creation"),
    ("code" = String, Path, description = "Room code")),
    responses(
        (status = 200, description = "Game started", body = LifecycleResponse),
        (status = 409, description = "No game selected, no players, or a game is already running")
    )
)]
pub async fn start_game(
    Extension(room): Extension<Arc<HostedRoom>>,
) -> Result<Json<LifecycleResponse>, AppError> {
    Ok(Json(room_service::start_game(&room).await?))
}

/// Return to the lobby, aborting a running game.
#[utoipa::path(
    post,
    path = "/rooms/{code}/lobby",
    tag = "rooms",
    params(("X-Host-Token" = String, Header, description = "Host token returned at room creation"),
    ("code" = String, Path, description = "Room code")),
    responses((status = 200, description = "Back in the lobby", body = LifecycleResponse))
)]
pub async fn back_to_lobby(
    Extension(room): Extension<Arc<HostedRoom>>,
) -> Result<Json<LifecycleResponse>, AppError> {
    Ok(Json(room_service::back_to_lobby(&room).await?))
}

async fn require_host_token(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(HOST_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing host token header `X-Host-Token`".into()))?;

    let room = room_service::authorize(&state, &code, provided)?;
    req.extensions_mut().insert(room);
    Ok(next.run(req).await)
}
