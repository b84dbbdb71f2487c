use axum::{
    Router,
    extract::{RawQuery, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{services::controller_service, session::room_code, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws",
    tag = "controllers",
    params(("room" = Option<String>, Query, description = "Room code from the join link")),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a controller WebSocket session.
///
/// Devices opened from a join link may pass its `room` parameter here and
/// omit the room from their identification message.
pub async fn ws_handler(
    State(state): State<SharedState>,
    RawQuery(query): RawQuery,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let linked_room = query.as_deref().and_then(room_code::room_from_query);
    ws.on_upgrade(move |socket| controller_service::handle_socket(state, socket, linked_room))
}

/// Configure the controller WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
