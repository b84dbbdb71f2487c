use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/rooms/{code}/stream",
    tag = "sse",
    params(("code" = String, Path, description = "Room code, any case")),
    responses(
        (status = 200, description = "Room SSE stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "No such room")
    )
)]
/// Stream the room document and host events to a display.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    Ok(sse_service::room_stream(&state, &code).await?)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{code}/stream", get(room_stream))
}
