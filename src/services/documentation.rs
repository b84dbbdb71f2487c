use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the party room server.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::select_game,
        crate::routes::rooms::start_game,
        crate::routes::rooms::back_to_lobby,
        crate::routes::sse::room_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::RoomCreated,
            crate::dto::room::SelectGameRequest,
            crate::dto::room::LifecycleResponse,
            crate::dto::room::PhaseSummary,
            crate::dto::room::RoomView,
            crate::dto::sse::Handshake,
            crate::dto::sse::GameSelectedEvent,
            crate::dto::sse::PhaseChangedEvent,
            crate::dto::sse::ReactionShownEvent,
            crate::dto::sse::GameEndedEvent,
            crate::dto::ws::ControllerInbound,
            crate::dto::ws::ControllerOutbound,
            crate::agent::Intent,
            crate::agent::IntentOutcome,
            crate::agent::SensorAccess,
            crate::state::game_kind::GameKind,
            crate::state::room::Direction,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room creation and host lifecycle"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "controllers", description = "WebSocket operations for player devices"),
    )
)]
/// OpenAPI document of the HTTP surface.
pub struct ApiDoc;
