use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::{validate_game_tag, validate_principal, validate_room_code},
    state::{
        game_kind::GameKind,
        state_machine::{GameProgress, RoomPhase},
    },
};

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload used to open (or take back) a room.
pub struct CreateRoomRequest {
    /// Principal of the host device; a fresh one is issued when absent.
    #[validate(custom(function = "validate_principal"))]
    #[serde(default)]
    pub principal: Option<String>,
    /// Code of a room to reopen, as remembered by the host device.
    #[validate(custom(function = "validate_room_code"))]
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Returned once a room is hosted by this server.
pub struct RoomCreated {
    /// Four-character room code.
    pub code: String,
    /// Principal owning the room.
    pub host: String,
    /// Secret expected in `x-host-token` by the host routes.
    pub host_token: String,
    /// Link controllers open to join.
    pub join_url: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Game the host wants to play next.
pub struct SelectGameRequest {
    /// Game tag such as `tap` or `quiz`.
    #[validate(custom(function = "validate_game_tag"))]
    pub game: String,
}

/// Lifecycle phase of a room as exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum PhaseSummary {
    /// Players roam the lobby.
    Lobby,
    /// A game is running or showing its result.
    Playing {
        /// Game that was started.
        game: GameKind,
        /// Whether the result is published.
        finished: bool,
    },
}

impl From<RoomPhase> for PhaseSummary {
    fn from(value: RoomPhase) -> Self {
        match value {
            RoomPhase::Lobby => PhaseSummary::Lobby,
            RoomPhase::Playing { game, progress } => PhaseSummary::Playing {
                game,
                finished: progress == GameProgress::Finished,
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Host-side view of a room after a lifecycle call.
pub struct LifecycleResponse {
    /// Room code.
    pub code: String,
    /// Game selected for the next start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<GameKind>,
    /// Lifecycle phase after the call.
    #[serde(flatten)]
    pub phase: PhaseSummary,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Current room document.
pub struct RoomView {
    /// Room code.
    pub code: String,
    /// Link controllers open to join.
    pub join_url: String,
    /// Whether the room's host runs in this process.
    pub hosted: bool,
    /// The room document as stored.
    #[schema(value_type = Object)]
    pub room: Value,
}
