use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::{dto::room::PhaseSummary, state::game_kind::GameKind};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE `event:` name; `None` for the default `message`.
    pub event: Option<String>,
    /// Pre-rendered `data:` payload.
    pub data: String,
}

impl ServerEvent {
    /// Event with a pre-rendered data field.
    pub fn new<E>(event: E, data: String) -> Self
    where
        E: Into<Option<String>>,
    {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Room the stream follows.
    pub code: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether host events (reactions, results) are forwarded on this stream.
    pub hosted: bool,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
/// Full room document, sent on connect and after every change.
pub struct RoomSnapshotEvent(pub Value);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the host picks the next game.
pub struct GameSelectedEvent {
    /// Game the next start will mount.
    pub game: GameKind,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever the host moves the room through its lifecycle.
pub struct PhaseChangedEvent(pub PhaseSummary);

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// A controller sent an emoji to the display.
pub struct ReactionShownEvent {
    /// Sender.
    pub player_id: String,
    /// Emoji to show.
    pub emoji: String,
    /// Send time.
    pub at: i64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the engine decided the game.
pub struct GameEndedEvent {
    /// Game that ended.
    pub game: GameKind,
    /// `winner`, `team` or `none`.
    pub kind: String,
    /// Rewarded principals; empty for `none`.
    pub winners: Vec<String>,
}
