use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    dto::{
        room::PhaseSummary,
        sse::{
            GameEndedEvent, GameSelectedEvent, Handshake, PhaseChangedEvent, ReactionShownEvent,
            RoomSnapshotEvent, ServerEvent,
        },
    },
    session::DisplayEvent,
    state::{SseHub, game_kind::GameKind},
};

/// First event of every stream.
pub const EVENT_HANDSHAKE: &str = "handshake";
/// Full room document.
pub const EVENT_ROOM: &str = "room";
/// The room was removed; the stream ends.
pub const EVENT_ROOM_CLOSED: &str = "room.closed";
const EVENT_GAME_SELECTED: &str = "game.selected";
const EVENT_PHASE_CHANGED: &str = "phase_changed";
const EVENT_REACTION: &str = "reaction";
const EVENT_GAME_ENDED: &str = "game.ended";

/// Greeting sent first on every room stream.
pub fn handshake(code: &str, hosted: bool) -> Option<ServerEvent> {
    let payload = Handshake {
        code: code.to_string(),
        message: format!("following room {code}"),
        hosted,
    };
    encode(EVENT_HANDSHAKE, &payload)
}

/// Full room document.
pub fn room_snapshot(room: Value) -> Option<ServerEvent> {
    encode(EVENT_ROOM, &RoomSnapshotEvent(room))
}

/// The room document disappeared.
pub fn room_closed(code: &str) -> ServerEvent {
    ServerEvent::new(Some(EVENT_ROOM_CLOSED.to_string()), code.to_string())
}

/// Broadcast the host's choice of the next game.
pub fn broadcast_game_selected(hub: &SseHub, game: GameKind) {
    send_event(hub, EVENT_GAME_SELECTED, &GameSelectedEvent { game });
}

/// Broadcast a lifecycle move of the room.
pub fn broadcast_phase_changed(hub: &SseHub, phase: PhaseSummary) {
    send_event(hub, EVENT_PHASE_CHANGED, &PhaseChangedEvent(phase));
}

/// Forward a host runtime event to the display streams.
pub fn broadcast_display_event(hub: &SseHub, event: &DisplayEvent) {
    match event {
        DisplayEvent::Reaction(reaction) => {
            let payload = ReactionShownEvent {
                player_id: reaction.player_id.clone(),
                emoji: reaction.emoji.clone(),
                at: reaction.at,
            };
            send_event(hub, EVENT_REACTION, &payload);
        }
        DisplayEvent::GameEnded { game, outcome } => {
            let payload = GameEndedEvent {
                game: *game,
                kind: outcome.kind().to_string(),
                winners: outcome.winners().into_iter().map(str::to_string).collect(),
            };
            send_event(hub, EVENT_GAME_ENDED, &payload);
        }
    }
}

fn send_event<T: Serialize>(hub: &SseHub, event: &str, payload: &T) {
    if let Some(event) = encode(event, payload) {
        hub.broadcast(event);
    }
}

fn encode<T: Serialize>(event: &str, payload: &T) -> Option<ServerEvent> {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialize SSE payload");
            None
        }
    }
}
