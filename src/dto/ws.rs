use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationError;

use crate::{
    agent::{Intent, IntentOutcome, SensorAccess},
    dto::validation::{validate_principal, validate_room_code},
};

/// Reasons an inbound controller frame is rejected.
#[derive(Debug, Error)]
pub enum InboundError {
    /// Not JSON, or not a known message.
    #[error("malformed message: {0}")]
    Parse(#[from] serde_json::Error),
    /// A known message with a bad identifier.
    #[error("invalid message: {0}")]
    Invalid(#[from] ValidationError),
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from controller WebSocket clients.
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControllerInbound {
    /// First message of every connection.
    Identify {
        /// Room to attach to; defaults to the room of the join link.
        #[serde(default)]
        room: Option<String>,
        /// Principal remembered by the device; a fresh one is issued when absent.
        #[serde(default)]
        principal: Option<String>,
    },
    /// Enter the room as a player.
    Join {
        /// Display name.
        name: String,
        /// Base64 image, optionally as a data URL.
        #[serde(default)]
        avatar: Option<String>,
        /// Result of the motion permission prompt.
        #[serde(default)]
        sensors: SensorAccess,
    },
    /// Player input.
    Intent {
        /// What the player did.
        intent: Intent,
    },
    /// Leave the room and close the connection.
    Leave,
}

impl ControllerInbound {
    /// Parse a text frame and validate its identifiers.
    pub fn from_json_str(text: &str) -> Result<Self, InboundError> {
        let message: Self = serde_json::from_str(text)?;
        if let Self::Identify { room, principal } = &message {
            if let Some(room) = room {
                validate_room_code(room)?;
            }
            if let Some(principal) = principal {
                validate_principal(principal)?;
            }
        }
        Ok(message)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Messages pushed to controller WebSocket clients.
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControllerOutbound {
    /// The connection is attached to `room` as `principal`.
    Identified {
        /// Normalized room code.
        room: String,
        /// Principal the device should remember.
        principal: String,
    },
    /// The device's player entry after joining.
    Joined {
        /// Stored player entry.
        #[schema(value_type = Object)]
        player: Value,
    },
    /// What became of the last intent.
    IntentResult {
        /// Whether it was written.
        outcome: IntentOutcome,
    },
    /// Latest room document.
    Room {
        /// Room document.
        #[schema(value_type = Object)]
        room: Value,
    },
    /// A request failed; the connection stays open unless the room is gone.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::state::room::Direction;

    #[test]
    fn parses_identify_join_and_intents() {
        let identify = ControllerInbound::from_json_str(r#"{"type":"identify","room":"abcd"}"#).unwrap();
        assert!(matches!(identify, ControllerInbound::Identify { principal: None, .. }));
        let linked = ControllerInbound::from_json_str(r#"{"type":"identify"}"#).unwrap();
        assert!(matches!(linked, ControllerInbound::Identify { room: None, .. }));

        let join =
            ControllerInbound::from_json_str(r#"{"type":"join","name":"Ava","sensors":"denied"}"#)
                .unwrap();
        assert!(matches!(
            join,
            ControllerInbound::Join {
                sensors: SensorAccess::Denied,
                avatar: None,
                ..
            }
        ));

        let intent = ControllerInbound::from_json_str(
            r#"{"type":"intent","intent":{"kind":"move","dir":"up"}}"#,
        )
        .unwrap();
        assert!(matches!(
            intent,
            ControllerInbound::Intent {
                intent: Intent::Move { dir: Direction::Up }
            }
        ));
    }

    #[test]
    fn rejects_bad_identifiers() {
        assert!(matches!(
            ControllerInbound::from_json_str(r#"{"type":"identify","room":"AB"}"#),
            Err(InboundError::Invalid(_))
        ));
        assert!(matches!(
            ControllerInbound::from_json_str(r#"{"type":"identify","room":"ABCD","principal":"../x"}"#),
            Err(InboundError::Invalid(_))
        ));
        assert!(matches!(
            ControllerInbound::from_json_str(r#"{"type":"vote"}"#),
            Err(InboundError::Parse(_))
        ));
    }

    #[test]
    fn outbound_messages_are_tagged() {
        let message = ControllerOutbound::IntentResult {
            outcome: IntentOutcome::SensorsDisabled,
        };
        assert_eq!(
            serde_json::to_value(message).unwrap(),
            json!({"type": "intentResult", "outcome": "sensorsDisabled"})
        );
    }
}
