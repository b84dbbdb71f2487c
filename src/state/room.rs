//! Shape of the shared room document.
//!
//! Decoding is deliberately lenient: the document is written by many
//! untrusted devices, so a malformed field decodes to its default instead of
//! rejecting the whole room, and malformed player entries are skipped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::{DefaultOnError, MapSkipError, serde_as};
use tracing::warn;
use utoipa::ToSchema;

use crate::state::game_kind::GameKind;

/// Centre of the normalized 0-100 room coordinate space.
pub const CENTER: f64 = 50.0;

/// Player fields owned by the active game, wiped before every game start.
/// `score` is reset to zero separately.
pub const TRANSIENT_PLAYER_FIELDS: [&str; 20] = [
    "lastClick",
    "taps",
    "posX",
    "posY",
    "lane",
    "distance",
    "climbPos",
    "shakeCount",
    "gyro",
    "team",
    "role",
    "status",
    "eliminated",
    "memoryStatus",
    "memoryInput",
    "vote",
    "drawing",
    "action",
    "lastMove",
    "prop",
];

/// Room-level lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Pre-game; players roam the lobby.
    #[default]
    Lobby,
    /// A game engine owns the derived state.
    Playing,
}

/// Root aggregate shared by every participant of a room.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Room {
    /// Principal id of the creating host. Immutable after creation.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub host: String,
    /// Lobby or playing.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub status: RoomStatus,
    /// Tag of the selected game; empty when none.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub game_type: String,
    /// Phase name private to the active engine.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub game_phase: String,
    /// Creation time, ms since the epoch.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub created_at: i64,
    /// Time of the last game start.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    /// Joined devices by principal id.
    #[serde_as(deserialize_as = "MapSkipError<_, _>")]
    pub players: BTreeMap<String, Player>,
    /// Active-game scratch fields, cleared at every game start.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub scratch: Map<String, Value>,
    /// Pending `reactions` events.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub reactions: Map<String, Value>,
    /// Pending `bossActions` events.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub boss_actions: Map<String, Value>,
    /// Pending `rhythmHits` events.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub rhythm_hits: Map<String, Value>,
}

impl Room {
    /// Fresh lobby document written at room creation.
    pub fn new_lobby(host: impl Into<String>, created_at: i64) -> Self {
        Self {
            host: host.into(),
            created_at,
            ..Self::default()
        }
    }

    /// Decode a store snapshot. Absent rooms and undecodable documents yield `None`.
    pub fn from_snapshot(snapshot: Option<&Value>) -> Option<Self> {
        let value = snapshot?;
        match serde_json::from_value(value.clone()) {
            Ok(room) => Some(room),
            Err(err) => {
                warn!(error = %err, "room document could not be decoded");
                None
            }
        }
    }

    /// Game engine that should be running, if any.
    pub fn active_game(&self) -> Option<GameKind> {
        if self.status != RoomStatus::Playing {
            return None;
        }
        self.game_type.parse().ok()
    }

    /// Players in join order (`joinedAt`, then principal id).
    pub fn roster(&self) -> Vec<(&str, &Player)> {
        let mut roster: Vec<(&str, &Player)> = self
            .players
            .iter()
            .map(|(id, player)| (id.as_str(), player))
            .collect();
        roster.sort_by(|(a_id, a), (b_id, b)| a.joined_at.cmp(&b.joined_at).then(a_id.cmp(b_id)));
        roster
    }

    /// Player ids in join order.
    pub fn roster_ids(&self) -> Vec<String> {
        self.roster()
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// String scratch field.
    pub fn scratch_str(&self, key: &str) -> Option<&str> {
        self.scratch.get(key).and_then(Value::as_str)
    }
}

/// One joined device.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Player {
    /// Display name.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub name: String,
    /// Palette color.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub color: String,
    /// Small encoded image as a data URL.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Best-effort presence hint.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    /// Join time; orders the roster.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub joined_at: i64,
    /// Points in the active game.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub score: i64,
    /// Time of the last accepted tap.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_click: Option<i64>,
    /// Monotonic tap counter written by the device.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub taps: u32,
    /// Free-roam lobby position.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lobby_x: Option<f64>,
    /// Free-roam lobby position.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lobby_y: Option<f64>,
    /// Game position, 0-100.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_x: Option<f64>,
    /// Game position, 0-100.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_y: Option<f64>,
    /// Runner lane.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane: Option<u8>,
    /// Runner distance.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub distance: f64,
    /// Climb height, 0-100.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub climb_pos: f64,
    /// Accepted shakes, capped.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub shake_count: u32,
    /// Latest tilt sample.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gyro: Option<Gyro>,
    /// Team in the team games.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
    /// Privileged role, if any.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Survival in elimination games.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LifeStatus>,
    /// Out of the active game.
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub eliminated: bool,
    /// Sequence round outcome.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_status: Option<RoundStatus>,
    /// Symbols entered this round.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub memory_input: Vec<u8>,
    /// Index of the chosen answer.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote: Option<u8>,
    /// Latest directional intent.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_move: Option<MoveIntent>,
    /// Drawing payload, reset at game start.
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drawing: Option<String>,
}

impl Player {
    /// In-game position, centred when unknown.
    pub fn position(&self) -> Point {
        Point::new(
            self.pos_x.unwrap_or(CENTER),
            self.pos_y.unwrap_or(CENTER),
        )
    }

    /// Free-roam lobby position, centred when unknown.
    pub fn lobby_position(&self) -> Point {
        Point::new(
            self.lobby_x.unwrap_or(CENTER),
            self.lobby_y.unwrap_or(CENTER),
        )
    }

    /// Still in the running for the active game.
    pub fn is_alive(&self) -> bool {
        !self.eliminated && self.status != Some(LifeStatus::Dead)
    }
}

/// Point in the normalized 0-100 room space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Percent from the left edge.
    pub x: f64,
    /// Percent from the top edge.
    pub y: f64,
}

impl Point {
    /// Point at `(x, y)`, unclamped.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Move by `(dx, dy)` and clamp to the room bounds.
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new((self.x + dx).clamp(0.0, 100.0), (self.y + dy).clamp(0.0, 100.0))
    }

    /// Squared distance, compared against squared radii.
    pub fn distance_sq(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Device orientation in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Gyro {
    /// Front/back tilt.
    pub beta: f64,
    /// Left/right tilt.
    pub gamma: f64,
}

/// Survival flag written by elimination games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifeStatus {
    /// Still playing.
    Alive,
    /// Out until the next game.
    Dead,
}

/// Per-round outcome in the sequence games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    /// Still entering the sequence.
    Playing,
    /// Repeated the whole sequence.
    Success,
    /// Entered a wrong symbol.
    Fail,
}

/// Side in the team games, assigned by join order parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    /// Even join positions.
    Red,
    /// Odd join positions.
    Blue,
}

/// Directional intent; `Stop` releases a held direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards the top edge.
    Up,
    /// Towards the bottom edge.
    Down,
    /// Towards the left edge.
    Left,
    /// Towards the right edge.
    Right,
    /// No movement.
    Stop,
}

impl Direction {
    /// Unit vector in screen orientation (y grows downwards).
    pub fn vector(self) -> (f64, f64) {
        match self {
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
            Direction::Stop => (0.0, 0.0),
        }
    }
}

/// Latest directional intent with the time it was issued.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveIntent {
    /// Requested direction.
    pub dir: Direction,
    /// Issue time.
    pub at: i64,
}

/// Payload of the `reactions` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionEvent {
    /// Sender.
    pub player_id: String,
    /// Emoji shown on the display.
    pub emoji: String,
    /// Send time.
    pub at: i64,
}

/// Player move in the boss game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BossMove {
    /// Lowers the boss's health.
    Attack,
    /// Restores team energy.
    Heal,
}

/// Payload of the `bossActions` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BossActionEvent {
    /// Acting player.
    pub player_id: String,
    /// Attack or heal.
    pub action: BossMove,
    /// Send time.
    pub at: i64,
}

/// Payload of the `rhythmHits` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RhythmHitEvent {
    /// Drummer.
    pub player_id: String,
    /// Hit time on the device clock.
    pub at: i64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn malformed_fields_fall_back_to_defaults() {
        let value = json!({
            "host": "h",
            "status": "exploded",
            "players": {
                "p1": {"name": "Ava", "score": "lots", "posX": "left", "joinedAt": 5},
                "p2": "not a player"
            }
        });
        let room = Room::from_snapshot(Some(&value)).unwrap();

        assert_eq!(room.status, RoomStatus::Lobby);
        assert_eq!(room.players.len(), 1);
        let ava = &room.players["p1"];
        assert_eq!(ava.score, 0);
        assert_eq!(ava.position(), Point::new(CENTER, CENTER));
    }

    #[test]
    fn roster_follows_join_order() {
        let value = json!({
            "players": {
                "zed": {"name": "Zed", "joinedAt": 1},
                "amy": {"name": "Amy", "joinedAt": 2},
                "bob": {"name": "Bob", "joinedAt": 1}
            }
        });
        let room = Room::from_snapshot(Some(&value)).unwrap();
        assert_eq!(room.roster_ids(), vec!["bob", "zed", "amy"]);
    }

    #[test]
    fn active_game_requires_playing_status_and_known_tag() {
        let mut room = Room::new_lobby("h", 0);
        room.game_type = "tap".into();
        assert_eq!(room.active_game(), None);

        room.status = RoomStatus::Playing;
        assert_eq!(room.active_game(), Some(GameKind::Tap));

        room.game_type = "karaoke".into();
        assert_eq!(room.active_game(), None);
    }

    #[test]
    fn wire_names_are_camel_case() {
        let mut room = Room::new_lobby("h", 10);
        room.game_type = "tap".into();
        let value = serde_json::to_value(&room).unwrap();
        assert_eq!(value["gameType"], "tap");
        assert_eq!(value["createdAt"], 10);
        assert_eq!(value["status"], "lobby");
    }

    #[test]
    fn dead_or_eliminated_players_are_not_alive() {
        let mut player = Player::default();
        assert!(player.is_alive());
        player.status = Some(LifeStatus::Dead);
        assert!(!player.is_alive());
        player.status = None;
        player.eliminated = true;
        assert!(!player.is_alive());
    }
}
