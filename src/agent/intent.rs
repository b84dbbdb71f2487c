//! Translation of device input into room writes, keyed by what the room is
//! doing at the moment the input happens.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use utoipa::ToSchema;

use super::motion::{Acceleration, ShakeDetector};
use crate::{
    engine::{
        COUNTDOWN_PHASE, FINISHED_PHASE, STARTING_PHASE,
        games::{quiz, sequence},
    },
    state::{
        game_kind::GameKind,
        room::{
            BossActionEvent, BossMove, Direction, Gyro, MoveIntent, Player, ReactionEvent,
            RhythmHitEvent, Room, RoomStatus, RoundStatus,
        },
    },
    store::channel::EventChannel,
};

/// Distance a lobby avatar moves per directional intent.
pub const LOBBY_STEP: f64 = 5.0;
const MAX_EMOJI_BYTES: usize = 16;

/// Something a player did on their device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Intent {
    /// Tap the big button.
    Tap,
    /// Press or release a direction.
    Move {
        /// Direction pressed, `stop` on release.
        dir: Direction,
    },
    /// Device orientation changed.
    Tilt {
        /// Front/back tilt in degrees.
        beta: f64,
        /// Left/right tilt in degrees.
        gamma: f64,
    },
    /// Raw accelerometer sample.
    Shake {
        /// Acceleration along x.
        x: f64,
        /// Acceleration along y.
        y: f64,
        /// Acceleration along z.
        z: f64,
    },
    /// Press a sequence symbol.
    Symbol {
        /// Index of the symbol.
        symbol: u8,
    },
    /// Pick a quiz answer.
    Answer {
        /// Index of the choice.
        choice: u8,
    },
    /// Hit the boss.
    Attack,
    /// Restore team energy.
    Heal,
    /// Tap on the beat.
    Beat,
    /// Send an emoji to the big screen.
    React {
        /// Emoji to show.
        emoji: String,
    },
}

impl Intent {
    /// Whether the intent comes from motion sensors.
    pub fn is_motion(&self) -> bool {
        matches!(self, Intent::Tilt { .. } | Intent::Shake { .. })
    }
}

/// Store write an intent turns into.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect {
    /// Merge into the player's own entry.
    Player(Map<String, Value>),
    /// Append to a one-shot channel.
    Event(EventChannel, Value),
}

/// Decide what `intent` means for `room` right now. `None` means the intent
/// has no meaning in the current state and nothing is written.
pub(crate) fn plan(
    room: &Room,
    player_id: &str,
    player: &Player,
    intent: &Intent,
    now_ms: i64,
    shake: &mut ShakeDetector,
) -> Option<Effect> {
    if let Intent::React { emoji } = intent {
        let emoji = emoji.trim();
        if emoji.is_empty() || emoji.len() > MAX_EMOJI_BYTES {
            return None;
        }
        let event = ReactionEvent {
            player_id: player_id.to_string(),
            emoji: emoji.to_string(),
            at: now_ms,
        };
        return Some(Effect::Event(
            EventChannel::Reactions,
            serde_json::to_value(event).ok()?,
        ));
    }

    match room.status {
        RoomStatus::Lobby => plan_lobby(player, intent),
        RoomStatus::Playing => {
            let game = room.active_game()?;
            if !accepts_input(&room.game_phase) || !player.is_alive() {
                return None;
            }
            plan_game(game, &room.game_phase, player_id, player, intent, now_ms, shake)
        }
    }
}

fn accepts_input(phase: &str) -> bool {
    !matches!(
        phase,
        "" | STARTING_PHASE | COUNTDOWN_PHASE | FINISHED_PHASE
    )
}

fn plan_lobby(player: &Player, intent: &Intent) -> Option<Effect> {
    let Intent::Move { dir } = intent else {
        return None;
    };
    if *dir == Direction::Stop {
        return None;
    }
    let (dx, dy) = dir.vector();
    let next = player
        .lobby_position()
        .offset(dx * LOBBY_STEP, dy * LOBBY_STEP);
    Some(fields([("lobbyX", json!(next.x)), ("lobbyY", json!(next.y))]))
}

fn plan_game(
    game: GameKind,
    phase: &str,
    player_id: &str,
    player: &Player,
    intent: &Intent,
    now_ms: i64,
    shake: &mut ShakeDetector,
) -> Option<Effect> {
    match (game, intent) {
        (GameKind::Tap | GameKind::Tug | GameKind::Bomb, Intent::Tap) => Some(fields([
            ("taps", json!(player.taps.saturating_add(1))),
            ("lastClick", json!(now_ms)),
        ])),
        (GameKind::Reaction, Intent::Tap) => Some(fields([("lastClick", json!(now_ms))])),
        (GameKind::Shark | GameKind::Fisher, Intent::Move { dir }) => last_move(*dir, now_ms),
        (GameKind::Runner, Intent::Move { dir: dir @ (Direction::Up | Direction::Down) }) => {
            last_move(*dir, now_ms)
        }
        (GameKind::Storm, Intent::Tilt { beta, gamma }) => {
            let gyro = Gyro {
                beta: round1(*beta),
                gamma: round1(*gamma),
            };
            if player.gyro == Some(gyro) {
                return None;
            }
            Some(fields([("gyro", serde_json::to_value(gyro).ok()?)]))
        }
        (GameKind::Climb, Intent::Shake { x, y, z }) => {
            let sample = Acceleration {
                x: *x,
                y: *y,
                z: *z,
            };
            let count = shake.register(player.shake_count, sample, now_ms)?;
            Some(fields([("shakeCount", json!(count))]))
        }
        (GameKind::Simon | GameKind::Memory, Intent::Symbol { symbol }) => {
            if phase != sequence::INPUT_PHASE || player.memory_status != Some(RoundStatus::Playing)
            {
                return None;
            }
            let mut input = player.memory_input.clone();
            input.push(*symbol);
            Some(fields([("memoryInput", json!(input))]))
        }
        (GameKind::Quiz, Intent::Answer { choice }) => {
            if phase != quiz::QUESTION_PHASE || usize::from(*choice) >= quiz::CHOICES {
                return None;
            }
            Some(fields([("vote", json!(choice))]))
        }
        (GameKind::Boss, Intent::Attack | Intent::Heal) => {
            let action = if *intent == Intent::Attack {
                BossMove::Attack
            } else {
                BossMove::Heal
            };
            let event = BossActionEvent {
                player_id: player_id.to_string(),
                action,
                at: now_ms,
            };
            Some(Effect::Event(
                EventChannel::BossActions,
                serde_json::to_value(event).ok()?,
            ))
        }
        (GameKind::Rhythm, Intent::Beat) => {
            let event = RhythmHitEvent {
                player_id: player_id.to_string(),
                at: now_ms,
            };
            Some(Effect::Event(
                EventChannel::RhythmHits,
                serde_json::to_value(event).ok()?,
            ))
        }
        _ => None,
    }
}

fn last_move(dir: Direction, at: i64) -> Option<Effect> {
    let intent = MoveIntent { dir, at };
    Some(fields([("lastMove", serde_json::to_value(intent).ok()?)]))
}

fn fields<const N: usize>(entries: [(&str, Value); N]) -> Effect {
    Effect::Player(
        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
    )
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
