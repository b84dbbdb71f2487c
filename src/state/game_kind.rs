//! Closed set of minigame tags carried in the room's `gameType` field.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Every minigame the dispatcher knows how to mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    /// Fast-tap: most taps in the window wins.
    Tap,
    /// Tap as soon as the signal appears.
    Reaction,
    /// Repeat a growing colour sequence.
    Simon,
    /// Recall a fresh symbol sequence each round.
    Memory,
    /// Shark chases swimmers.
    Shark,
    /// Fisher hooks fish.
    Fisher,
    /// Two teams pull a rope by tapping.
    Tug,
    /// Cooperative boss fight.
    Boss,
    /// Hot potato with a fuse.
    Bomb,
    /// Multiple-choice arithmetic quiz.
    Quiz,
    /// Shake the phone to climb.
    Climb,
    /// Tap on the beat.
    Rhythm,
    /// Tilt to stay inside a shrinking safe zone.
    Storm,
    /// Switch lanes to dodge obstacles.
    Runner,
}

/// Raised when a `gameType` tag is not part of [`GameKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown game type `{0}`")]
pub struct UnknownGameKind(pub String);

impl GameKind {
    /// Every registered tag.
    pub const ALL: [GameKind; 14] = [
        GameKind::Tap,
        GameKind::Reaction,
        GameKind::Simon,
        GameKind::Memory,
        GameKind::Shark,
        GameKind::Fisher,
        GameKind::Tug,
        GameKind::Boss,
        GameKind::Bomb,
        GameKind::Quiz,
        GameKind::Climb,
        GameKind::Rhythm,
        GameKind::Storm,
        GameKind::Runner,
    ];

    /// Wire tag stored in `gameType`.
    pub fn as_str(self) -> &'static str {
        match self {
            GameKind::Tap => "tap",
            GameKind::Reaction => "reaction",
            GameKind::Simon => "simon",
            GameKind::Memory => "memory",
            GameKind::Shark => "shark",
            GameKind::Fisher => "fisher",
            GameKind::Tug => "tug",
            GameKind::Boss => "boss",
            GameKind::Bomb => "bomb",
            GameKind::Quiz => "quiz",
            GameKind::Climb => "climb",
            GameKind::Rhythm => "rhythm",
            GameKind::Storm => "storm",
            GameKind::Runner => "runner",
        }
    }

    /// Whether the game is driven by motion sensors.
    pub fn uses_motion(self) -> bool {
        matches!(self, GameKind::Climb | GameKind::Storm)
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameKind {
    type Err = UnknownGameKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        GameKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownGameKind(value.to_string()))
    }
}
