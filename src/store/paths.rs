//! Path layout of a room document.

use super::{StoreError, StoreResult};

/// Root under which every room lives.
pub const ROOMS: &str = "rooms";

const RESERVED: [char; 5] = ['.', '#', '$', '[', ']'];

/// Absolute path of the room document.
pub fn room(code: &str) -> String {
    format!("{ROOMS}/{code}")
}

/// Absolute path of one player entry.
pub fn player(code: &str, player_id: &str) -> String {
    format!("{ROOMS}/{code}/players/{player_id}")
}

/// Path of a player field, relative to the room document.
pub fn player_field(player_id: &str, field: &str) -> String {
    format!("players/{player_id}/{field}")
}

/// Path of an active-game scratch field, relative to the room document.
pub fn scratch_field(key: &str) -> String {
    format!("scratch/{key}")
}

/// Split and validate a slash-separated path.
pub(crate) fn segments(path: &str) -> StoreResult<Vec<String>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    trimmed
        .split('/')
        .map(|segment| {
            if segment.is_empty() || segment.contains(RESERVED) {
                Err(StoreError::InvalidPath(path.to_string()))
            } else {
                Ok(segment.to_string())
            }
        })
        .collect()
}
