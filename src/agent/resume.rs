//! Device-local memory of the last view, so a reload lands back in the same
//! room and role. Never authoritative: the room may be gone by then.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::room_code;

/// Which screen the device was showing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Room code entry.
    #[default]
    Landing,
    /// Shared display owning the room.
    Host,
    /// Phone joined as a player.
    Controller,
}

/// Persisted view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeState {
    /// Screen to reopen.
    pub mode: ViewMode,
    /// Room the screen belonged to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_code: Option<String>,
    /// Identity the device used in that room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
}

impl ResumeState {
    /// View inside `code` with the given role, as `principal`.
    pub fn in_room(mode: ViewMode, code: impl Into<String>, principal: impl Into<String>) -> Self {
        Self {
            mode,
            room_code: Some(code.into()),
            principal: Some(principal.into()),
        }
    }

    /// Room and principal to reopen when the cached view is `mode`.
    pub fn target(&self, mode: ViewMode) -> Option<(&str, &str)> {
        if self.mode != mode {
            return None;
        }
        Some((self.room_code.as_deref()?, self.principal.as_deref()?))
    }
}

/// Error raised when the cache cannot be written.
#[derive(Debug, Error)]
pub enum ResumeError {
    /// The file could not be written or removed.
    #[error("failed to write resume cache")]
    Io(#[from] io::Error),
    /// The state could not be serialized.
    #[error("failed to encode resume cache")]
    Encode(#[from] serde_json::Error),
}

/// JSON file holding the [`ResumeState`].
#[derive(Debug, Clone)]
pub struct ResumeCache {
    path: PathBuf,
}

impl ResumeCache {
    /// Cache stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached view. Missing, unreadable or inconsistent caches fall
    /// back to the landing screen.
    pub fn load(&self) -> ResumeState {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return ResumeState::default(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read resume cache");
                return ResumeState::default();
            }
        };

        let state: ResumeState = match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to parse resume cache");
                return ResumeState::default();
            }
        };

        if state.mode == ViewMode::Landing {
            return ResumeState::default();
        }
        let code = state.room_code.as_deref().and_then(room_code::normalize);
        match (code, state.principal) {
            (Some(code), Some(principal)) => ResumeState::in_room(state.mode, code, principal),
            _ => {
                debug!(path = %self.path.display(), "resume cache has no usable room");
                ResumeState::default()
            }
        }
    }

    /// Persist `state`.
    pub fn save(&self, state: &ResumeState) -> Result<(), ResumeError> {
        let contents = serde_json::to_string(state)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }

    /// Forget the cached view.
    pub fn clear(&self) -> Result<(), ResumeError> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    struct TempCache(ResumeCache);

    impl TempCache {
        fn new() -> Self {
            let path = std::env::temp_dir().join(format!("party-room-resume-{}.json", Uuid::new_v4()));
            Self(ResumeCache::new(path))
        }
    }

    impl Drop for TempCache {
        fn drop(&mut self) {
            let _ = fs::remove_file(self.0.path());
        }
    }

    #[test]
    fn missing_cache_lands_on_the_landing_screen() {
        let cache = TempCache::new();
        assert_eq!(cache.0.load(), ResumeState::default());
    }

    #[test]
    fn saved_view_is_restored() {
        let cache = TempCache::new();
        let state = ResumeState::in_room(ViewMode::Controller, "WXYZ", "ava");
        cache.0.save(&state).unwrap();
        assert_eq!(cache.0.load(), state);
        assert_eq!(state.target(ViewMode::Controller), Some(("WXYZ", "ava")));
        assert_eq!(state.target(ViewMode::Host), None);

        cache.0.clear().unwrap();
        assert_eq!(cache.0.load(), ResumeState::default());
        cache.0.clear().unwrap();
    }

    #[test]
    fn corrupt_or_inconsistent_caches_are_ignored() {
        let cache = TempCache::new();
        fs::write(cache.0.path(), "{not json").unwrap();
        assert_eq!(cache.0.load(), ResumeState::default());

        fs::write(cache.0.path(), r#"{"mode":"host"}"#).unwrap();
        assert_eq!(cache.0.load(), ResumeState::default());

        fs::write(cache.0.path(), r#"{"mode":"host","roomCode":"wxyz"}"#).unwrap();
        assert_eq!(cache.0.load(), ResumeState::default());

        fs::write(
            cache.0.path(),
            r#"{"mode":"host","roomCode":"wxyz","principal":"h"}"#,
        )
        .unwrap();
        assert_eq!(cache.0.load(), ResumeState::in_room(ViewMode::Host, "WXYZ", "h"));
    }
}
