//! Application-level configuration loading: player palette, join URL and room tuning.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use rand::{Rng, seq::IndexedRandom};
use serde::Deserialize;
use tracing::{info, warn};

use crate::agent::resume::ResumeCache;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PARTY_ROOM_CONFIG_PATH";
/// Fallback color returned when the palette is empty.
const DEFAULT_COLOR: &str = "#ffffff";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080/";
const DEFAULT_COUNTDOWN_TICKS: u32 = 3;
const DEFAULT_ROOM_CODE_ATTEMPTS: u32 = 8;
const DEFAULT_TRANSITION_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    palette: Vec<String>,
    public_url: String,
    countdown_ticks: u32,
    room_code_attempts: u32,
    transition_timeout: Duration,
    host_resume_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        colors = app_config.palette.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Pick a palette color uniformly at random.
    pub fn random_color<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        self.palette
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| DEFAULT_COLOR.to_string())
    }

    /// Whether `color` belongs to the palette.
    pub fn is_palette_color(&self, color: &str) -> bool {
        self.palette.iter().any(|candidate| candidate == color)
    }

    /// Base URL controllers open to join a room.
    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    /// Number of one-second countdown ticks before a game becomes active.
    pub fn countdown_ticks(&self) -> u32 {
        self.countdown_ticks
    }

    /// How many fresh codes room creation tries before giving up.
    pub fn room_code_attempts(&self) -> u32 {
        self.room_code_attempts
    }

    /// Upper bound on a lifecycle store write.
    pub fn transition_timeout(&self) -> Duration {
        self.transition_timeout
    }

    /// Cache remembering the last hosted room, when this process drives a
    /// single display that should reopen its room after a restart.
    pub fn host_resume_cache(&self) -> Option<ResumeCache> {
        self.host_resume_path.clone().map(ResumeCache::new)
    }

    /// Same configuration remembering hosted rooms in `path`.
    pub fn with_host_resume_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.host_resume_path = Some(path.into());
        self
    }

    /// Same configuration with a different countdown length.
    pub fn with_countdown_ticks(mut self, ticks: u32) -> Self {
        self.countdown_ticks = ticks;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            palette: default_palette(),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            countdown_ticks: DEFAULT_COUNTDOWN_TICKS,
            room_code_attempts: DEFAULT_ROOM_CODE_ATTEMPTS,
            transition_timeout: Duration::from_millis(DEFAULT_TRANSITION_TIMEOUT_MS),
            host_resume_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    palette: Option<Vec<String>>,
    #[serde(default)]
    public_url: Option<String>,
    #[serde(default)]
    countdown_ticks: Option<u32>,
    #[serde(default)]
    room_code_attempts: Option<u32>,
    #[serde(default)]
    transition_timeout_ms: Option<u64>,
    #[serde(default)]
    host_resume_path: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            palette: value
                .palette
                .filter(|palette| !palette.is_empty())
                .unwrap_or(defaults.palette),
            public_url: value.public_url.unwrap_or(defaults.public_url),
            countdown_ticks: value.countdown_ticks.unwrap_or(defaults.countdown_ticks),
            room_code_attempts: value
                .room_code_attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.room_code_attempts),
            transition_timeout: value
                .transition_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.transition_timeout),
            host_resume_path: value.host_resume_path,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in player palette shipped with the binary.
fn default_palette() -> Vec<String> {
    [
        "#ef4444", "#f97316", "#eab308", "#22c55e", "#14b8a6", "#3b82f6", "#8b5cf6", "#ec4899",
        "#a3e635", "#f43f5e",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
