use serde::Serialize;

use crate::config::{DEFAULT_VOLUME, MAX_SESSION_ID_LEN};
use crate::errors::PlaybackError;

// --- State Definitions ---

/// Authoritative playback record of one session.
///
/// `0 <= current_time <= duration` and `0 <= volume <= 1` hold for every value
/// produced by the command processor, and `current_time == duration` implies
/// `!is_playing`.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub volume: f64,
    pub is_muted: bool,
    pub current_time: f64,
    pub duration: f64,
}

impl PlaybackState {
    pub fn new(duration: f64) -> Result<Self, PlaybackError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(PlaybackError::InvalidArgument(format!(
                "duration must be a finite, non-negative number of seconds (got {})",
                duration
            )));
        }
        Ok(PlaybackState {
            is_playing: false,
            volume: DEFAULT_VOLUME,
            is_muted: false,
            current_time: 0.0,
            duration,
        })
    }

    pub fn is_at_end(&self) -> bool {
        self.current_time >= self.duration
    }
}

// --- Session Identity ---

/// Built only through [`SessionId::parse`] or [`SessionId::generate`].
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(raw: &str) -> Result<Self, PlaybackError> {
        let valid_chars = raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if raw.is_empty() || raw.len() > MAX_SESSION_ID_LEN || !valid_chars {
            return Err(PlaybackError::InvalidArgument(format!(
                "invalid session id '{}': expected 1-{} characters of [A-Za-z0-9_-]",
                raw, MAX_SESSION_ID_LEN
            )));
        }
        Ok(SessionId(raw.to_string()))
    }

    pub fn generate() -> Self {
        SessionId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub state: PlaybackState,
}
