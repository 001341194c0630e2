use thiserror::Error;

use crate::types::SessionId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unsupported command '{0}'")]
    UnsupportedCommand(String),
    #[error("Session '{session_id}' not found")]
    SessionNotFound { session_id: SessionId },
    #[error("Session '{session_id}' already exists")]
    SessionExists { session_id: SessionId },
    #[error("Session '{session_id}' backs the default routes and cannot be ended")]
    DefaultSessionPinned { session_id: SessionId },
    #[error("Session '{session_id}' is no longer running")]
    SessionClosed { session_id: SessionId },
    #[error("Failed to lock {0}")]
    LockError(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid listen address '{addr}': {source}")]
    InvalidListenAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("Invalid default session: {0}")]
    InvalidDefaultSession(PlaybackError),
    #[error("Invalid default duration {0}: must be a finite, non-negative number of seconds")]
    InvalidDefaultDuration(f64),
}

impl From<PlaybackError> for String {
    fn from(err: PlaybackError) -> String {
        err.to_string()
    }
}
