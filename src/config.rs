use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::errors::ConfigError;
use crate::types::SessionId;

// --- Playback Defaults ---
pub const DEFAULT_DURATION_SECS: f64 = 180.0;
pub const DEFAULT_VOLUME: f64 = 0.7;

// --- Ticker Constants ---
// Wall-clock period between ticks; each tick advances current_time by TICK_STEP_SECS.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const TICK_STEP_SECS: f64 = 1.0;

// --- Channel Sizes ---
pub const SESSION_COMMAND_CHAN_SIZE: usize = 32;
/// Per-subscriber queue. Past this backlog a subscriber only keeps the latest state.
pub const SUBSCRIBER_CHAN_SIZE: usize = 64;

// --- Sessions ---
pub const MAX_SESSION_ID_LEN: usize = 128;

// --- Server Defaults ---
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SESSION_ID: &str = "default";

#[derive(Parser, Debug, Clone)]
#[command(name = "playsync")]
#[command(about = "Shared playback-state synchronization service", long_about = None)]
pub struct ServerArgs {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Session served by the unscoped /api/state, /api/control and /ws routes
    #[arg(long, env = "DEFAULT_SESSION", default_value = DEFAULT_SESSION_ID)]
    pub default_session: String,

    /// Duration in seconds for sessions created without one
    #[arg(long, env = "DEFAULT_DURATION", default_value_t = DEFAULT_DURATION_SECS)]
    pub default_duration: f64,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub default_session: SessionId,
    pub default_duration: f64,
}

impl ServerConfig {
    pub fn from_args(args: ServerArgs) -> Result<Self, ConfigError> {
        let addr = format!("{}:{}", args.host, args.port);
        let listen_addr = addr
            .parse()
            .map_err(|source| ConfigError::InvalidListenAddress { addr, source })?;
        let default_session = SessionId::parse(&args.default_session)
            .map_err(ConfigError::InvalidDefaultSession)?;
        if !args.default_duration.is_finite() || args.default_duration < 0.0 {
            return Err(ConfigError::InvalidDefaultDuration(args.default_duration));
        }
        Ok(ServerConfig {
            listen_addr,
            default_session,
            default_duration: args.default_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> ServerArgs {
        let mut argv = vec!["playsync"];
        argv.extend_from_slice(extra);
        ServerArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn parses_explicit_flags() {
        let config = ServerConfig::from_args(args(&[
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--default-session",
            "kitchen",
            "--default-duration",
            "240",
        ]))
        .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.default_session.as_str(), "kitchen");
        assert_eq!(config.default_duration, 240.0);
    }

    #[test]
    fn rejects_unparseable_host() {
        let err = ServerConfig::from_args(args(&["--host", "not a host"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidListenAddress { .. }));
    }

    #[test]
    fn rejects_invalid_default_session() {
        let parsed = args(&["--host", "127.0.0.1", "--default-session", "a b"]);
        let err = ServerConfig::from_args(parsed).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDefaultSession(_)));
    }

    #[test]
    fn rejects_negative_default_duration() {
        let err = ServerConfig::from_args(args(&["--host", "127.0.0.1", "--default-duration=-5"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDefaultDuration(_)));
    }
}
