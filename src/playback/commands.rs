use serde::Deserialize;
use tokio::sync::oneshot;

use crate::errors::PlaybackError;
use crate::types::PlaybackState;

use super::events::Subscription;

// --- Control Commands ---

/// A discrete mutation request against one session's state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    TogglePlay,
    Play,
    Pause,
    SetVolume(f64),
    ToggleMute,
    Reset,
    Seek(f64),
    /// Internal, produced by the session ticker only.
    Tick,
}

impl ControlCommand {
    /// Builds a command from its wire name and optional numeric argument.
    ///
    /// `tick` is deliberately not accepted here: ticks only come from the
    /// session's own ticker.
    pub fn from_action(action: &str, value: Option<f64>) -> Result<Self, PlaybackError> {
        let require_value = |name: &str| {
            value.ok_or_else(|| {
                PlaybackError::InvalidArgument(format!("'{}' requires a numeric value", name))
            })
        };
        match action {
            "togglePlay" => Ok(ControlCommand::TogglePlay),
            "play" => Ok(ControlCommand::Play),
            "pause" => Ok(ControlCommand::Pause),
            "setVolume" => Ok(ControlCommand::SetVolume(require_value(action)?)),
            "toggleMute" => Ok(ControlCommand::ToggleMute),
            "reset" => Ok(ControlCommand::Reset),
            "seek" | "setPosition" => Ok(ControlCommand::Seek(require_value(action)?)),
            other => Err(PlaybackError::UnsupportedCommand(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ControlCommand::TogglePlay => "togglePlay",
            ControlCommand::Play => "play",
            ControlCommand::Pause => "pause",
            ControlCommand::SetVolume(_) => "setVolume",
            ControlCommand::ToggleMute => "toggleMute",
            ControlCommand::Reset => "reset",
            ControlCommand::Seek(_) => "seek",
            ControlCommand::Tick => "tick",
        }
    }
}

/// Body of `POST .../control`.
#[derive(Deserialize, Debug, Clone)]
pub struct ControlRequest {
    pub action: String,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Inbound push-channel frame, `{ "type": "...", "data": ... }`.
#[derive(Deserialize, Debug, Clone)]
pub struct SocketCommand {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<f64>,
}

impl TryFrom<ControlRequest> for ControlCommand {
    type Error = PlaybackError;

    fn try_from(request: ControlRequest) -> Result<Self, Self::Error> {
        ControlCommand::from_action(&request.action, request.value)
    }
}

impl TryFrom<SocketCommand> for ControlCommand {
    type Error = PlaybackError;

    fn try_from(message: SocketCommand) -> Result<Self, Self::Error> {
        ControlCommand::from_action(&message.kind, message.data)
    }
}

// --- Session Actor Messages ---

#[derive(Debug)]
pub enum SessionCommand {
    Apply {
        command: ControlCommand,
        reply: oneshot::Sender<Result<PlaybackState, PlaybackError>>,
    },
    Get(oneshot::Sender<PlaybackState>),
    Subscribe(oneshot::Sender<Result<Subscription, PlaybackError>>),
    Shutdown(oneshot::Sender<()>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_wire_action() {
        assert_eq!(
            ControlCommand::from_action("togglePlay", None),
            Ok(ControlCommand::TogglePlay)
        );
        assert_eq!(ControlCommand::from_action("play", None), Ok(ControlCommand::Play));
        assert_eq!(ControlCommand::from_action("pause", None), Ok(ControlCommand::Pause));
        assert_eq!(
            ControlCommand::from_action("setVolume", Some(0.4)),
            Ok(ControlCommand::SetVolume(0.4))
        );
        assert_eq!(
            ControlCommand::from_action("toggleMute", None),
            Ok(ControlCommand::ToggleMute)
        );
        assert_eq!(ControlCommand::from_action("reset", None), Ok(ControlCommand::Reset));
        assert_eq!(
            ControlCommand::from_action("seek", Some(12.0)),
            Ok(ControlCommand::Seek(12.0))
        );
        assert_eq!(
            ControlCommand::from_action("setPosition", Some(3.0)),
            Ok(ControlCommand::Seek(3.0))
        );
    }

    #[test]
    fn value_is_required_for_set_volume_and_seek() {
        assert!(matches!(
            ControlCommand::from_action("setVolume", None),
            Err(PlaybackError::InvalidArgument(_))
        ));
        assert!(matches!(
            ControlCommand::from_action("seek", None),
            Err(PlaybackError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unknown_and_internal_actions_are_unsupported() {
        assert_eq!(
            ControlCommand::from_action("rewind", None),
            Err(PlaybackError::UnsupportedCommand("rewind".to_string()))
        );
        assert_eq!(
            ControlCommand::from_action("tick", None),
            Err(PlaybackError::UnsupportedCommand("tick".to_string()))
        );
    }

    #[test]
    fn decodes_control_and_socket_payloads() {
        let request: ControlRequest =
            serde_json::from_str(r#"{"action":"setVolume","value":0.25}"#).unwrap();
        assert_eq!(
            ControlCommand::try_from(request),
            Ok(ControlCommand::SetVolume(0.25))
        );

        let request: ControlRequest = serde_json::from_str(r#"{"action":"reset"}"#).unwrap();
        assert_eq!(ControlCommand::try_from(request), Ok(ControlCommand::Reset));

        let message: SocketCommand =
            serde_json::from_str(r#"{"type":"setPosition","data":90}"#).unwrap();
        assert_eq!(ControlCommand::try_from(message), Ok(ControlCommand::Seek(90.0)));
    }
}
