use crate::errors::PlaybackError;
use crate::types::PlaybackState;

use super::commands::ControlCommand;
use super::time::advance_one_tick;

/// Applies one command to a copy of `state`.
///
/// Pure: the caller decides whether to commit and publish the result. On error
/// the input state is untouched.
pub fn reduce(
    state: &PlaybackState,
    command: ControlCommand,
) -> Result<PlaybackState, PlaybackError> {
    let mut next = state.clone();
    match command {
        ControlCommand::TogglePlay => {
            if next.is_playing {
                stop(&mut next);
            } else {
                start(&mut next);
            }
        }
        ControlCommand::Play => {
            if !next.is_playing {
                start(&mut next);
            }
        }
        ControlCommand::Pause => stop(&mut next),
        ControlCommand::SetVolume(volume) => {
            if !(0.0..=1.0).contains(&volume) {
                return Err(PlaybackError::InvalidArgument(format!(
                    "volume must be within [0, 1] (got {})",
                    volume
                )));
            }
            next.volume = volume;
        }
        ControlCommand::ToggleMute => next.is_muted = !next.is_muted,
        ControlCommand::Reset => {
            next.is_playing = false;
            next.current_time = 0.0;
        }
        ControlCommand::Seek(position) => {
            if !(0.0..=next.duration).contains(&position) {
                return Err(PlaybackError::InvalidArgument(format!(
                    "seek target must be within [0, {}] (got {})",
                    next.duration, position
                )));
            }
            next.current_time = position;
            if next.is_at_end() {
                next.is_playing = false;
            }
        }
        ControlCommand::Tick => advance_one_tick(&mut next),
    }
    Ok(next)
}

fn start(state: &mut PlaybackState) {
    // Nothing to play; starting would break the end-of-track invariant.
    if state.duration <= 0.0 {
        log::debug!("Ignoring start on a zero-length session");
        return;
    }
    // Replay from the top when resumed at the end.
    if state.is_at_end() {
        state.current_time = 0.0;
    }
    state.is_playing = true;
}

fn stop(state: &mut PlaybackState) {
    state.is_playing = false;
}
