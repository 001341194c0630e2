use crate::config::TICK_STEP_SECS;
use crate::types::PlaybackState;

/// One ticker step. Reaching the end clamps to `duration` and stops playback
/// in the same step; a paused state is left as is.
pub(crate) fn advance_one_tick(state: &mut PlaybackState) {
    if !state.is_playing {
        return;
    }
    let next_time = state.current_time + TICK_STEP_SECS;
    if next_time >= state.duration {
        state.current_time = state.duration;
        state.is_playing = false;
    } else {
        state.current_time = next_time;
    }
}

/// Formats seconds as `MM:SS`, truncating fractions.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}
