use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::TICK_INTERVAL;
use crate::errors::PlaybackError;
use crate::types::{PlaybackState, SessionId};

pub mod commands;
use commands::{ControlCommand, SessionCommand};
pub mod events;
use events::NotificationHub;
pub mod handlers;
pub mod state;
pub mod time;

// --- Session Actor ---

/// Sole owner of one session's state. Everything that mutates it, ticks
/// included, goes through `apply`.
struct SessionActor {
    session_id: SessionId,
    state: PlaybackState,
    hub: Arc<NotificationHub>,
}

impl SessionActor {
    fn apply(&mut self, command: ControlCommand) -> Result<PlaybackState, PlaybackError> {
        let next = handlers::reduce(&self.state, command).inspect_err(|e| {
            log::debug!("Session '{}': rejected {}: {}", self.session_id, command.name(), e);
        })?;
        if next == self.state {
            return Ok(next);
        }

        if self.state.is_playing && !next.is_playing && next.is_at_end() {
            log::info!(
                "Session '{}': reached end at {}",
                self.session_id,
                time::format_time(next.current_time)
            );
        }
        self.state = next.clone();

        if let Err(e) = self.hub.publish(&self.session_id, &self.state) {
            log::error!("Session '{}': failed to publish update: {}", self.session_id, e);
        }
        Ok(next)
    }
}

pub(crate) async fn run_session(
    session_id: SessionId,
    initial_state: PlaybackState,
    mut receiver: mpsc::Receiver<SessionCommand>,
    hub: Arc<NotificationHub>,
) {
    log::info!(
        "Session '{}': started (duration {})",
        session_id,
        time::format_time(initial_state.duration)
    );
    let mut actor = SessionActor {
        session_id,
        state: initial_state,
        hub,
    };

    let mut ticker = tokio::time::interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown_ack = None;

    loop {
        tokio::select! {
            maybe_command = receiver.recv() => {
                match maybe_command {
                    Some(SessionCommand::Apply { command, reply }) => {
                        log::debug!("Session '{}' received: {:?}", actor.session_id, command);
                        let was_playing = actor.state.is_playing;
                        let result = actor.apply(command);
                        if !was_playing && actor.state.is_playing {
                            // First tick lands one full period after the start.
                            ticker.reset();
                        }
                        // The caller may have gone away; the state is committed regardless.
                        let _ = reply.send(result);
                    }
                    Some(SessionCommand::Get(reply)) => {
                        let _ = reply.send(actor.state.clone());
                    }
                    Some(SessionCommand::Subscribe(reply)) => {
                        let subscription = actor.hub.subscribe(&actor.session_id, &actor.state);
                        let _ = reply.send(subscription);
                    }
                    Some(SessionCommand::Shutdown(done)) => {
                        log::info!("Session '{}': shutdown received", actor.session_id);
                        shutdown_ack = Some(done);
                        break;
                    }
                    None => {
                        log::info!("Session '{}': command channel closed", actor.session_id);
                        break;
                    }
                }
            }
            _ = ticker.tick(), if actor.state.is_playing => {
                log::trace!("Session '{}': tick at {}", actor.session_id, actor.state.current_time);
                if let Err(e) = actor.apply(ControlCommand::Tick) {
                    log::error!("Session '{}': tick failed: {}", actor.session_id, e);
                }
            }
        }
    }

    if let Err(e) = actor.hub.close_session(&actor.session_id) {
        log::error!("Session '{}': failed to close subscribers: {}", actor.session_id, e);
    }
    if let Some(done) = shutdown_ack {
        if done.send(()).is_err() {
            log::warn!("Session '{}': shutdown requester went away", actor.session_id);
        }
    }
    log::info!("Session '{}': stopped", actor.session_id);
}
