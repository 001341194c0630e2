use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot};

use crate::config::SESSION_COMMAND_CHAN_SIZE;
use crate::errors::PlaybackError;
use crate::types::{PlaybackState, SessionId, SessionSummary};

use super::commands::{ControlCommand, SessionCommand};
use super::events::{NotificationHub, Subscription};

// --- State Management ---

struct SessionHandle {
    command_sender: mpsc::Sender<SessionCommand>,
}

/// Owns every session. Each session's state lives in its own actor task, so
/// this map only holds command senders and is never locked across an await.
pub struct StateStore {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
    hub: Arc<NotificationHub>,
    default_duration: f64,
}

impl StateStore {
    pub fn new(default_duration: f64) -> Self {
        StateStore {
            sessions: Mutex::new(HashMap::new()),
            hub: NotificationHub::new(),
            default_duration,
        }
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    fn lock_sessions(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<SessionId, SessionHandle>>, PlaybackError> {
        self.sessions
            .lock()
            .map_err(|e| PlaybackError::LockError(format!("session registry: {}", e)))
    }

    fn get_command_sender(
        &self,
        session_id: &SessionId,
    ) -> Result<mpsc::Sender<SessionCommand>, PlaybackError> {
        self.lock_sessions()?
            .get(session_id)
            .map(|handle| handle.command_sender.clone())
            .ok_or_else(|| PlaybackError::SessionNotFound {
                session_id: session_id.clone(),
            })
    }

    /// Starts a session and its actor. Must be called from within a Tokio runtime.
    pub fn create_session(
        &self,
        session_id: Option<SessionId>,
        duration: Option<f64>,
    ) -> Result<(SessionId, PlaybackState), PlaybackError> {
        let state = PlaybackState::new(duration.unwrap_or(self.default_duration))?;
        let session_id = session_id.unwrap_or_else(SessionId::generate);

        let mut sessions = self.lock_sessions()?;
        if sessions.contains_key(&session_id) {
            return Err(PlaybackError::SessionExists { session_id });
        }
        let (command_sender, command_receiver) = mpsc::channel(SESSION_COMMAND_CHAN_SIZE);
        tokio::spawn(super::run_session(
            session_id.clone(),
            state.clone(),
            command_receiver,
            self.hub.clone(),
        ));
        sessions.insert(session_id.clone(), SessionHandle { command_sender });
        Ok((session_id, state))
    }

    async fn request<T>(
        &self,
        session_id: &SessionId,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, PlaybackError> {
        let sender = self.get_command_sender(session_id)?;
        let closed = || PlaybackError::SessionClosed {
            session_id: session_id.clone(),
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        sender.send(make(reply_tx)).await.map_err(|_| closed())?;
        reply_rx.await.map_err(|_| closed())
    }

    pub async fn get(&self, session_id: &SessionId) -> Result<PlaybackState, PlaybackError> {
        self.request(session_id, SessionCommand::Get).await
    }

    /// Applies `command` serialized with every other command and tick of the
    /// session. Changed states are published before this returns.
    pub async fn apply(
        &self,
        session_id: &SessionId,
        command: ControlCommand,
    ) -> Result<PlaybackState, PlaybackError> {
        self.request(session_id, |reply| SessionCommand::Apply { command, reply })
            .await?
    }

    /// Subscribes through the session actor, so the first delivery is the
    /// state as of this point in the session's command order.
    pub async fn subscribe(&self, session_id: &SessionId) -> Result<Subscription, PlaybackError> {
        self.request(session_id, SessionCommand::Subscribe).await?
    }

    pub async fn sessions(&self) -> Result<Vec<SessionSummary>, PlaybackError> {
        let mut ids: Vec<SessionId> = self.lock_sessions()?.keys().cloned().collect();
        ids.sort();

        let mut summaries = Vec::with_capacity(ids.len());
        for session_id in ids {
            match self.get(&session_id).await {
                Ok(state) => summaries.push(SessionSummary { session_id, state }),
                // Ended between listing and reading.
                Err(
                    PlaybackError::SessionNotFound { .. } | PlaybackError::SessionClosed { .. },
                ) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(summaries)
    }

    /// Stops the session's actor and ends all of its subscriptions.
    pub async fn end_session(&self, session_id: &SessionId) -> Result<(), PlaybackError> {
        let handle = self
            .lock_sessions()?
            .remove(session_id)
            .ok_or_else(|| PlaybackError::SessionNotFound {
                session_id: session_id.clone(),
            })?;
        shutdown_session(session_id, handle).await;
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), PlaybackError> {
        let handles: Vec<(SessionId, SessionHandle)> = self.lock_sessions()?.drain().collect();
        log::info!("Store: shutting down {} session(s)", handles.len());
        for (session_id, handle) in handles {
            shutdown_session(&session_id, handle).await;
        }
        Ok(())
    }
}

async fn shutdown_session(session_id: &SessionId, handle: SessionHandle) {
    let (done_tx, done_rx) = oneshot::channel();
    if let Err(e) = handle
        .command_sender
        .send(SessionCommand::Shutdown(done_tx))
        .await
    {
        log::warn!("Store: session '{}' actor already gone: {}", session_id, e);
        return;
    }
    match done_rx.await {
        Ok(()) => log::info!("Store: session '{}' ended", session_id),
        Err(e) => log::error!(
            "Store: failed to receive shutdown confirmation from session '{}': {}",
            session_id,
            e
        ),
    }
}
