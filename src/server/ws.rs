use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};

use crate::playback::commands::{ControlCommand, SocketCommand};
use crate::playback::events::Subscription;
use crate::playback::state::StateStore;
use crate::types::SessionId;

use super::{ApiError, AppState, ErrorPayload};

pub(super) async fn session_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let session_id = SessionId::parse(&session_id)?;
    upgrade(ws, state.store, session_id).await
}

pub(super) async fn default_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    upgrade(ws, state.store, state.default_session).await
}

// Subscribing before the upgrade lets an unknown session fail with a 404.
async fn upgrade(
    ws: WebSocketUpgrade,
    store: Arc<StateStore>,
    session_id: SessionId,
) -> Result<Response, ApiError> {
    let subscription = store.subscribe(&session_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, store, subscription)))
}

async fn handle_socket(socket: WebSocket, store: Arc<StateStore>, mut subscription: Subscription) {
    let session_id = subscription.session_id().clone();
    log::info!("WS: client connected to session '{}'", session_id);
    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            update = subscription.recv() => {
                let Some(state) = update else {
                    log::info!("WS: session '{}' ended, closing socket", session_id);
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                };
                if let Err(e) = send_json(&mut ws_sender, &state).await {
                    log::warn!("WS: write to client of session '{}' failed: {}", session_id, e);
                    break;
                }
            }
            inbound = ws_receiver.next() => {
                let text = match inbound {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            log::debug!("WS: ignoring non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        log::debug!("WS: close received for session '{}'", session_id);
                        break;
                    }
                    // Ping/pong are answered by the protocol layer.
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                    Some(Err(e)) => {
                        log::warn!(
                            "WS: read from client of session '{}' failed: {}",
                            session_id,
                            e
                        );
                        break;
                    }
                };
                // Successful commands reach this client through its subscription.
                if let Err(message) = apply_inbound(&store, &session_id, &text).await {
                    let payload = ErrorPayload { error: message };
                    if let Err(e) = send_json(&mut ws_sender, &payload).await {
                        log::warn!("WS: write to client of session '{}' failed: {}", session_id, e);
                        break;
                    }
                }
            }
        }
    }

    subscription.unsubscribe();
    log::info!("WS: client disconnected from session '{}'", session_id);
}

async fn apply_inbound(
    store: &StateStore,
    session_id: &SessionId,
    text: &str,
) -> Result<(), String> {
    let message: SocketCommand =
        serde_json::from_str(text).map_err(|e| format!("Invalid message: {}", e))?;
    let command = ControlCommand::try_from(message)?;
    store.apply(session_id, command).await?;
    Ok(())
}

async fn send_json<T: serde::Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    payload: &T,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(payload).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}
