use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

use crate::errors::PlaybackError;
use crate::playback::commands::{ControlCommand, ControlRequest};
use crate::types::{PlaybackState, SessionId, SessionSummary};

use super::{ApiError, AppState};

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateSessionRequest {
    session_id: Option<String>,
    duration: Option<f64>,
}

pub(super) async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    Ok(Json(state.store.sessions().await?))
}

/// `POST /api/sessions`; an empty body creates a session with a generated id
/// and the default duration.
pub(super) async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionSummary>), ApiError> {
    let request: CreateSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    let session_id = request
        .session_id
        .as_deref()
        .map(SessionId::parse)
        .transpose()?;

    let (session_id, playback) = state.store.create_session(session_id, request.duration)?;
    log::info!("API: created session '{}'", session_id);
    Ok((
        StatusCode::CREATED,
        Json(SessionSummary {
            session_id,
            state: playback,
        }),
    ))
}

pub(super) async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session_id = SessionId::parse(&session_id)?;
    // `/api/state`, `/api/control` and `/ws` depend on it for the server's lifetime.
    if session_id == state.default_session {
        return Err(PlaybackError::DefaultSessionPinned { session_id }.into());
    }
    state.store.end_session(&session_id).await?;
    log::info!("API: ended session '{}'", session_id);
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn get_state(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<PlaybackState>, ApiError> {
    let session_id = SessionId::parse(&session_id)?;
    Ok(Json(state.store.get(&session_id).await?))
}

pub(super) async fn control(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Result<Json<ControlRequest>, JsonRejection>,
) -> Result<Json<PlaybackState>, ApiError> {
    let session_id = SessionId::parse(&session_id)?;
    apply_control(&state, &session_id, payload).await
}

pub(super) async fn get_default_state(
    State(state): State<AppState>,
) -> Result<Json<PlaybackState>, ApiError> {
    Ok(Json(state.store.get(&state.default_session).await?))
}

pub(super) async fn control_default(
    State(state): State<AppState>,
    payload: Result<Json<ControlRequest>, JsonRejection>,
) -> Result<Json<PlaybackState>, ApiError> {
    apply_control(&state, &state.default_session, payload).await
}

async fn apply_control(
    state: &AppState,
    session_id: &SessionId,
    payload: Result<Json<ControlRequest>, JsonRejection>,
) -> Result<Json<PlaybackState>, ApiError> {
    let Json(request) = payload?;
    log::debug!("API: control '{}' for session '{}'", request.action, session_id);
    let command = ControlCommand::try_from(request)?;
    Ok(Json(state.store.apply(session_id, command).await?))
}
