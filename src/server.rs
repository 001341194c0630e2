use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::config::ServerConfig;
use crate::errors::PlaybackError;
use crate::playback::state::StateStore;
use crate::types::SessionId;

mod routes;
mod ws;

// --- Shared Server State ---

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<StateStore>,
    pub default_session: SessionId,
}

impl AppState {
    pub fn new(store: Arc<StateStore>, default_session: SessionId) -> Self {
        AppState {
            store,
            default_session,
        }
    }
}

// --- Error Payloads ---

#[derive(Serialize, Clone, Debug)]
pub struct ErrorPayload {
    pub error: String,
}

/// Request-path failure rendered as `{ "error": ... }` with a matching status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<PlaybackError> for ApiError {
    fn from(err: PlaybackError) -> Self {
        let status = match &err {
            PlaybackError::InvalidArgument(_) | PlaybackError::UnsupportedCommand(_) => {
                StatusCode::BAD_REQUEST
            }
            PlaybackError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            PlaybackError::SessionExists { .. } | PlaybackError::DefaultSessionPinned { .. } => {
                StatusCode::CONFLICT
            }
            PlaybackError::SessionClosed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            PlaybackError::LockError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: format!("Invalid request body: {}", rejection.body_text()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: format!("Invalid request body: {}", err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            log::error!("API: {} {}", self.status, self.message);
        } else {
            log::debug!("API: {} {}", self.status, self.message);
        }
        (self.status, Json(ErrorPayload { error: self.message })).into_response()
    }
}

// --- Router ---

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/sessions", get(routes::list_sessions).post(routes::create_session))
        .route("/api/sessions/{session_id}", delete(routes::end_session))
        .route("/api/sessions/{session_id}/state", get(routes::get_state))
        .route("/api/sessions/{session_id}/control", post(routes::control))
        .route("/api/sessions/{session_id}/ws", get(ws::session_ws_handler))
        // Single-session routes of the original wire contract.
        .route("/api/state", get(routes::get_default_state))
        .route("/api/control", post(routes::control_default))
        .route("/ws", get(ws::default_ws_handler))
        .with_state(state)
}

/// Creates the default session, then serves until Ctrl-C / SIGTERM.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let store = Arc::new(StateStore::new(config.default_duration));
    store.create_session(Some(config.default_session.clone()), None)?;
    let app = build_router(AppState::new(store.clone(), config.default_session.clone()));

    log::info!(
        "Server starting on http://{} (default session '{}')",
        config.listen_addr,
        config.default_session
    );
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    let shutdown_store = store.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Ends every session first so open push channels close.
            if let Err(e) = shutdown_store.shutdown().await {
                log::error!("Failed to shut sessions down cleanly: {}", e);
            }
        })
        .await?;

    log::info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Ctrl-C received, shutting down."),
        _ = terminate => log::info!("SIGTERM received, shutting down."),
    }
}
