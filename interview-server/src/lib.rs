pub mod api_error;
pub mod callbacks;
pub mod config;
pub mod engine;
pub mod inspect;
pub mod notifier;
pub mod recording;
pub mod repository;

use axum::{response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;

pub use engine::SessionEngine;
pub use recording::RecordingLogger;

pub struct AppState {
    pub engine: SessionEngine,
    /// When set, callbacks must be signed with it.
    pub webhook_secret: Option<String>,
    pub status_auth_token: Option<String>,
    pub recording_logger: Option<RecordingLogger>,
}

pub fn get_server_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Every route the service exposes, with state attached.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/help", get(help_handler))
        .merge(callbacks::callback_router(state.clone()))
        .merge(inspect::inspect_router())
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "interview-server"
    }))
}

async fn help_handler() -> Json<serde_json::Value> {
    Json(json!({
        "service": "interview-server",
        "version": get_server_version(),
        "description": "Tracks interview sessions through callbacks from an external interview system",
        "endpoints": [
            {
                "path": "/health",
                "method": "GET",
                "description": "Health check endpoint",
                "authentication": "None"
            },
            {
                "path": callbacks::SESSION_READY_PATH,
                "method": "POST",
                "description": "Interview room is ready; moves the session to created-pending and notifies the candidate",
                "authentication": "Optional HMAC signature (X-Signature-256)"
            },
            {
                "path": callbacks::STATUS_UPDATE_PATH,
                "method": "POST",
                "description": "Set the session to analyzing-interview, created-pending, completed or failed",
                "authentication": "Optional HMAC signature (X-Signature-256)"
            },
            {
                "path": callbacks::RESULT_PATH,
                "method": "POST",
                "description": "Store the interview result and finalize the session as success-interview",
                "authentication": "Optional HMAC signature (X-Signature-256)"
            },
            {
                "path": "/sessions/:id",
                "method": "GET",
                "description": "Session, stored result and recent lifecycle events",
                "authentication": "Bearer token (STATUS_AUTH_TOKEN)"
            },
            {
                "path": "/help",
                "method": "GET",
                "description": "API documentation and service information",
                "authentication": "None"
            }
        ],
        "configuration": {
            "optional_env_vars": [
                "PORT (default: 3000)",
                "STATE_DIR (default: current directory)",
                "WEBHOOK_SECRET (unset: callbacks are not signature-checked)",
                "NOTIFY_API_URL and NOTIFY_API_KEY (unset: notifications are logged only)",
                "NOTIFY_TEMPLATE (default: interview-ready)",
                "NOTIFY_TIMEOUT_SECS (default: 10)",
                "NOTIFY_REQUEST_TIMEOUT_SECS (default: 30)",
                "STATUS_AUTH_TOKEN (unset: /sessions is disabled)",
                "RECORDING_ENABLED (default: false)",
                "RECORDING_LOG_PATH (default: recordings.jsonl)"
            ]
        }
    }))
}
