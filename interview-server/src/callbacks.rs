//! Inbound callbacks from the interview system.
//!
//! Every callback passes through `verify_and_record` first, which enforces
//! the body limit, checks the HMAC signature when a secret is configured,
//! and records the request when recording is on.

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Json, Response},
    routing::post,
    Extension, Router,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use interview_core::recording::{
    CorrelationId, Direction, EventType, RecordedEvent, Sanitizer, CORRELATION_ID_HEADER,
};
use interview_core::signature::{verify_signature, SIGNATURE_HEADER};
use interview_core::{EngineError, ResultPayload};

use crate::api_error::ApiError;
use crate::engine::{
    ResultSubmittedResponse, SessionReadyRequest, SessionReadyResponse, StatusUpdateRequest,
    StatusUpdateResponse,
};
use crate::AppState;

/// Result payloads carry full transcripts and message logs.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub const SESSION_READY_PATH: &str = "/callbacks/session-ready";
pub const STATUS_UPDATE_PATH: &str = "/callbacks/status-update";
pub const RESULT_PATH: &str = "/callbacks/result";

pub fn callback_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(SESSION_READY_PATH, post(session_ready_handler))
        .route(STATUS_UPDATE_PATH, post(status_update_handler))
        .route(RESULT_PATH, post(result_handler))
        .route_layer(middleware::from_fn_with_state(state, verify_and_record))
        // The `Bytes` extractors would otherwise stop at axum's 2 MB default.
        .route_layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

async fn verify_and_record(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| {
            warn!("Rejected callback body over {} bytes", MAX_BODY_BYTES);
            StatusCode::PAYLOAD_TOO_LARGE
        })?;

    if let Some(secret) = state.webhook_secret.as_deref() {
        let signature = parts
            .headers
            .get(SIGNATURE_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                warn!("Callback to {} without signature", parts.uri.path());
                StatusCode::UNAUTHORIZED
            })?;

        if !verify_signature(secret, &bytes, signature) {
            error!("Invalid callback signature for {}", parts.uri.path());
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    // Reuse the caller's correlation ID so their logs line up with ours.
    let correlation_id = CorrelationId(
        parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
    );

    if let Some(ref logger) = state.recording_logger {
        let body = serde_json::from_slice::<serde_json::Value>(&bytes)
            .map(|v| Sanitizer::sanitize_json(&v))
            .unwrap_or(serde_json::Value::Null);
        logger.record(RecordedEvent {
            timestamp: chrono::Utc::now().to_rfc3339(),
            correlation_id: correlation_id.0.clone(),
            event_type: EventType::CallbackReceived,
            direction: Direction::Request,
            operation: operation_name(parts.uri.path()).to_string(),
            data: serde_json::json!({
                "headers": Sanitizer::sanitize_headers(&headers_to_hashmap(&parts.headers)),
                "body": body,
            }),
            metadata: HashMap::new(),
        });
    }

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(correlation_id);

    Ok(next.run(request).await)
}

fn operation_name(path: &str) -> &str {
    match path {
        SESSION_READY_PATH => "session_ready",
        STATUS_UPDATE_PATH => "status_update",
        RESULT_PATH => "result_submitted",
        other => other,
    }
}

fn headers_to_hashmap(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (name, value) in headers {
        if let Ok(value_str) = value.to_str() {
            map.insert(name.to_string(), value_str.to_string());
        }
    }
    map
}

/// Decode a JSON body, reporting malformed input the same way as any other
/// caller error.
fn parse_body<T: DeserializeOwned>(bytes: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(bytes).map_err(|e| {
        ApiError(EngineError::InvalidRequest {
            reason: format!("malformed JSON body: {}", e),
            candidate_id: None,
            interview_id: None,
        })
    })
}

async fn session_ready_handler(
    State(state): State<Arc<AppState>>,
    Extension(correlation_id): Extension<CorrelationId>,
    body: Bytes,
) -> Result<Json<SessionReadyResponse>, ApiError> {
    let request: SessionReadyRequest = parse_body(&body)?;
    info!(
        "Session ready callback for interview {:?}",
        request.interview_id
    );
    let response = state
        .engine
        .session_ready(request, Some(&correlation_id.0))
        .await?;
    Ok(Json(response))
}

async fn status_update_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<StatusUpdateResponse>, ApiError> {
    let request: StatusUpdateRequest = parse_body(&body)?;
    info!(
        "Status update callback for interview {:?}: {:?}",
        request.interview_id, request.status
    );
    let response = state.engine.update_status(request).await?;
    Ok(Json(response))
}

async fn result_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ResultSubmittedResponse>, ApiError> {
    let payload: ResultPayload = parse_body(&body)?;
    info!(
        "Result callback for interview {:?} ({} bytes)",
        payload.interview_id,
        body.len()
    );
    let response = state.engine.submit_result(payload).await?;
    Ok(Json(response))
}
