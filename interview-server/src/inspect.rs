//! Read-only session inspection for operators.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use interview_core::SessionId;

use crate::api_error::ApiError;
use crate::AppState;

pub fn inspect_router() -> Router<Arc<AppState>> {
    Router::new().route("/sessions/:id", get(session_handler))
}

/// Validate the authorization header against the status auth token.
#[allow(clippy::result_large_err)] // Response is large but this is idiomatic in Axum handlers
fn validate_auth(headers: &HeaderMap, auth_token: &Option<String>) -> Result<(), Response> {
    // If no auth token is configured, the endpoint is disabled
    let Some(expected_token) = auth_token else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Session inspection is disabled (STATUS_AUTH_TOKEN not configured)",
        )
            .into_response());
    };

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header.and_then(|value| value.strip_prefix("Bearer ")) {
        Some(provided) if provided == expected_token => Ok(()),
        Some(_) => Err((StatusCode::UNAUTHORIZED, "Invalid token").into_response()),
        None => Err((
            StatusCode::UNAUTHORIZED,
            "Missing or malformed Authorization header. Expected: Bearer <token>",
        )
            .into_response()),
    }
}

async fn session_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(response) = validate_auth(&headers, &state.status_auth_token) {
        return response;
    }

    match state.engine.inspect(&SessionId(id.clone())).await {
        Ok(Some(details)) => Json(details).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("session {} not found", id), "code": "not_found" })),
        )
            .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::Harness;
    use crate::engine::SessionEngine;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn router(h: &Harness, token: Option<&str>) -> Router {
        let state = Arc::new(AppState {
            engine: SessionEngine::new(h.repo.clone(), h.repo.clone(), h.notifier.clone()),
            webhook_secret: None,
            status_auth_token: token.map(str::to_string),
            recording_logger: None,
        });
        crate::app_router(state)
    }

    async fn get(router: &Router, path: &str, auth: Option<&str>) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().uri(path);
        if let Some(auth) = auth {
            request = request.header(header::AUTHORIZATION, auth);
        }
        let response = router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_disabled_without_token() {
        let h = Harness::new();
        let session = h.seed("c1", "e1").await;
        let router = router(&h, None);

        let (status, _) = get(
            &router,
            &format!("/sessions/{}", session.id),
            Some("Bearer anything"),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_rejects_missing_or_wrong_token() {
        let h = Harness::new();
        let session = h.seed("c1", "e1").await;
        let router = router(&h, Some("secret"));
        let path = format!("/sessions/{}", session.id);

        assert_eq!(get(&router, &path, None).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(
            get(&router, &path, Some("Bearer wrong")).await.0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get(&router, &path, Some("secret")).await.0,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_returns_session_with_result_and_events() {
        let h = Harness::new();
        let session = h.seed("c1", "e1").await;
        h.engine
            .submit_result(crate::engine::test_support::payload("c1", "e1"))
            .await
            .unwrap();
        let router = router(&h, Some("secret"));

        let (status, body) = get(
            &router,
            &format!("/sessions/{}", session.id),
            Some("Bearer secret"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["session"]["status"], "success-interview");
        assert_eq!(body["result"]["cost"], 0.42);
        assert_eq!(body["events"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let h = Harness::new();
        let router = router(&h, Some("secret"));

        let (status, body) = get(&router, "/sessions/nope", Some("Bearer secret")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["code"], "not_found");
    }
}
