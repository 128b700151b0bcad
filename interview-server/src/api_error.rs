//! HTTP mapping for engine errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, info};

use interview_core::EngineError;

/// An `EngineError` on its way out as a response.
///
/// Caller errors keep their full message. Persistence failures are logged
/// here and answered with the failed operation only, never the storage
/// error text.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    error: String,
    code: &'static str,
    candidate_id: Option<&'a str>,
    interview_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_statuses: Option<&'a [&'static str]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_committed: Option<bool>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::PersistFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::InvalidRequest { .. }
            | EngineError::IdentityMismatch { .. }
            | EngineError::InvalidStatus { .. }
            | EngineError::MissingContact { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = &self.0;
        if err.is_caller_error() {
            info!("Rejected request ({}): {}", err.code(), err);
        } else {
            error!("Request failed: {}", err);
        }

        let (message, valid_statuses, status_committed) = match err {
            EngineError::InvalidStatus { valid, .. } => {
                (err.to_string(), Some(valid.as_slice()), None)
            }
            EngineError::PersistFailure {
                operation,
                status_committed,
                ..
            } => (
                format!("failed to {}", operation),
                None,
                Some(*status_committed),
            ),
            _ => (err.to_string(), None, None),
        };

        let body = ErrorBody {
            error: message,
            code: err.code(),
            candidate_id: err.candidate_id(),
            interview_id: err.interview_id(),
            valid_statuses,
            status_committed,
        };

        (self.status_code(), Json(body)).into_response()
    }
}
