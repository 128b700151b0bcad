//! Error taxonomy shared by every entry point.
//!
//! Caller errors (`InvalidRequest`, `NotFound`, `IdentityMismatch`,
//! `InvalidStatus`, `MissingContact`) are raised before any mutation.
//! `PersistFailure` may be raised after an earlier step already committed;
//! `status_committed` says whether the session status was written.
//! Notification failures are not represented here because they never reach
//! the caller.

use thiserror::Error;

use crate::session::SessionId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid request: {reason}")]
    InvalidRequest {
        reason: String,
        candidate_id: Option<String>,
        interview_id: Option<String>,
    },

    #[error(
        "no interview session matches candidate {} or interview {}",
        display_key(candidate_id),
        display_key(interview_id)
    )]
    NotFound {
        candidate_id: Option<String>,
        interview_id: Option<String>,
    },

    #[error("candidate {claimed} does not own session {session_id}")]
    IdentityMismatch {
        session_id: SessionId,
        claimed: String,
        interview_id: Option<String>,
    },

    #[error("invalid status {requested:?}; expected one of {}", valid.join(", "))]
    InvalidStatus {
        requested: String,
        valid: Vec<&'static str>,
        candidate_id: Option<String>,
        interview_id: Option<String>,
    },

    #[error("candidate {candidate_id} has no contact address on file")]
    MissingContact {
        session_id: SessionId,
        candidate_id: String,
        interview_id: Option<String>,
    },

    #[error("failed to {operation}: {message}")]
    PersistFailure {
        operation: String,
        message: String,
        session_id: Option<SessionId>,
        candidate_id: Option<String>,
        interview_id: Option<String>,
        status_committed: bool,
    },
}

fn display_key(key: &Option<String>) -> &str {
    key.as_deref().unwrap_or("<none>")
}

impl EngineError {
    /// Stable machine-readable code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::NotFound { .. } => "not_found",
            Self::IdentityMismatch { .. } => "identity_mismatch",
            Self::InvalidStatus { .. } => "invalid_status",
            Self::MissingContact { .. } => "missing_contact",
            Self::PersistFailure { .. } => "persist_failure",
        }
    }

    /// True for errors caused by the caller's input rather than the engine.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, Self::PersistFailure { .. })
    }

    /// The candidate identifier to echo back to the caller.
    pub fn candidate_id(&self) -> Option<&str> {
        match self {
            Self::InvalidRequest { candidate_id, .. }
            | Self::NotFound { candidate_id, .. }
            | Self::InvalidStatus { candidate_id, .. }
            | Self::PersistFailure { candidate_id, .. } => candidate_id.as_deref(),
            Self::IdentityMismatch { claimed, .. } => Some(claimed),
            Self::MissingContact { candidate_id, .. } => Some(candidate_id),
        }
    }

    /// The external interview identifier to echo back to the caller.
    pub fn interview_id(&self) -> Option<&str> {
        match self {
            Self::InvalidRequest { interview_id, .. }
            | Self::NotFound { interview_id, .. }
            | Self::IdentityMismatch { interview_id, .. }
            | Self::InvalidStatus { interview_id, .. }
            | Self::MissingContact { interview_id, .. }
            | Self::PersistFailure { interview_id, .. } => interview_id.as_deref(),
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::IdentityMismatch { session_id, .. } | Self::MissingContact { session_id, .. } => {
                Some(session_id)
            }
            Self::PersistFailure { session_id, .. } => session_id.as_ref(),
            _ => None,
        }
    }
}
