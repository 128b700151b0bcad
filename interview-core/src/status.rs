//! Session status values and their wire encoding.
//!
//! The string forms are what external callers send and what the store
//! persists, so they must never change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Scheduled by the upstream system, no call URL yet.
    #[serde(rename = "pending")]
    Pending,
    /// The call URL is known and the candidate has been invited.
    #[serde(rename = "created-pending")]
    CreatedPending,
    #[serde(rename = "analyzing-interview")]
    AnalyzingInterview,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    /// Final results were submitted. Set only by result ingestion.
    #[serde(rename = "success-interview")]
    SuccessInterview,
}

/// Targets accepted by the generic status update entry point, in the order
/// they are reported back to callers.
pub const UPDATE_TARGETS: [SessionStatus; 4] = [
    SessionStatus::AnalyzingInterview,
    SessionStatus::CreatedPending,
    SessionStatus::Completed,
    SessionStatus::Failed,
];

impl SessionStatus {
    pub const ALL: [SessionStatus; 6] = [
        SessionStatus::Pending,
        SessionStatus::CreatedPending,
        SessionStatus::AnalyzingInterview,
        SessionStatus::Completed,
        SessionStatus::Failed,
        SessionStatus::SuccessInterview,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::CreatedPending => "created-pending",
            Self::AnalyzingInterview => "analyzing-interview",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::SuccessInterview => "success-interview",
        }
    }

    /// Whether a caller may request this status through a generic update.
    pub fn is_update_target(&self) -> bool {
        UPDATE_TARGETS.contains(self)
    }

    /// The wire names of [`UPDATE_TARGETS`].
    pub fn update_target_names() -> Vec<&'static str> {
        UPDATE_TARGETS.iter().map(SessionStatus::as_str).collect()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown session status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for SessionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
