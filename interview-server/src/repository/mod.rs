//! Repository abstraction for session persistence.
//!
//! `SessionRepository` is the only shared mutable resource in the service.
//! Entry points hold no state between calls; everything they need is read
//! from here, so any number of requests can run concurrently. Concurrent
//! writes to the same session are last-write-wins.
//!
//! `ContactDirectory` is the profile lookup used by the notifier. Both
//! backends implement it against their own profile table.

mod memory;
mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use interview_core::{
    CandidateId, CandidateProfile, InterviewId, InterviewResult, ResultId, Session, SessionEvent,
    SessionId, SessionStatus,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("storage error during {operation}: {message}")]
    Storage { operation: String, message: String },

    #[error("corrupt {what} in database")]
    Corruption { what: String },

    /// A uniqueness constraint rejected the write.
    #[error("{what} already exists")]
    Conflict { what: String },
}

impl RepositoryError {
    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn corruption(what: impl Into<String>) -> Self {
        Self::Corruption { what: what.into() }
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict { what: what.into() }
    }
}

/// Outcome of inserting a result.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultInsert {
    Created(InterviewResult),
    /// The session already had a result; the stored one is returned and the
    /// new record was discarded.
    Existing(InterviewResult),
}

impl ResultInsert {
    pub fn result(&self) -> &InterviewResult {
        match self {
            Self::Created(result) | Self::Existing(result) => result,
        }
    }

    pub fn into_result(self) -> InterviewResult {
        match self {
            Self::Created(result) | Self::Existing(result) => result,
        }
    }

    pub fn is_existing(&self) -> bool {
        matches!(self, Self::Existing(_))
    }
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a new session. Sessions are created upstream; this exists for
    /// that collaborator and for tests.
    ///
    /// Fails with `Conflict` if the external interview id is already taken.
    async fn insert_session(&self, session: &Session) -> Result<(), RepositoryError>;

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError>;

    /// Every session whose candidate equals `candidate` OR whose external
    /// interview id equals `interview`, most recently updated first.
    async fn find_matching(
        &self,
        candidate: Option<&CandidateId>,
        interview: Option<&InterviewId>,
    ) -> Result<Vec<Session>, RepositoryError>;

    /// Write a new status, and the interview URL when one is given. Returns
    /// the updated row, or `None` if the session no longer exists.
    async fn update_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
        interview_url: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Session>, RepositoryError>;

    /// Point the session at its result.
    async fn set_result_id(
        &self,
        id: &SessionId,
        result_id: &ResultId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Insert a result unless the session already has one.
    async fn insert_result(&self, result: &InterviewResult)
        -> Result<ResultInsert, RepositoryError>;

    async fn get_result(&self, id: &ResultId) -> Result<Option<InterviewResult>, RepositoryError>;

    async fn get_result_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<InterviewResult>, RepositoryError>;

    async fn log_event(&self, event: &SessionEvent) -> Result<(), RepositoryError>;

    /// Newest first.
    async fn get_session_events(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<SessionEvent>, RepositoryError>;
}

#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn get_profile(
        &self,
        candidate: &CandidateId,
    ) -> Result<Option<CandidateProfile>, RepositoryError>;

    async fn upsert_profile(&self, profile: &CandidateProfile) -> Result<(), RepositoryError>;
}

/// Milliseconds since the epoch, the on-disk timestamp format.
pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64, what: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| RepositoryError::corruption(what))
}
