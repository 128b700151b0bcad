//! In-memory implementation of `SessionRepository` and `ContactDirectory`.
//!
//! Same observable behavior as the SQLite backend, including the uniqueness
//! rules, but everything is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use interview_core::{
    CandidateId, CandidateProfile, InterviewId, InterviewResult, ResultId, Session, SessionEvent,
    SessionId, SessionStatus,
};

use super::{ContactDirectory, RepositoryError, ResultInsert, SessionRepository};

#[derive(Default)]
struct Tables {
    sessions: HashMap<SessionId, Session>,
    results: HashMap<ResultId, InterviewResult>,
    events: Vec<SessionEvent>,
}

/// In-memory repository.
///
/// All tables sit behind one `RwLock` so a result insert and its uniqueness
/// check happen atomically, as they do under SQLite's unique index.
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    profiles: RwLock<HashMap<CandidateId, CandidateProfile>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            profiles: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn insert_session(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.sessions.contains_key(&session.id) {
            return Err(RepositoryError::conflict(format!("session {}", session.id)));
        }
        if tables
            .sessions
            .values()
            .any(|s| s.external_interview_id == session.external_interview_id)
        {
            return Err(RepositoryError::conflict(format!(
                "session for interview {}",
                session.external_interview_id
            )));
        }
        tables.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.sessions.get(id).cloned())
    }

    async fn find_matching(
        &self,
        candidate: Option<&CandidateId>,
        interview: Option<&InterviewId>,
    ) -> Result<Vec<Session>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Session> = tables
            .sessions
            .values()
            .filter(|s| {
                candidate.is_some_and(|c| *c == s.candidate_id)
                    || interview.is_some_and(|i| *i == s.external_interview_id)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn update_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
        interview_url: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Session>, RepositoryError> {
        let mut tables = self.tables.write().await;
        Ok(tables.sessions.get_mut(id).map(|session| {
            session.status = status;
            if let Some(url) = interview_url {
                session.interview_url = Some(url.to_string());
            }
            session.updated_at = updated_at;
            session.clone()
        }))
    }

    async fn set_result_id(
        &self,
        id: &SessionId,
        result_id: &ResultId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(id)
            .ok_or_else(|| RepositoryError::storage("set_result_id", format!("no session {}", id)))?;
        session.result_id = Some(result_id.clone());
        session.updated_at = updated_at;
        Ok(())
    }

    async fn insert_result(
        &self,
        result: &InterviewResult,
    ) -> Result<ResultInsert, RepositoryError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .results
            .values()
            .find(|r| r.session_id == result.session_id)
        {
            return Ok(ResultInsert::Existing(existing.clone()));
        }
        if tables.results.contains_key(&result.id) {
            return Err(RepositoryError::conflict(format!("result {}", result.id)));
        }
        tables.results.insert(result.id.clone(), result.clone());
        Ok(ResultInsert::Created(result.clone()))
    }

    async fn get_result(&self, id: &ResultId) -> Result<Option<InterviewResult>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.results.get(id).cloned())
    }

    async fn get_result_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<InterviewResult>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .results
            .values()
            .find(|r| r.session_id == *session_id)
            .cloned())
    }

    async fn log_event(&self, event: &SessionEvent) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let id = tables.events.len() as i64 + 1;
        tables.events.push(SessionEvent {
            id,
            ..event.clone()
        });
        Ok(())
    }

    async fn get_session_events(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<SessionEvent>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut events: Vec<SessionEvent> = tables
            .events
            .iter()
            .filter(|e| e.session_id == *session_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        events.truncate(limit);
        Ok(events)
    }
}

#[async_trait]
impl ContactDirectory for InMemoryRepository {
    async fn get_profile(
        &self,
        candidate: &CandidateId,
    ) -> Result<Option<CandidateProfile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(candidate).cloned())
    }

    async fn upsert_profile(&self, profile: &CandidateProfile) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.candidate_id.clone(), profile.clone());
        Ok(())
    }
}
