//! Shared fixtures for engine and router tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use interview_core::{
    CandidateId, CandidateProfile, InterviewId, InterviewResult, ResultId, ResultPayload, Session,
    SessionEvent, SessionId, SessionStatus,
};

use super::SessionEngine;
use crate::notifier::test_support::FakeNotifier;
use crate::repository::{
    ContactDirectory, InMemoryRepository, RepositoryError, ResultInsert, SessionRepository,
};

/// In-memory repository that can be told to fail named operations.
#[derive(Default)]
pub struct FlakyRepository {
    pub inner: InMemoryRepository,
    failing: Mutex<HashSet<&'static str>>,
}

impl FlakyRepository {
    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn heal(&self, operation: &'static str) {
        self.failing.lock().unwrap().remove(operation);
    }

    fn check(&self, operation: &'static str) -> Result<(), RepositoryError> {
        if self.failing.lock().unwrap().contains(operation) {
            Err(RepositoryError::storage(operation, "injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionRepository for FlakyRepository {
    async fn insert_session(&self, session: &Session) -> Result<(), RepositoryError> {
        self.check("insert_session")?;
        self.inner.insert_session(session).await
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        self.check("get_session")?;
        self.inner.get_session(id).await
    }

    async fn find_matching(
        &self,
        candidate: Option<&CandidateId>,
        interview: Option<&InterviewId>,
    ) -> Result<Vec<Session>, RepositoryError> {
        self.check("find_matching")?;
        self.inner.find_matching(candidate, interview).await
    }

    async fn update_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
        interview_url: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Session>, RepositoryError> {
        self.check("update_status")?;
        self.inner
            .update_status(id, status, interview_url, updated_at)
            .await
    }

    async fn set_result_id(
        &self,
        id: &SessionId,
        result_id: &ResultId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.check("set_result_id")?;
        self.inner.set_result_id(id, result_id, updated_at).await
    }

    async fn insert_result(
        &self,
        result: &InterviewResult,
    ) -> Result<ResultInsert, RepositoryError> {
        self.check("insert_result")?;
        self.inner.insert_result(result).await
    }

    async fn get_result(&self, id: &ResultId) -> Result<Option<InterviewResult>, RepositoryError> {
        self.check("get_result")?;
        self.inner.get_result(id).await
    }

    async fn get_result_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<InterviewResult>, RepositoryError> {
        self.check("get_result_for_session")?;
        self.inner.get_result_for_session(session_id).await
    }

    async fn log_event(&self, event: &SessionEvent) -> Result<(), RepositoryError> {
        self.check("log_event")?;
        self.inner.log_event(event).await
    }

    async fn get_session_events(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<SessionEvent>, RepositoryError> {
        self.check("get_session_events")?;
        self.inner.get_session_events(session_id, limit).await
    }
}

#[async_trait]
impl ContactDirectory for FlakyRepository {
    async fn get_profile(
        &self,
        candidate: &CandidateId,
    ) -> Result<Option<CandidateProfile>, RepositoryError> {
        self.check("get_profile")?;
        self.inner.get_profile(candidate).await
    }

    async fn upsert_profile(&self, profile: &CandidateProfile) -> Result<(), RepositoryError> {
        self.inner.upsert_profile(profile).await
    }
}

pub struct Harness {
    pub engine: SessionEngine,
    pub repo: Arc<FlakyRepository>,
    pub notifier: Arc<FakeNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_notifier(FakeNotifier::ok())
    }

    pub fn with_notifier(notifier: FakeNotifier) -> Self {
        let repo = Arc::new(FlakyRepository::default());
        let notifier = Arc::new(notifier);
        let engine = SessionEngine::new(repo.clone(), repo.clone(), notifier.clone());
        Self {
            engine,
            repo,
            notifier,
        }
    }

    /// A pending session whose candidate has an email on file.
    pub async fn seed(&self, candidate: &str, interview: &str) -> Session {
        let session = self.seed_without_profile(candidate, interview).await;
        self.repo
            .upsert_profile(&CandidateProfile {
                candidate_id: CandidateId::from(candidate),
                email: Some(format!("{}@example.com", candidate)),
                full_name: Some(format!("Candidate {}", candidate)),
            })
            .await
            .unwrap();
        session
    }

    pub async fn seed_without_profile(&self, candidate: &str, interview: &str) -> Session {
        let session = Session::pending(candidate, interview, Utc::now());
        self.repo.insert_session(&session).await.unwrap();
        session
    }

    pub async fn session(&self, id: &SessionId) -> Session {
        self.repo.get_session(id).await.unwrap().unwrap()
    }

    pub async fn event_names(&self, id: &SessionId) -> Vec<&'static str> {
        self.repo
            .get_session_events(id, 100)
            .await
            .unwrap()
            .iter()
            .rev()
            .map(|e| e.kind.variant_name())
            .collect()
    }
}

pub fn payload(candidate: &str, interview: &str) -> ResultPayload {
    ResultPayload {
        candidate_id: Some(candidate.to_string()),
        interview_id: Some(interview.to_string()),
        transcript: Some("AI: Walk me through a recent project.\nUser: ...".to_string()),
        summary: Some("Clear communicator; solid on fundamentals.".to_string()),
        cost: Some(0.42),
        ..Default::default()
    }
}
