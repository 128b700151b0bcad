//! The session engine: the three entry points the interview system calls.
//!
//! Every entry point follows the same shape: validate input, resolve the
//! session, run the pure guard from `interview_core::guard`, then write.
//! Side effects that must not fail the request (event log, result link,
//! notification) are isolated and only logged.

mod ingest;
mod ready;
mod status_update;

#[cfg(test)]
pub(crate) mod test_support;

pub use ingest::ResultSubmittedResponse;
pub use ready::{SessionReadyRequest, SessionReadyResponse};
pub use status_update::{StatusUpdateRequest, StatusUpdateResponse};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use interview_core::resolver::{self, ResolveKeys};
use interview_core::{
    EngineError, InterviewResult, Session, SessionEvent, SessionEventKind, SessionId, Transition,
};

use crate::notifier::Notifier;
use crate::repository::{ContactDirectory, RepositoryError, SessionRepository};

pub const DEFAULT_NOTIFY_TEMPLATE: &str = "interview-ready";
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// How many events the inspection view returns.
pub const INSPECT_EVENT_LIMIT: usize = 50;

pub struct SessionEngine {
    repo: Arc<dyn SessionRepository>,
    contacts: Arc<dyn ContactDirectory>,
    notifier: Arc<dyn Notifier>,
    notify_template: String,
    notify_timeout: Duration,
}

/// Everything stored about one session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetails {
    pub session: Session,
    pub result: Option<InterviewResult>,
    /// Newest first.
    pub events: Vec<SessionEvent>,
}

impl SessionEngine {
    pub fn new(
        repo: Arc<dyn SessionRepository>,
        contacts: Arc<dyn ContactDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repo,
            contacts,
            notifier,
            notify_template: DEFAULT_NOTIFY_TEMPLATE.to_string(),
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    pub fn with_notify_template(mut self, template: impl Into<String>) -> Self {
        self.notify_template = template.into();
        self
    }

    /// Upper bound on how long "session ready" waits for the notifier before
    /// answering. A slower notification still completes in the background.
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    pub async fn inspect(&self, id: &SessionId) -> Result<Option<SessionDetails>, EngineError> {
        let lookup_failed = |op: &str, e: RepositoryError| EngineError::PersistFailure {
            operation: op.to_string(),
            message: e.to_string(),
            session_id: Some(id.clone()),
            candidate_id: None,
            interview_id: None,
            status_committed: false,
        };

        let Some(session) = self
            .repo
            .get_session(id)
            .await
            .map_err(|e| lookup_failed("load session", e))?
        else {
            return Ok(None);
        };

        let result = self
            .repo
            .get_result_for_session(id)
            .await
            .map_err(|e| lookup_failed("load result", e))?;
        let events = self
            .repo
            .get_session_events(id, INSPECT_EVENT_LIMIT)
            .await
            .map_err(|e| lookup_failed("load events", e))?;

        Ok(Some(SessionDetails {
            session,
            result,
            events,
        }))
    }

    /// Find the one session `keys` refers to.
    async fn resolve(&self, keys: &ResolveKeys) -> Result<Session, EngineError> {
        let rows = self
            .repo
            .find_matching(keys.candidate(), keys.interview())
            .await
            .map_err(|e| persist_failure("look up session", e, None, keys, false))?;

        let resolved = resolver::pick(keys, rows)?;
        if resolved.match_count > 1 {
            warn!(
                "{} sessions match candidate {:?} / interview {:?}; using {}",
                resolved.match_count,
                keys.candidate(),
                keys.interview(),
                resolved.session.id
            );
        }
        Ok(resolved.session)
    }

    /// Persist a transition and log it. A failure here is fatal to the
    /// request and nothing has been committed.
    async fn write_transition(
        &self,
        session: &Session,
        transition: &Transition,
        keys: &ResolveKeys,
        trigger: &str,
    ) -> Result<Session, EngineError> {
        let updated = self
            .repo
            .update_status(
                &transition.session_id,
                transition.to,
                transition.interview_url.as_deref(),
                Utc::now(),
            )
            .await
            .map_err(|e| persist_failure("update session status", e, Some(session), keys, false))?
            .ok_or_else(|| keys.not_found())?;

        if transition.is_noop() {
            debug!(
                "Session {} already {} ({}); timestamp refreshed",
                updated.id, transition.to, trigger
            );
        } else {
            info!(
                "Session {} {} -> {} ({})",
                updated.id, transition.from, transition.to, trigger
            );
        }
        self.record_event(
            &updated.id,
            SessionEventKind::StatusChanged {
                from: transition.from,
                to: transition.to,
                trigger: trigger.to_string(),
            },
        )
        .await;

        Ok(updated)
    }

    async fn record_event(&self, session_id: &SessionId, kind: SessionEventKind) {
        record_event(self.repo.as_ref(), session_id, kind).await;
    }
}

/// Append to the session's event log. Failures are logged and dropped.
async fn record_event(repo: &dyn SessionRepository, session_id: &SessionId, kind: SessionEventKind) {
    let name = kind.variant_name();
    let event = SessionEvent::new(session_id.clone(), kind, Utc::now().timestamp_millis());
    if let Err(e) = repo.log_event(&event).await {
        warn!("Failed to log {} event for session {}: {}", name, session_id, e);
    }
}

fn persist_failure(
    operation: &str,
    err: RepositoryError,
    session: Option<&Session>,
    keys: &ResolveKeys,
    status_committed: bool,
) -> EngineError {
    EngineError::PersistFailure {
        operation: operation.to_string(),
        message: err.to_string(),
        session_id: session.map(|s| s.id.clone()),
        candidate_id: keys.candidate().map(|c| c.0.clone()),
        interview_id: keys.interview().map(|i| i.0.clone()),
        status_committed,
    }
}

/// Reject a request naming any blank or absent field, listing all of them.
fn require_fields(
    fields: &[(&'static str, Option<&str>)],
    candidate_id: Option<&str>,
    interview_id: Option<&str>,
) -> Result<(), EngineError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    Err(EngineError::InvalidRequest {
        reason: format!("missing required fields: {}", missing.join(", ")),
        candidate_id: candidate_id.map(str::to_string),
        interview_id: interview_id.map(str::to_string),
    })
}
