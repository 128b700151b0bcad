//! "Session ready": the interview system has a reachable call URL.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use url::Url;

use interview_core::guard;
use interview_core::{EngineError, ResolveKeys, Session, SessionEventKind, SessionStatus};

use super::{persist_failure, record_event, require_fields, SessionEngine};
use crate::notifier::{Notification, NotifyError, NotifyOutcome};

const TRIGGER: &str = "session_ready";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReadyRequest {
    #[serde(default)]
    pub candidate_id: Option<String>,
    #[serde(default)]
    pub interview_id: Option<String>,
    #[serde(default)]
    pub interview_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReadyResponse {
    pub session_id: String,
    pub candidate_id: String,
    pub interview_id: String,
    pub status: SessionStatus,
    pub interview_url: String,
    /// True only when the notifier confirmed delivery before the response
    /// was sent.
    pub notification_sent: bool,
}

impl SessionEngine {
    /// Move the session to `created-pending`, store its URL, and notify the
    /// candidate.
    ///
    /// The contact address is checked before anything is written, so a
    /// candidate with no address on file leaves the session untouched. The
    /// notification itself runs after the write and cannot fail the call.
    pub async fn session_ready(
        &self,
        request: SessionReadyRequest,
        correlation_id: Option<&str>,
    ) -> Result<SessionReadyResponse, EngineError> {
        let candidate = request.candidate_id.as_deref();
        let interview = request.interview_id.as_deref();
        require_fields(
            &[
                ("candidateId", candidate),
                ("interviewId", interview),
                ("interviewUrl", request.interview_url.as_deref()),
            ],
            candidate,
            interview,
        )?;
        let interview_url = parse_interview_url(
            request.interview_url.as_deref().unwrap_or_default(),
            candidate,
            interview,
        )?;
        let keys = ResolveKeys::new(candidate, interview)?;

        let session = self.resolve(&keys).await?;
        let address = self.contact_address(&session, &keys).await?;

        let transition = guard::ready(&session, &interview_url);
        let updated = self
            .write_transition(&session, &transition, &keys, TRIGGER)
            .await?;

        let notification = Notification {
            address,
            template: self.notify_template.clone(),
            variables: BTreeMap::from([
                ("candidateId".to_string(), updated.candidate_id.0.clone()),
                (
                    "interviewId".to_string(),
                    updated.external_interview_id.0.clone(),
                ),
                ("interviewUrl".to_string(), interview_url.clone()),
            ]),
        };
        let notification_sent = self
            .notify(&updated, notification, correlation_id.map(str::to_string))
            .await;

        Ok(SessionReadyResponse {
            session_id: updated.id.0.clone(),
            candidate_id: updated.candidate_id.0.clone(),
            interview_id: updated.external_interview_id.0.clone(),
            status: updated.status,
            interview_url,
            notification_sent,
        })
    }

    async fn contact_address(
        &self,
        session: &Session,
        keys: &ResolveKeys,
    ) -> Result<String, EngineError> {
        let profile = self
            .contacts
            .get_profile(&session.candidate_id)
            .await
            .map_err(|e| persist_failure("look up candidate profile", e, Some(session), keys, false))?;

        profile
            .as_ref()
            .and_then(|p| p.contact_address())
            .map(str::to_string)
            .ok_or_else(|| EngineError::MissingContact {
                session_id: session.id.clone(),
                candidate_id: session.candidate_id.0.clone(),
                interview_id: Some(session.external_interview_id.0.clone()),
            })
    }

    /// Send in a detached task and wait up to `notify_timeout` for the
    /// outcome. The task records the outcome either way.
    async fn notify(
        &self,
        session: &Session,
        notification: Notification,
        correlation_id: Option<String>,
    ) -> bool {
        let notifier = Arc::clone(&self.notifier);
        let repo = Arc::clone(&self.repo);
        let session_id = session.id.clone();
        let timeout = self.notify_timeout;

        let task = tokio::spawn(async move {
            let outcome = notifier
                .send(&notification, correlation_id.as_deref())
                .await;

            let kind = match &outcome {
                Ok(NotifyOutcome::Sent) => {
                    info!("Notified candidate for session {}", session_id);
                    SessionEventKind::NotificationSent {
                        template: notification.template.clone(),
                    }
                }
                Ok(NotifyOutcome::Skipped { reason }) => SessionEventKind::NotificationSkipped {
                    reason: reason.clone(),
                },
                Err(e) => {
                    error!("Notification for session {} failed: {}", session_id, e);
                    SessionEventKind::NotificationFailed {
                        error: e.to_string(),
                    }
                }
            };
            record_event(repo.as_ref(), &session_id, kind).await;

            matches!(outcome, Ok(NotifyOutcome::Sent))
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(sent)) => sent,
            Ok(Err(join_error)) => {
                error!(
                    "Notification task for session {} panicked: {}",
                    session.id, join_error
                );
                false
            }
            Err(_) => {
                warn!(
                    "Session {}: {}; responding without waiting",
                    session.id,
                    NotifyError::Timeout(timeout)
                );
                false
            }
        }
    }
}

/// Accept absolute http(s) URLs only. The caller's string is kept as given
/// (trimmed) rather than re-serialized.
fn parse_interview_url(
    raw: &str,
    candidate: Option<&str>,
    interview: Option<&str>,
) -> Result<String, EngineError> {
    let invalid = |reason: String| EngineError::InvalidRequest {
        reason,
        candidate_id: candidate.map(str::to_string),
        interview_id: interview.map(str::to_string),
    };

    let trimmed = raw.trim();
    let url = Url::parse(trimmed)
        .map_err(|e| invalid(format!("interviewUrl is not a valid URL: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(invalid(format!(
            "interviewUrl must be http or https, got {}",
            other
        ))),
    }
}
