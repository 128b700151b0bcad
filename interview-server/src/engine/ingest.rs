//! "Result submitted": terminal finalization with the full payload.
//!
//! The steps are not one transaction. Status is written first and is never
//! rolled back. The result insert is idempotent per session, so a redelivery
//! after any partial failure converges on one result and a linked session.

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use interview_core::guard;
use interview_core::{
    EngineError, InterviewResult, ResolveKeys, ResultPayload, Session, SessionEventKind,
    SessionStatus,
};

use super::{persist_failure, SessionEngine};
use crate::repository::RepositoryError;

const TRIGGER: &str = "result_submitted";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSubmittedResponse {
    pub session_id: String,
    pub result_id: String,
    pub candidate_id: String,
    pub interview_id: String,
    pub status: SessionStatus,
    /// First characters of the stored summary.
    pub summary: Option<String>,
    pub cost: Option<f64>,
    /// True when this call found a result stored by an earlier delivery.
    pub reused_result: bool,
    /// False when the session's link to the result could not be written.
    pub result_linked: bool,
}

impl SessionEngine {
    pub async fn submit_result(
        &self,
        payload: ResultPayload,
    ) -> Result<ResultSubmittedResponse, EngineError> {
        let keys = payload.require_keys()?;
        let session = self.resolve(&keys).await?;

        let transition = guard::finalize(&session);
        let updated = self
            .write_transition(&session, &transition, &keys, TRIGGER)
            .await?;

        let (result, reused) = self.store_result(&updated, payload, &keys).await?;
        self.record_event(
            &updated.id,
            SessionEventKind::ResultStored {
                result_id: result.id.clone(),
                reused,
            },
        )
        .await;

        let linked = self.link_result(&updated, &result).await;

        info!(
            "Session {} finalized with result {}{}",
            updated.id,
            result.id,
            if reused { " (redelivery)" } else { "" }
        );

        Ok(ResultSubmittedResponse {
            session_id: updated.id.0.clone(),
            result_id: result.id.0.clone(),
            candidate_id: updated.candidate_id.0.clone(),
            interview_id: updated.external_interview_id.0.clone(),
            status: updated.status,
            summary: result.summary_echo(),
            cost: result.cost,
            reused_result: reused,
            result_linked: linked,
        })
    }

    /// Return the session's result, creating it only if none exists yet.
    async fn store_result(
        &self,
        session: &Session,
        payload: ResultPayload,
        keys: &ResolveKeys,
    ) -> Result<(InterviewResult, bool), EngineError> {
        let failed = |operation: &str, e: RepositoryError| {
            error!(
                "Session {} is {} but its result was not stored: {}",
                session.id, session.status, e
            );
            persist_failure(operation, e, Some(session), keys, true)
        };

        if let Some(existing) = self
            .repo
            .get_result_for_session(&session.id)
            .await
            .map_err(|e| failed("check for existing result", e))?
        {
            return Ok((existing, true));
        }

        let result = InterviewResult::from_payload(session, payload, Utc::now());
        let inserted = self
            .repo
            .insert_result(&result)
            .await
            .map_err(|e| failed("store interview result", e))?;

        // Lost a race with a concurrent delivery.
        let reused = inserted.is_existing();
        Ok((inserted.into_result(), reused))
    }

    /// Point the session at its result. Failure is logged, not returned; the
    /// next delivery repairs it.
    async fn link_result(&self, session: &Session, result: &InterviewResult) -> bool {
        if session.result_id.as_ref() == Some(&result.id) {
            return true;
        }

        match self
            .repo
            .set_result_id(&session.id, &result.id, Utc::now())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Result {} stored but session {} not linked: {}",
                    result.id, session.id, e
                );
                self.record_event(
                    &session.id,
                    SessionEventKind::ResultLinkFailed {
                        result_id: result.id.clone(),
                        error: e.to_string(),
                    },
                )
                .await;
                false
            }
        }
    }
}
