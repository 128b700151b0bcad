//! Generic status update: any of the four update targets, owner only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use interview_core::guard;
use interview_core::{CandidateId, EngineError, ResolveKeys, SessionStatus};

use super::{require_fields, SessionEngine};

const TRIGGER: &str = "status_update";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub candidate_id: Option<String>,
    #[serde(default)]
    pub interview_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateResponse {
    pub session_id: String,
    pub candidate_id: String,
    pub interview_id: String,
    pub previous_status: SessionStatus,
    pub status: SessionStatus,
    pub updated_at: DateTime<Utc>,
}

impl SessionEngine {
    /// Validation order: required fields, then the requested status, then
    /// resolution, then ownership. Only the last step touches the session.
    pub async fn update_status(
        &self,
        request: StatusUpdateRequest,
    ) -> Result<StatusUpdateResponse, EngineError> {
        let candidate = request.candidate_id.as_deref();
        let interview = request.interview_id.as_deref();
        require_fields(
            &[
                ("candidateId", candidate),
                ("interviewId", interview),
                ("status", request.status.as_deref()),
            ],
            candidate,
            interview,
        )?;

        let requested = request.status.as_deref().unwrap_or_default().trim();
        let target = guard::parse_update_target(requested, candidate, interview)?;
        let keys = ResolveKeys::new(candidate, interview)?;

        let session = self.resolve(&keys).await?;
        let claimed = keys
            .candidate()
            .cloned()
            .unwrap_or_else(|| CandidateId::from(""));
        let transition = guard::update(&session, &claimed, target)?;

        let updated = self
            .write_transition(&session, &transition, &keys, TRIGGER)
            .await?;

        Ok(StatusUpdateResponse {
            session_id: updated.id.0.clone(),
            candidate_id: updated.candidate_id.0.clone(),
            interview_id: updated.external_interview_id.0.clone(),
            previous_status: transition.from,
            status: updated.status,
            updated_at: updated.updated_at,
        })
    }
}
