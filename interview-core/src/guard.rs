//! Status transition rules.
//!
//! Three kinds of transition exist, one per entry point:
//! - session ready: always to `created-pending`, storing the call URL
//! - generic update: to one of [`UPDATE_TARGETS`], owner only
//! - finalization: always to `success-interview`, from any state
//!
//! No precondition on the source state is enforced. Every function here is
//! pure; callers persist the returned [`Transition`].

use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::session::{CandidateId, Session, SessionId};
use crate::status::{SessionStatus, UPDATE_TARGETS};

/// A validated change to a session, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub session_id: SessionId,
    pub from: SessionStatus,
    pub to: SessionStatus,
    /// URL to store alongside the status; `None` leaves the current URL.
    pub interview_url: Option<String>,
}

impl Transition {
    /// The session as it looks once this transition has been written.
    pub fn apply_to(&self, session: &Session, now: DateTime<Utc>) -> Session {
        Session {
            status: self.to,
            interview_url: self
                .interview_url
                .clone()
                .or_else(|| session.interview_url.clone()),
            updated_at: now,
            ..session.clone()
        }
    }

    pub fn is_noop(&self) -> bool {
        self.from == self.to && self.interview_url.is_none()
    }
}

/// Parse a caller-requested status for the generic update path.
///
/// Runs before any storage access.
pub fn parse_update_target(
    requested: &str,
    candidate_id: Option<&str>,
    interview_id: Option<&str>,
) -> Result<SessionStatus, EngineError> {
    requested
        .parse::<SessionStatus>()
        .ok()
        .filter(|status| UPDATE_TARGETS.contains(status))
        .ok_or_else(|| EngineError::InvalidStatus {
            requested: requested.to_string(),
            valid: SessionStatus::update_target_names(),
            candidate_id: candidate_id.map(str::to_string),
            interview_id: interview_id.map(str::to_string),
        })
}

/// Reject callers that claim a different candidate than the session owner.
pub fn check_owner(session: &Session, claimed: &CandidateId) -> Result<(), EngineError> {
    if session.candidate_id == *claimed {
        Ok(())
    } else {
        Err(EngineError::IdentityMismatch {
            session_id: session.id.clone(),
            claimed: claimed.0.clone(),
            interview_id: Some(session.external_interview_id.0.clone()),
        })
    }
}

/// Generic update: owner check, then move to `target`.
pub fn update(
    session: &Session,
    claimed: &CandidateId,
    target: SessionStatus,
) -> Result<Transition, EngineError> {
    check_owner(session, claimed)?;
    debug_assert!(target.is_update_target());
    Ok(Transition {
        session_id: session.id.clone(),
        from: session.status,
        to: target,
        interview_url: None,
    })
}

pub fn ready(session: &Session, interview_url: &str) -> Transition {
    Transition {
        session_id: session.id.clone(),
        from: session.status,
        to: SessionStatus::CreatedPending,
        interview_url: Some(interview_url.to_string()),
    }
}

/// Finalization overrides whatever state the session was in.
pub fn finalize(session: &Session) -> Transition {
    Transition {
        session_id: session.id.clone(),
        from: session.status,
        to: SessionStatus::SuccessInterview,
        interview_url: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn session_in(status: SessionStatus) -> Session {
        Session {
            status,
            ..Session::pending("c1", "e1", Utc::now())
        }
    }

    fn any_status() -> impl Strategy<Value = SessionStatus> {
        proptest::sample::select(SessionStatus::ALL.to_vec())
    }

    #[test]
    fn test_bogus_status_rejected_with_valid_list() {
        let err = parse_update_target("bogus", Some("c1"), Some("e1")).unwrap_err();
        match err {
            EngineError::InvalidStatus {
                requested,
                valid,
                candidate_id,
                interview_id,
            } => {
                assert_eq!(requested, "bogus");
                assert_eq!(
                    valid,
                    vec!["analyzing-interview", "created-pending", "completed", "failed"]
                );
                assert_eq!(candidate_id.as_deref(), Some("c1"));
                assert_eq!(interview_id.as_deref(), Some("e1"));
            }
            other => panic!("expected InvalidStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_engine_only_statuses_rejected_on_generic_path() {
        assert!(parse_update_target("pending", None, None).is_err());
        assert!(parse_update_target("success-interview", None, None).is_err());
    }

    #[test]
    fn test_wrong_owner_is_identity_mismatch() {
        let session = session_in(SessionStatus::CreatedPending);
        let err = update(
            &session,
            &CandidateId::from("c2"),
            SessionStatus::Completed,
        )
        .unwrap_err();
        assert_eq!(err.code(), "identity_mismatch");
    }

    #[test]
    fn test_completed_back_to_created_pending_is_allowed() {
        let session = session_in(SessionStatus::Completed);
        let transition = update(
            &session,
            &CandidateId::from("c1"),
            SessionStatus::CreatedPending,
        )
        .unwrap();
        assert_eq!(transition.from, SessionStatus::Completed);
        assert_eq!(transition.to, SessionStatus::CreatedPending);
    }

    #[test]
    fn test_ready_sets_url_and_keeps_it_on_later_transitions() {
        let session = session_in(SessionStatus::Pending);
        let now = Utc::now();
        let after_ready = ready(&session, "https://call.example/e1").apply_to(&session, now);
        assert_eq!(after_ready.status, SessionStatus::CreatedPending);
        assert_eq!(
            after_ready.interview_url.as_deref(),
            Some("https://call.example/e1")
        );

        let after_final = finalize(&after_ready).apply_to(&after_ready, now);
        assert_eq!(after_final.status, SessionStatus::SuccessInterview);
        assert_eq!(
            after_final.interview_url.as_deref(),
            Some("https://call.example/e1")
        );
    }

    #[test]
    fn test_noop_detection() {
        let session = session_in(SessionStatus::Failed);
        let same = update(&session, &CandidateId::from("c1"), SessionStatus::Failed).unwrap();
        assert!(same.is_noop());
        assert!(!ready(&session, "https://x").is_noop());
    }

    proptest! {
        #[test]
        fn generic_targets_accepted_from_any_state(from in any_status(), target_idx in 0usize..4) {
            let target = UPDATE_TARGETS[target_idx];
            let session = session_in(from);
            let parsed = parse_update_target(target.as_str(), None, None).unwrap();
            let transition = update(&session, &CandidateId::from("c1"), parsed).unwrap();
            prop_assert_eq!(transition.to, target);
            prop_assert_eq!(transition.from, from);
        }

        #[test]
        fn finalize_always_lands_on_success(from in any_status()) {
            let session = session_in(from);
            prop_assert_eq!(finalize(&session).to, SessionStatus::SuccessInterview);
        }

        #[test]
        fn mismatched_owner_always_rejected(from in any_status(), claimed in "[a-z0-9]{1,8}") {
            prop_assume!(claimed != "c1");
            let session = session_in(from);
            let result = update(&session, &CandidateId::from(claimed.as_str()), SessionStatus::Completed);
            prop_assert!(result.is_err());
        }
    }
}
