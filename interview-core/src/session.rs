//! Session record and the identifier newtypes that key it.
//!
//! A session is created by the upstream scheduling system; this crate only
//! models what the lifecycle engine observes and mutates afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::status::SessionStatus;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Internal session identity, generated when the session is created.
    SessionId
);

string_id!(
    /// Reference to the person taking the interview.
    CandidateId
);

string_id!(
    /// Identifier assigned by the interview-conducting system.
    InterviewId
);

string_id!(
    /// Identity of a stored interview result.
    ResultId
);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl ResultId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// One tracked interview attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub candidate_id: CandidateId,
    pub external_interview_id: InterviewId,
    pub status: SessionStatus,
    pub interview_url: Option<String>,
    pub result_id: Option<ResultId>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A freshly scheduled session, as the upstream system would create it.
    pub fn pending(
        candidate_id: impl Into<CandidateId>,
        external_interview_id: impl Into<InterviewId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            candidate_id: candidate_id.into(),
            external_interview_id: external_interview_id.into(),
            status: SessionStatus::Pending,
            interview_url: None,
            result_id: None,
            updated_at: now,
        }
    }
}

/// Contact details for a candidate, as held by the profile system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProfile {
    pub candidate_id: CandidateId,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

impl CandidateProfile {
    /// The address notifications go to, ignoring blank values.
    pub fn contact_address(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_session_has_no_url_or_result() {
        let session = Session::pending("c1", "e1", Utc::now());
        assert_eq!(session.status, SessionStatus::Pending);
        assert!(session.interview_url.is_none());
        assert!(session.result_id.is_none());
        assert_eq!(session.candidate_id, CandidateId::from("c1"));
        assert_eq!(session.external_interview_id, InterviewId::from("e1"));
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(SessionId::generate(), SessionId::generate());
        assert_ne!(ResultId::generate(), ResultId::generate());
    }

    #[test]
    fn test_session_serializes_camel_case() {
        let session = Session::pending("c1", "e1", Utc::now());
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["candidateId"], "c1");
        assert_eq!(value["externalInterviewId"], "e1");
        assert_eq!(value["status"], "pending");
        assert!(value["resultId"].is_null());
    }

    #[test]
    fn test_contact_address_ignores_blank_email() {
        let mut profile = CandidateProfile {
            candidate_id: CandidateId::from("c1"),
            email: Some("   ".to_string()),
            full_name: None,
        };
        assert_eq!(profile.contact_address(), None);

        profile.email = Some(" c1@example.com ".to_string());
        assert_eq!(profile.contact_address(), Some("c1@example.com"));

        profile.email = None;
        assert_eq!(profile.contact_address(), None);
    }
}
