//! Turning partial external identifiers into one concrete session.
//!
//! Callers may only reliably know one of the two keys, so the store is asked
//! for every session matching the candidate key OR the interview key. When
//! more than one row comes back the choice is deterministic: a row matching
//! the interview key wins (that key is unique in the store), then a row
//! matching the candidate key, then the most recently updated row.

use crate::error::EngineError;
use crate::session::{CandidateId, InterviewId, Session};

/// The identifiers a caller supplied. At least one is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveKeys {
    candidate: Option<CandidateId>,
    interview: Option<InterviewId>,
}

impl ResolveKeys {
    /// Build keys from raw caller input. Blank strings count as absent.
    pub fn new(candidate: Option<&str>, interview: Option<&str>) -> Result<Self, EngineError> {
        let candidate = non_blank(candidate).map(CandidateId::from);
        let interview = non_blank(interview).map(InterviewId::from);

        if candidate.is_none() && interview.is_none() {
            return Err(EngineError::InvalidRequest {
                reason: "either candidateId or interviewId is required".to_string(),
                candidate_id: None,
                interview_id: None,
            });
        }

        Ok(Self {
            candidate,
            interview,
        })
    }

    pub fn candidate(&self) -> Option<&CandidateId> {
        self.candidate.as_ref()
    }

    pub fn interview(&self) -> Option<&InterviewId> {
        self.interview.as_ref()
    }

    /// OR match against a single session.
    pub fn matches(&self, session: &Session) -> bool {
        self.candidate
            .as_ref()
            .is_some_and(|c| *c == session.candidate_id)
            || self
                .interview
                .as_ref()
                .is_some_and(|i| *i == session.external_interview_id)
    }

    pub fn not_found(&self) -> EngineError {
        EngineError::NotFound {
            candidate_id: self.candidate.as_ref().map(|c| c.0.clone()),
            interview_id: self.interview.as_ref().map(|i| i.0.clone()),
        }
    }

    fn rank(&self, session: &Session) -> u8 {
        if self
            .interview
            .as_ref()
            .is_some_and(|i| *i == session.external_interview_id)
        {
            0
        } else if self
            .candidate
            .as_ref()
            .is_some_and(|c| *c == session.candidate_id)
        {
            1
        } else {
            2
        }
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Outcome of picking among OR-matched rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub session: Session,
    /// How many rows matched before the pick. Anything above one means stale
    /// or inconsistent upstream data worth logging.
    pub match_count: usize,
}

/// Pick one session from the rows the store returned for `keys`.
///
/// Rows that do not actually match are ignored, so a sloppy store query can
/// never widen the match.
pub fn pick(keys: &ResolveKeys, rows: Vec<Session>) -> Result<Resolved, EngineError> {
    let mut matching: Vec<Session> = rows.into_iter().filter(|s| keys.matches(s)).collect();
    let match_count = matching.len();

    matching.sort_by(|a, b| {
        keys.rank(a)
            .cmp(&keys.rank(b))
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| b.id.cmp(&a.id))
    });

    matching
        .into_iter()
        .next()
        .map(|session| Resolved {
            session,
            match_count,
        })
        .ok_or_else(|| keys.not_found())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn session(id: &str, candidate: &str, interview: &str, age_secs: i64) -> Session {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        Session {
            id: SessionId::from(id),
            updated_at: base - Duration::seconds(age_secs),
            ..Session::pending(candidate, interview, base)
        }
    }

    #[test]
    fn test_neither_key_is_invalid_request() {
        let err = ResolveKeys::new(None, Some("  ")).unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn test_no_rows_is_not_found_with_echo() {
        let keys = ResolveKeys::new(Some("c1"), Some("e1")).unwrap();
        let err = pick(&keys, vec![]).unwrap_err();
        assert_eq!(
            err,
            EngineError::NotFound {
                candidate_id: Some("c1".to_string()),
                interview_id: Some("e1".to_string()),
            }
        );
    }

    #[test]
    fn test_either_key_alone_finds_same_row() {
        let row = session("s1", "c1", "e1", 0);
        let by_candidate = ResolveKeys::new(Some("c1"), None).unwrap();
        let by_interview = ResolveKeys::new(None, Some("e1")).unwrap();

        let a = pick(&by_candidate, vec![row.clone()]).unwrap();
        let b = pick(&by_interview, vec![row]).unwrap();
        assert_eq!(a.session, b.session);
    }

    #[test]
    fn test_interview_key_beats_fresher_candidate_row() {
        // c2 owns a newer session, but e1 belongs to c1.
        let owned_by_c1 = session("s1", "c1", "e1", 60);
        let owned_by_c2 = session("s2", "c2", "e2", 0);
        let keys = ResolveKeys::new(Some("c2"), Some("e1")).unwrap();

        let resolved = pick(&keys, vec![owned_by_c2, owned_by_c1]).unwrap();
        assert_eq!(resolved.session.id, SessionId::from("s1"));
        assert_eq!(resolved.match_count, 2);
    }

    #[test]
    fn test_candidate_only_picks_most_recent() {
        let older = session("s1", "c1", "e1", 120);
        let newer = session("s2", "c1", "e2", 5);
        let keys = ResolveKeys::new(Some("c1"), None).unwrap();

        let resolved = pick(&keys, vec![older, newer]).unwrap();
        assert_eq!(resolved.session.id, SessionId::from("s2"));
    }

    #[test]
    fn test_non_matching_rows_are_ignored() {
        let stray = session("s9", "c9", "e9", 0);
        let keys = ResolveKeys::new(Some("c1"), None).unwrap();
        assert!(pick(&keys, vec![stray]).is_err());
    }

    proptest! {
        #[test]
        fn pick_is_order_independent(ages in proptest::collection::vec(0i64..1000, 1..8)) {
            let rows: Vec<Session> = ages
                .iter()
                .enumerate()
                .map(|(i, age)| session(&format!("s{}", i), "c1", &format!("e{}", i), *age))
                .collect();
            let keys = ResolveKeys::new(Some("c1"), None).unwrap();

            let forward = pick(&keys, rows.clone()).unwrap();
            let mut reversed_rows = rows;
            reversed_rows.reverse();
            let backward = pick(&keys, reversed_rows).unwrap();

            prop_assert_eq!(forward.session.id, backward.session.id);
        }
    }
}
