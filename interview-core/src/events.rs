//! Session timeline events.
//!
//! Every mutation and every side-effect outcome is appended to a per-session
//! log. The log is diagnostic: writing to it is best-effort and never part
//! of an entry point's success criteria.

use serde::{Deserialize, Serialize};

use crate::session::{ResultId, SessionId};
use crate::status::SessionStatus;

/// Serialized with a `type`/`data` tag:
/// ```json
/// { "type": "StatusChanged", "data": { "from": "pending", "to": "created-pending", "trigger": "session_ready" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEventKind {
    StatusChanged {
        from: SessionStatus,
        to: SessionStatus,
        /// Which entry point caused the change.
        trigger: String,
    },

    ResultStored {
        result_id: ResultId,
        /// True when a redelivered submission found an existing result.
        reused: bool,
    },

    /// The result exists but the session's forward link could not be written.
    ResultLinkFailed { result_id: ResultId, error: String },

    NotificationSent { template: String },

    NotificationSkipped { reason: String },

    NotificationFailed { error: String },
}

impl SessionEventKind {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => "StatusChanged",
            Self::ResultStored { .. } => "ResultStored",
            Self::ResultLinkFailed { .. } => "ResultLinkFailed",
            Self::NotificationSent { .. } => "NotificationSent",
            Self::NotificationSkipped { .. } => "NotificationSkipped",
            Self::NotificationFailed { .. } => "NotificationFailed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    /// Database row ID (0 for unsaved events).
    pub id: i64,
    pub session_id: SessionId,
    pub kind: SessionEventKind,
    /// Unix timestamp in milliseconds.
    pub recorded_at: i64,
}

impl SessionEvent {
    pub fn new(session_id: SessionId, kind: SessionEventKind, recorded_at: i64) -> Self {
        Self {
            id: 0,
            session_id,
            kind,
            recorded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_json_structure() {
        let kind = SessionEventKind::StatusChanged {
            from: SessionStatus::Pending,
            to: SessionStatus::CreatedPending,
            trigger: "session_ready".to_string(),
        };

        let value = serde_json::to_value(&kind).unwrap();
        assert_eq!(value["type"], "StatusChanged");
        assert_eq!(value["data"]["from"], "pending");
        assert_eq!(value["data"]["to"], "created-pending");
        assert_eq!(value["data"]["trigger"], "session_ready");
    }

    #[test]
    fn test_variant_name_matches_serde_tag() {
        let kinds = vec![
            SessionEventKind::ResultStored {
                result_id: ResultId::from("r1"),
                reused: true,
            },
            SessionEventKind::ResultLinkFailed {
                result_id: ResultId::from("r1"),
                error: "locked".to_string(),
            },
            SessionEventKind::NotificationSent {
                template: "interview-ready".to_string(),
            },
            SessionEventKind::NotificationSkipped {
                reason: "not configured".to_string(),
            },
            SessionEventKind::NotificationFailed {
                error: "timeout".to_string(),
            },
        ];

        for kind in kinds {
            let value = serde_json::to_value(&kind).unwrap();
            assert_eq!(value["type"], kind.variant_name());
        }
    }
}
