//! Finalization payloads and the immutable result records built from them.
//!
//! The payload is passthrough: the engine checks that the two identifiers are
//! present and stores everything else as received, including fields it does
//! not know about (kept in `extra`). A known field whose JSON type does not
//! match is kept in `extra` under its own key rather than rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::resolver::{non_blank, ResolveKeys};
use crate::session::{CandidateId, InterviewId, ResultId, Session, SessionId};

/// Maximum number of characters of the summary echoed back to the caller.
pub const SUMMARY_ECHO_CHARS: usize = 100;

/// Body of a "result submitted" call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Map<String, Value>")]
pub struct ResultPayload {
    #[serde(default)]
    pub candidate_id: Option<String>,
    #[serde(default)]
    pub interview_id: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
    /// Single-channel recording.
    #[serde(default)]
    pub recording_url: Option<String>,
    /// Multi-channel recording.
    #[serde(default)]
    pub stereo_recording_url: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub cost_breakdown: Option<Value>,
    #[serde(default)]
    pub analysis: Option<Value>,
    #[serde(default)]
    pub monitor: Option<Value>,
    #[serde(default)]
    pub transport: Option<Value>,
    #[serde(default)]
    pub messages: Option<Value>,
    /// AI-generated call summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// Summary written for the candidate.
    #[serde(default)]
    pub display_summary: Option<String>,
    #[serde(default)]
    pub ended_reason: Option<String>,
    /// Provider-side timestamps, kept verbatim.
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub ended_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for ResultPayload {
    fn from(mut fields: Map<String, Value>) -> Self {
        let mut mismatched = Map::new();
        let mut string = |key: &str| match fields.remove(key) {
            Some(Value::String(s)) => Some(s),
            Some(Value::Null) | None => None,
            Some(other) => {
                mismatched.insert(key.to_string(), other);
                None
            }
        };

        let candidate_id = string("candidateId");
        let interview_id = string("interviewId");
        let transcript = string("transcript");
        let recording_url = string("recordingUrl");
        let stereo_recording_url = string("stereoRecordingUrl");
        let summary = string("summary");
        let display_summary = string("displaySummary");
        let ended_reason = string("endedReason");
        let started_at = string("startedAt");
        let ended_at = string("endedAt");

        let cost = match fields.remove("cost") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::Null) | None => None,
            Some(other) => {
                mismatched.insert("cost".to_string(), other);
                None
            }
        };

        let mut json = |key: &str| fields.remove(key).filter(|v| !v.is_null());
        let cost_breakdown = json("costBreakdown");
        let analysis = json("analysis");
        let monitor = json("monitor");
        let transport = json("transport");
        let messages = json("messages");

        fields.extend(mismatched);

        Self {
            candidate_id,
            interview_id,
            transcript,
            recording_url,
            stereo_recording_url,
            cost,
            cost_breakdown,
            analysis,
            monitor,
            transport,
            messages,
            summary,
            display_summary,
            ended_reason,
            started_at,
            ended_at,
            extra: fields,
        }
    }
}

impl ResultPayload {
    /// Both identifiers are required here, unlike the resolver which accepts
    /// either one.
    pub fn require_keys(&self) -> Result<ResolveKeys, EngineError> {
        let candidate = non_blank(self.candidate_id.as_deref());
        let interview = non_blank(self.interview_id.as_deref());

        let mut missing = Vec::new();
        if candidate.is_none() {
            missing.push("candidateId");
        }
        if interview.is_none() {
            missing.push("interviewId");
        }
        if !missing.is_empty() {
            return Err(EngineError::InvalidRequest {
                reason: format!("missing required fields: {}", missing.join(", ")),
                candidate_id: candidate.map(str::to_string),
                interview_id: interview.map(str::to_string),
            });
        }

        ResolveKeys::new(candidate, interview)
    }
}

/// Truncate to `max` characters, marking the cut with an ellipsis.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
        None => s.to_string(),
    }
}

/// Stored finalization record. Created once per session and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewResult {
    pub id: ResultId,
    pub session_id: SessionId,
    pub candidate_id: CandidateId,
    pub external_interview_id: InterviewId,
    pub transcript: Option<String>,
    pub recording_url: Option<String>,
    pub stereo_recording_url: Option<String>,
    pub cost: Option<f64>,
    pub cost_breakdown: Option<Value>,
    pub analysis: Option<Value>,
    pub monitor: Option<Value>,
    pub transport: Option<Value>,
    pub messages: Option<Value>,
    pub summary: Option<String>,
    pub display_summary: Option<String>,
    pub ended_reason: Option<String>,
    pub provider_started_at: Option<String>,
    pub provider_ended_at: Option<String>,
    pub extra: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl InterviewResult {
    /// Build the record for `session`. Identity comes from the resolved
    /// session, not from the payload, so a caller naming the wrong candidate
    /// cannot attach a result to someone else's identity.
    pub fn from_payload(session: &Session, payload: ResultPayload, now: DateTime<Utc>) -> Self {
        Self {
            id: ResultId::generate(),
            session_id: session.id.clone(),
            candidate_id: session.candidate_id.clone(),
            external_interview_id: session.external_interview_id.clone(),
            transcript: payload.transcript,
            recording_url: payload.recording_url,
            stereo_recording_url: payload.stereo_recording_url,
            cost: payload.cost,
            cost_breakdown: payload.cost_breakdown,
            analysis: payload.analysis,
            monitor: payload.monitor,
            transport: payload.transport,
            messages: payload.messages,
            summary: payload.summary,
            display_summary: payload.display_summary,
            ended_reason: payload.ended_reason,
            provider_started_at: payload.started_at,
            provider_ended_at: payload.ended_at,
            extra: payload.extra,
            created_at: now,
        }
    }

    /// The stored summary, cut to `SUMMARY_ECHO_CHARS` for the response.
    pub fn summary_echo(&self) -> Option<String> {
        self.summary
            .as_deref()
            .map(|s| truncate_chars(s, SUMMARY_ECHO_CHARS))
    }
}
