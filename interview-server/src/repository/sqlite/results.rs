//! Interview result storage for the SQLite repository.
//!
//! Structured payload fields (`analysis`, `messages`, ...) are stored as JSON
//! text. Results are written once and never updated.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};

use interview_core::{CandidateId, InterviewId, InterviewResult, ResultId, SessionId};

use super::super::{from_millis, to_millis, RepositoryError, ResultInsert};
use super::{map_write_error, SqliteRepository};

const RESULT_COLUMNS: &str = "id, session_id, candidate_id, external_interview_id, transcript, \
     recording_url, stereo_recording_url, cost, cost_breakdown, analysis, monitor, transport, \
     messages, summary, display_summary, ended_reason, provider_started_at, provider_ended_at, \
     extra, created_at";

fn json_column(value: &Option<Value>) -> Result<Option<String>, RepositoryError> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| RepositoryError::storage("insert_result serialize", e.to_string()))
}

fn parse_json_column(raw: Option<String>, column: &str) -> Result<Option<Value>, RepositoryError> {
    raw.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|_| RepositoryError::corruption(format!("{} JSON in interview_results", column)))
}

/// Raw result columns; JSON decoding happens in `into_result`.
struct ResultRow {
    id: String,
    session_id: String,
    candidate_id: String,
    external_interview_id: String,
    transcript: Option<String>,
    recording_url: Option<String>,
    stereo_recording_url: Option<String>,
    cost: Option<f64>,
    cost_breakdown: Option<String>,
    analysis: Option<String>,
    monitor: Option<String>,
    transport: Option<String>,
    messages: Option<String>,
    summary: Option<String>,
    display_summary: Option<String>,
    ended_reason: Option<String>,
    provider_started_at: Option<String>,
    provider_ended_at: Option<String>,
    extra: String,
    created_at: i64,
}

impl ResultRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            candidate_id: row.get(2)?,
            external_interview_id: row.get(3)?,
            transcript: row.get(4)?,
            recording_url: row.get(5)?,
            stereo_recording_url: row.get(6)?,
            cost: row.get(7)?,
            cost_breakdown: row.get(8)?,
            analysis: row.get(9)?,
            monitor: row.get(10)?,
            transport: row.get(11)?,
            messages: row.get(12)?,
            summary: row.get(13)?,
            display_summary: row.get(14)?,
            ended_reason: row.get(15)?,
            provider_started_at: row.get(16)?,
            provider_ended_at: row.get(17)?,
            extra: row.get(18)?,
            created_at: row.get(19)?,
        })
    }

    fn into_result(self) -> Result<InterviewResult, RepositoryError> {
        let extra: Map<String, Value> = serde_json::from_str(&self.extra)
            .map_err(|_| RepositoryError::corruption("extra JSON in interview_results"))?;

        Ok(InterviewResult {
            cost_breakdown: parse_json_column(self.cost_breakdown, "cost_breakdown")?,
            analysis: parse_json_column(self.analysis, "analysis")?,
            monitor: parse_json_column(self.monitor, "monitor")?,
            transport: parse_json_column(self.transport, "transport")?,
            messages: parse_json_column(self.messages, "messages")?,
            created_at: from_millis(self.created_at, "result created_at")?,
            id: ResultId(self.id),
            session_id: SessionId(self.session_id),
            candidate_id: CandidateId(self.candidate_id),
            external_interview_id: InterviewId(self.external_interview_id),
            transcript: self.transcript,
            recording_url: self.recording_url,
            stereo_recording_url: self.stereo_recording_url,
            cost: self.cost,
            summary: self.summary,
            display_summary: self.display_summary,
            ended_reason: self.ended_reason,
            provider_started_at: self.provider_started_at,
            provider_ended_at: self.provider_ended_at,
            extra,
        })
    }
}

fn select_one(
    conn: &Connection,
    column: &str,
    key: &str,
    operation: &'static str,
) -> Result<Option<InterviewResult>, RepositoryError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM interview_results WHERE {} = ?1",
            RESULT_COLUMNS, column
        ),
        params![key],
        ResultRow::read,
    )
    .optional()
    .map_err(|e| RepositoryError::storage(operation, e.to_string()))?
    .map(ResultRow::into_result)
    .transpose()
}

impl SqliteRepository {
    pub(super) async fn insert_result_impl(
        &self,
        result: &InterviewResult,
    ) -> Result<ResultInsert, RepositoryError> {
        let cost_breakdown = json_column(&result.cost_breakdown)?;
        let analysis = json_column(&result.analysis)?;
        let monitor = json_column(&result.monitor)?;
        let transport = json_column(&result.transport)?;
        let messages = json_column(&result.messages)?;
        let extra = serde_json::to_string(&result.extra)
            .map_err(|e| RepositoryError::storage("insert_result serialize", e.to_string()))?;
        let result = result.clone();

        self.with_conn("insert_result", move |conn| {
            // The unique index on session_id turns a concurrent duplicate
            // into a no-op; the winner's row is then read back.
            let inserted = conn
                .execute(
                    &format!(
                        "INSERT INTO interview_results ({}) VALUES \
                         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, \
                          ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
                         ON CONFLICT(session_id) DO NOTHING",
                        RESULT_COLUMNS
                    ),
                    params![
                        result.id.0,
                        result.session_id.0,
                        result.candidate_id.0,
                        result.external_interview_id.0,
                        result.transcript,
                        result.recording_url,
                        result.stereo_recording_url,
                        result.cost,
                        cost_breakdown,
                        analysis,
                        monitor,
                        transport,
                        messages,
                        result.summary,
                        result.display_summary,
                        result.ended_reason,
                        result.provider_started_at,
                        result.provider_ended_at,
                        extra,
                        to_millis(result.created_at),
                    ],
                )
                .map_err(|e| map_write_error("insert_result", format!("result {}", result.id), e))?;

            if inserted == 1 {
                return Ok(ResultInsert::Created(result));
            }

            let existing = select_one(
                conn,
                "session_id",
                &result.session_id.0,
                "insert_result existing",
            )?
            .ok_or_else(|| {
                RepositoryError::storage(
                    "insert_result",
                    format!(
                        "insert for session {} was ignored but no result exists",
                        result.session_id
                    ),
                )
            })?;
            Ok(ResultInsert::Existing(existing))
        })
        .await
    }

    pub(super) async fn get_result_impl(
        &self,
        id: &ResultId,
    ) -> Result<Option<InterviewResult>, RepositoryError> {
        let id = id.0.clone();
        self.with_conn("get_result", move |conn| {
            select_one(conn, "id", &id, "get_result")
        })
        .await
    }

    pub(super) async fn get_result_for_session_impl(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<InterviewResult>, RepositoryError> {
        let session_id = session_id.0.clone();
        self.with_conn("get_result_for_session", move |conn| {
            select_one(conn, "session_id", &session_id, "get_result_for_session")
        })
        .await
    }
}
