//! Session event log operations for the SQLite repository.
//!
//! Events are stored in the `session_events` table with JSON-encoded event
//! data. The `event_type` column duplicates the serde tag for ad-hoc queries.

use rusqlite::params;

use interview_core::{SessionEvent, SessionEventKind, SessionId};

use super::super::RepositoryError;
use super::SqliteRepository;

/// Convert a row limit to SQLite's integer type.
///
/// SQLite has no unsigned integers; an oversized limit is clamped rather
/// than wrapped to a negative number (which SQLite reads as "no limit").
fn usize_to_i64_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl SqliteRepository {
    pub(super) async fn log_event_impl(&self, event: &SessionEvent) -> Result<(), RepositoryError> {
        let session_id = event.session_id.0.clone();
        let recorded_at = event.recorded_at;
        let event_type_name = event.kind.variant_name();
        let event_json = serde_json::to_string(&event.kind)
            .map_err(|e| RepositoryError::storage("log_event serialize", e.to_string()))?;

        self.with_conn("log_event", move |conn| {
            conn.execute(
                "INSERT INTO session_events (session_id, event_type, event_data, recorded_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_id, event_type_name, event_json, recorded_at],
            )
            .map_err(|e| RepositoryError::storage("log_event", e.to_string()))?;
            Ok(())
        })
        .await
    }

    pub(super) async fn get_session_events_impl(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<SessionEvent>, RepositoryError> {
        let session_id = session_id.0.clone();
        let limit = usize_to_i64_limit(limit);

        self.with_conn("get_session_events", move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, session_id, event_data, recorded_at
                     FROM session_events
                     WHERE session_id = ?1
                     ORDER BY recorded_at DESC, id DESC
                     LIMIT ?2",
                )
                .map_err(|e| RepositoryError::storage("get_session_events", e.to_string()))?;

            let rows = stmt
                .query_map(params![session_id, limit], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })
                .map_err(|e| RepositoryError::storage("get_session_events", e.to_string()))?;

            let mut events = Vec::new();
            for row in rows {
                let (id, session_id, event_data, recorded_at) = row.map_err(|e| {
                    RepositoryError::storage("get_session_events row", e.to_string())
                })?;

                let kind: SessionEventKind = serde_json::from_str(&event_data)
                    .map_err(|_| RepositoryError::corruption("event_data JSON"))?;

                events.push(SessionEvent {
                    id,
                    session_id: SessionId(session_id),
                    kind,
                    recorded_at,
                });
            }

            Ok(events)
        })
        .await
    }
}
