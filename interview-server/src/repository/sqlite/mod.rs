//! SQLite implementation of `SessionRepository` and `ContactDirectory`.
//!
//! # Migrations
//!
//! `schema_version` holds a single row. On open, `migrate` applies every step
//! above the stored version in order: v1 sessions, profiles and results; v2
//! one result per session; v3 the session event log. A database written by a
//! newer build is refused rather than downgraded.
//!
//! # Uniqueness
//!
//! `sessions.external_interview_id` is unique: it is the key the interview
//! system owns. `candidate_id` is indexed but not unique. Since v2,
//! `interview_results.session_id` is unique, which is what makes a
//! redelivered result submission reuse the first result.

mod events;
mod results;


use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;

use interview_core::{
    CandidateId, CandidateProfile, InterviewId, InterviewResult, ResultId, Session, SessionEvent,
    SessionId, SessionStatus,
};

use super::{
    from_millis, to_millis, ContactDirectory, RepositoryError, ResultInsert, SessionRepository,
};

const CURRENT_SCHEMA_VERSION: i64 = 3;

const SESSION_COLUMNS: &str =
    "id, candidate_id, external_interview_id, status, interview_url, result_id, updated_at";

/// SQLite-backed repository.
///
/// A single connection behind a mutex; every call runs on the blocking pool
/// via `tokio::task::spawn_blocking`.
pub struct SqliteRepository {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Open (or create) the database at `path` and bring its schema up to date.
    ///
    /// The database is configured with:
    /// - `journal_mode = WAL` for concurrent readers and crash safety
    /// - `synchronous = FULL` so acknowledged writes survive power loss
    /// - `busy_timeout = 5000ms` to ride out lock contention
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();
        let is_in_memory = path_str == ":memory:";

        if !is_in_memory && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                    restrict_permissions(parent, 0o700, "state directory");
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| RepositoryError::storage("open database", e.to_string()))?;

        // Results hold transcripts and candidate data.
        if !is_in_memory && !path_str.is_empty() {
            restrict_permissions(path_ref, 0o600, "database file");
        }

        // SQLite silently keeps DELETE mode on filesystems without shared
        // memory support, so check what we actually got.
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| RepositoryError::storage("set journal_mode", e.to_string()))?;

        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));
        if !journal_mode_ok {
            return Err(RepositoryError::storage(
                "configure journal_mode",
                format!(
                    "SQLite returned journal mode '{}' instead of 'wal'; \
                     the state directory must be on a filesystem with shared memory support",
                    journal_mode
                ),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            "#,
        )
        .map_err(|e| RepositoryError::storage("configure pragmas", e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| RepositoryError::storage("create schema_version table", e.to_string()))?;

        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::migrate(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate(conn: &Connection, stored: i64) -> Result<(), RepositoryError> {
        if stored > CURRENT_SCHEMA_VERSION {
            return Err(RepositoryError::storage(
                "schema version",
                format!(
                    "stored schema v{} is newer than this build (v{}); \
                     refusing to open",
                    stored, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if stored == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if stored < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS sessions (
                    id TEXT PRIMARY KEY,
                    candidate_id TEXT NOT NULL,
                    external_interview_id TEXT NOT NULL UNIQUE,
                    status TEXT NOT NULL,
                    interview_url TEXT,
                    result_id TEXT,
                    updated_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_candidate
                    ON sessions(candidate_id, updated_at DESC);

                CREATE TABLE IF NOT EXISTS profiles (
                    candidate_id TEXT PRIMARY KEY,
                    email TEXT,
                    full_name TEXT
                );

                CREATE TABLE IF NOT EXISTS interview_results (
                    id TEXT PRIMARY KEY,
                    session_id TEXT NOT NULL REFERENCES sessions(id),
                    candidate_id TEXT NOT NULL,
                    external_interview_id TEXT NOT NULL,
                    transcript TEXT,
                    recording_url TEXT,
                    stereo_recording_url TEXT,
                    cost REAL,
                    cost_breakdown TEXT,
                    analysis TEXT,
                    monitor TEXT,
                    transport TEXT,
                    messages TEXT,
                    summary TEXT,
                    display_summary TEXT,
                    ended_reason TEXT,
                    provider_started_at TEXT,
                    provider_ended_at TEXT,
                    extra TEXT NOT NULL DEFAULT '{}',
                    created_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_results_session
                    ON interview_results(session_id);
                "#,
            )
            .map_err(|e| RepositoryError::storage("migration v1", e.to_string()))?;
        }

        // v2: at most one result per session.
        if stored < 2 {
            conn.execute_batch(
                r#"
                DROP INDEX IF EXISTS idx_results_session;
                CREATE UNIQUE INDEX IF NOT EXISTS idx_results_session_unique
                    ON interview_results(session_id);
                "#,
            )
            .map_err(|e| RepositoryError::storage("migration v2", e.to_string()))?;
        }

        // v3: per-session event log.
        if stored < 3 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS session_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id TEXT NOT NULL,
                    event_type TEXT NOT NULL,
                    event_data TEXT NOT NULL,
                    recorded_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_session_events_lookup
                    ON session_events(session_id, recorded_at DESC);
                "#,
            )
            .map_err(|e| RepositoryError::storage("migration v3", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| RepositoryError::storage("update schema version", e.to_string()))?;

        Ok(())
    }

    /// Create a new in-memory SQLite repository (for tests and ephemeral runs).
    pub fn new_in_memory() -> Result<Self, RepositoryError> {
        Self::new(":memory:")
    }

    /// Run `f` against the connection on the blocking pool.
    pub(super) async fn with_conn<T, F>(
        &self,
        operation: &'static str,
        f: F,
    ) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn, operation)?;
            f(&guard)
        })
        .await
        .map_err(|e| RepositoryError::storage(operation, e.to_string()))?
    }
}

fn lock<'a>(
    conn: &'a Mutex<Connection>,
    operation: &'static str,
) -> Result<MutexGuard<'a, Connection>, RepositoryError> {
    conn.lock()
        .map_err(|_| RepositoryError::storage(operation, "connection mutex poisoned"))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32, what: &str) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)) {
        warn!("Failed to set restrictive permissions on {}: {}", what, e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32, _what: &str) {}

/// Map constraint violations to `Conflict`, everything else to `Storage`.
pub(super) fn map_write_error(
    operation: &'static str,
    what: String,
    err: rusqlite::Error,
) -> RepositoryError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            RepositoryError::conflict(what)
        }
        other => RepositoryError::storage(operation, other.to_string()),
    }
}

/// Raw session columns, converted after the row is read so decoding errors
/// surface as corruption rather than SQLite errors.
struct SessionRow {
    id: String,
    candidate_id: String,
    external_interview_id: String,
    status: String,
    interview_url: Option<String>,
    result_id: Option<String>,
    updated_at: i64,
}

impl SessionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            candidate_id: row.get(1)?,
            external_interview_id: row.get(2)?,
            status: row.get(3)?,
            interview_url: row.get(4)?,
            result_id: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_session(self) -> Result<Session, RepositoryError> {
        let status: SessionStatus = self.status.parse().map_err(|_| {
            RepositoryError::corruption(format!("status {:?} for session {}", self.status, self.id))
        })?;
        Ok(Session {
            updated_at: from_millis(self.updated_at, "session updated_at")?,
            id: SessionId(self.id),
            candidate_id: CandidateId(self.candidate_id),
            external_interview_id: InterviewId(self.external_interview_id),
            status,
            interview_url: self.interview_url,
            result_id: self.result_id.map(ResultId),
        })
    }
}

fn get_session_sync(conn: &Connection, id: &str) -> Result<Option<Session>, RepositoryError> {
    conn.query_row(
        &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
        params![id],
        SessionRow::read,
    )
    .optional()
    .map_err(|e| RepositoryError::storage("get_session", e.to_string()))?
    .map(SessionRow::into_session)
    .transpose()
}

#[async_trait]
impl SessionRepository for SqliteRepository {
    async fn insert_session(&self, session: &Session) -> Result<(), RepositoryError> {
        let session = session.clone();
        self.with_conn("insert_session", move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO sessions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    SESSION_COLUMNS
                ),
                params![
                    session.id.0,
                    session.candidate_id.0,
                    session.external_interview_id.0,
                    session.status.as_str(),
                    session.interview_url,
                    session.result_id.as_ref().map(|r| r.0.clone()),
                    to_millis(session.updated_at),
                ],
            )
            .map_err(|e| {
                map_write_error(
                    "insert_session",
                    format!("session for interview {}", session.external_interview_id),
                    e,
                )
            })?;
            Ok(())
        })
        .await
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let id = id.0.clone();
        self.with_conn("get_session", move |conn| get_session_sync(conn, &id))
            .await
    }

    async fn find_matching(
        &self,
        candidate: Option<&CandidateId>,
        interview: Option<&InterviewId>,
    ) -> Result<Vec<Session>, RepositoryError> {
        let candidate = candidate.map(|c| c.0.clone());
        let interview = interview.map(|i| i.0.clone());

        self.with_conn("find_matching", move |conn| {
            // A NULL parameter never compares equal, so an absent key simply
            // drops out of the OR.
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM sessions
                     WHERE candidate_id = ?1 OR external_interview_id = ?2
                     ORDER BY updated_at DESC, id DESC",
                    SESSION_COLUMNS
                ))
                .map_err(|e| RepositoryError::storage("find_matching", e.to_string()))?;

            let rows = stmt
                .query_map(params![candidate, interview], SessionRow::read)
                .map_err(|e| RepositoryError::storage("find_matching", e.to_string()))?;

            let mut sessions = Vec::new();
            for row in rows {
                let row =
                    row.map_err(|e| RepositoryError::storage("find_matching row", e.to_string()))?;
                sessions.push(row.into_session()?);
            }
            Ok(sessions)
        })
        .await
    }

    async fn update_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
        interview_url: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Session>, RepositoryError> {
        let id = id.0.clone();
        let interview_url = interview_url.map(str::to_string);
        let updated_at = to_millis(updated_at);

        self.with_conn("update_status", move |conn| {
            conn.query_row(
                &format!(
                    "UPDATE sessions
                     SET status = ?2,
                         interview_url = COALESCE(?3, interview_url),
                         updated_at = ?4
                     WHERE id = ?1
                     RETURNING {}",
                    SESSION_COLUMNS
                ),
                params![id, status.as_str(), interview_url, updated_at],
                SessionRow::read,
            )
            .optional()
            .map_err(|e| RepositoryError::storage("update_status", e.to_string()))?
            .map(SessionRow::into_session)
            .transpose()
        })
        .await
    }

    async fn set_result_id(
        &self,
        id: &SessionId,
        result_id: &ResultId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let id = id.0.clone();
        let result_id = result_id.0.clone();
        let updated_at = to_millis(updated_at);

        self.with_conn("set_result_id", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE sessions SET result_id = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id, result_id, updated_at],
                )
                .map_err(|e| RepositoryError::storage("set_result_id", e.to_string()))?;
            if changed == 0 {
                return Err(RepositoryError::storage(
                    "set_result_id",
                    format!("no session {}", id),
                ));
            }
            Ok(())
        })
        .await
    }

    async fn insert_result(
        &self,
        result: &InterviewResult,
    ) -> Result<ResultInsert, RepositoryError> {
        self.insert_result_impl(result).await
    }

    async fn get_result(&self, id: &ResultId) -> Result<Option<InterviewResult>, RepositoryError> {
        self.get_result_impl(id).await
    }

    async fn get_result_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<InterviewResult>, RepositoryError> {
        self.get_result_for_session_impl(session_id).await
    }

    async fn log_event(&self, event: &SessionEvent) -> Result<(), RepositoryError> {
        self.log_event_impl(event).await
    }

    async fn get_session_events(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<SessionEvent>, RepositoryError> {
        self.get_session_events_impl(session_id, limit).await
    }
}

#[async_trait]
impl ContactDirectory for SqliteRepository {
    async fn get_profile(
        &self,
        candidate: &CandidateId,
    ) -> Result<Option<CandidateProfile>, RepositoryError> {
        let candidate = candidate.0.clone();
        self.with_conn("get_profile", move |conn| {
            conn.query_row(
                "SELECT candidate_id, email, full_name FROM profiles WHERE candidate_id = ?1",
                params![candidate],
                |row| {
                    Ok(CandidateProfile {
                        candidate_id: CandidateId(row.get(0)?),
                        email: row.get(1)?,
                        full_name: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get_profile", e.to_string()))
        })
        .await
    }

    async fn upsert_profile(&self, profile: &CandidateProfile) -> Result<(), RepositoryError> {
        let profile = profile.clone();
        self.with_conn("upsert_profile", move |conn| {
            conn.execute(
                "INSERT INTO profiles (candidate_id, email, full_name) VALUES (?1, ?2, ?3)
                 ON CONFLICT(candidate_id) DO UPDATE SET
                     email = excluded.email,
                     full_name = excluded.full_name",
                params![profile.candidate_id.0, profile.email, profile.full_name],
            )
            .map_err(|e| RepositoryError::storage("upsert_profile", e.to_string()))?;
            Ok(())
        })
        .await
    }
}
