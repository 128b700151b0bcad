use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::engine::{DEFAULT_NOTIFY_TEMPLATE, DEFAULT_NOTIFY_TIMEOUT};
use crate::notifier::DEFAULT_REQUEST_TIMEOUT;

pub const DATABASE_FILE_NAME: &str = "interview-sessions.db";

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    /// When set, every callback must carry a valid `X-Signature-256` header.
    pub webhook_secret: Option<String>,
    /// Mail API endpoint and key. Notifications are only sent when both are
    /// set; otherwise they are logged and reported as skipped.
    pub notify_api: Option<NotifyApi>,
    pub notify_template: String,
    pub notify_timeout: Duration,
    /// Hard limit on each mail API request.
    pub notify_request_timeout: Duration,
    pub recording_enabled: bool,
    pub recording_log_path: String,
    /// Optional bearer token for the session inspection endpoint.
    /// If not set, the endpoint is disabled (returns 503).
    pub status_auth_token: Option<String>,
}

#[derive(Clone)]
pub struct NotifyApi {
    pub url: Url,
    pub api_key: String,
}

impl std::fmt::Debug for NotifyApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyApi")
            .field("url", &self.url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = lookup("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let webhook_secret = non_blank(lookup("WEBHOOK_SECRET"));

        let notify_api = match (
            non_blank(lookup("NOTIFY_API_URL")),
            non_blank(lookup("NOTIFY_API_KEY")),
        ) {
            (Some(url), Some(api_key)) => Some(NotifyApi {
                url: Url::parse(url.trim()).context("NOTIFY_API_URL must be a valid URL")?,
                api_key,
            }),
            _ => None,
        };

        let notify_template = non_blank(lookup("NOTIFY_TEMPLATE"))
            .unwrap_or_else(|| DEFAULT_NOTIFY_TEMPLATE.to_string());

        let notify_timeout = seconds(&lookup, "NOTIFY_TIMEOUT_SECS", DEFAULT_NOTIFY_TIMEOUT)?;
        let notify_request_timeout = seconds(
            &lookup,
            "NOTIFY_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT,
        )?;

        let recording_enabled = lookup("RECORDING_ENABLED")
            .unwrap_or_else(|| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let recording_log_path =
            lookup("RECORDING_LOG_PATH").unwrap_or_else(|| "recordings.jsonl".to_string());

        let status_auth_token = parse_status_auth_token(lookup("STATUS_AUTH_TOKEN"));

        Ok(Config {
            port,
            state_dir,
            webhook_secret,
            notify_api,
            notify_template,
            notify_timeout,
            notify_request_timeout,
            recording_enabled,
            recording_log_path,
            status_auth_token,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join(DATABASE_FILE_NAME)
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .with_context(|| format!("{} must be a whole number of seconds", key)),
        None => Ok(default),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Parse STATUS_AUTH_TOKEN from an optional string value.
///
/// Returns None if the value is missing, empty, or contains only whitespace,
/// so an empty token can never authenticate a request.
pub fn parse_status_auth_token(value: Option<String>) -> Option<String> {
    non_blank(value)
}
