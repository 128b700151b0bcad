//! Outbound candidate notifications.
//!
//! Delivery is best-effort: the engine records the outcome but never lets a
//! notifier error change an entry point's response.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use interview_core::recording::{ServiceType, CORRELATION_ID_HEADER};

use crate::recording::{RecordingLogger, RecordingMiddleware};

/// Per-request limit on the mail API call, independent of how long
/// "session ready" waits before answering.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Message handed to the notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub address: String,
    pub template: String,
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    /// No channel is configured; nothing was sent.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(String),

    #[error("notification rejected with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("notification timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// `correlation_id` ties the outbound call to the callback that caused it
    /// in the recording log.
    async fn send(
        &self,
        notification: &Notification,
        correlation_id: Option<&str>,
    ) -> Result<NotifyOutcome, NotifyError>;
}

/// Posts notifications as JSON to a mail-sending HTTP API.
pub struct HttpNotifier {
    client: ClientWithMiddleware,
    endpoint: Url,
    api_key: String,
    request_timeout: Duration,
}

impl HttpNotifier {
    pub fn new(
        endpoint: Url,
        api_key: String,
        request_timeout: Duration,
        recording_logger: Option<RecordingLogger>,
    ) -> Result<Self> {
        Ok(Self {
            client: create_notifier_client(request_timeout, recording_logger)?,
            endpoint,
            api_key,
            request_timeout,
        })
    }
}

pub fn create_notifier_client(
    request_timeout: Duration,
    recording_logger: Option<RecordingLogger>,
) -> Result<ClientWithMiddleware> {
    let client = Client::builder()
        .user_agent(concat!("interview-server/", env!("CARGO_PKG_VERSION")))
        .timeout(request_timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let mut builder = ClientBuilder::new(client);
    if let Some(logger) = recording_logger {
        builder = builder.with(RecordingMiddleware::new(logger, ServiceType::Notifier));
    }

    Ok(builder.build())
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(
        &self,
        notification: &Notification,
        correlation_id: Option<&str>,
    ) -> Result<NotifyOutcome, NotifyError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(notification);
        if let Some(id) = correlation_id {
            request = request.header(CORRELATION_ID_HEADER, id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| match e {
                reqwest_middleware::Error::Reqwest(inner) if inner.is_timeout() => {
                    NotifyError::Timeout(self.request_timeout)
                }
                other => NotifyError::Request(other.to_string()),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Notification API returned {}: {}", status, body);
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            "Sent '{}' notification via {}",
            notification.template, self.endpoint
        );
        Ok(NotifyOutcome::Sent)
    }
}

/// Used when no notification API is configured.
pub struct LogOnlyNotifier;

#[async_trait]
impl Notifier for LogOnlyNotifier {
    async fn send(
        &self,
        notification: &Notification,
        _correlation_id: Option<&str>,
    ) -> Result<NotifyOutcome, NotifyError> {
        info!(
            "Notification API not configured; skipping '{}' notification",
            notification.template
        );
        Ok(NotifyOutcome::Skipped {
            reason: "notification API not configured".to_string(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(HeaderMap, serde_json::Value)>>>;

    async fn spawn_mail_api(status: StatusCode) -> (Url, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/v1/send",
                post(
                    move |State(captured): State<Captured>,
                          headers: HeaderMap,
                          Json(body): Json<serde_json::Value>| async move {
                        captured.lock().unwrap().push((headers, body));
                        (status, "done")
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = Url::parse(&format!("http://{}/v1/send", addr)).unwrap();
        (url, captured)
    }

    fn notification() -> Notification {
        Notification {
            address: "ada@example.com".to_string(),
            template: "interview-ready".to_string(),
            variables: BTreeMap::from([(
                "interviewUrl".to_string(),
                "https://call.example/e1".to_string(),
            )]),
        }
    }

    #[tokio::test]
    async fn test_http_notifier_posts_json_with_bearer_key() {
        let (url, captured) = spawn_mail_api(StatusCode::OK).await;
        let notifier =
            HttpNotifier::new(url, "key-123".to_string(), DEFAULT_REQUEST_TIMEOUT, None).unwrap();

        let outcome = notifier
            .send(&notification(), Some("corr-1"))
            .await
            .unwrap();
        assert_eq!(outcome, NotifyOutcome::Sent);

        let captured = captured.lock().unwrap();
        let (headers, body) = &captured[0];
        assert_eq!(headers["authorization"], "Bearer key-123");
        assert_eq!(headers["x-correlation-id"], "corr-1");
        assert_eq!(body["address"], "ada@example.com");
        assert_eq!(body["template"], "interview-ready");
        assert_eq!(body["variables"]["interviewUrl"], "https://call.example/e1");
    }

    #[tokio::test]
    async fn test_http_notifier_non_2xx_is_error() {
        let (url, _) = spawn_mail_api(StatusCode::UNPROCESSABLE_ENTITY).await;
        let notifier =
            HttpNotifier::new(url, "key-123".to_string(), DEFAULT_REQUEST_TIMEOUT, None).unwrap();

        let err = notifier.send(&notification(), None).await.unwrap_err();
        assert_eq!(
            err,
            NotifyError::Rejected {
                status: 422,
                body: "done".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_http_notifier_unreachable_is_request_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{}/v1/send", addr)).unwrap();
        let notifier =
            HttpNotifier::new(url, "key".to_string(), DEFAULT_REQUEST_TIMEOUT, None).unwrap();
        let err = notifier.send(&notification(), None).await.unwrap_err();
        assert!(matches!(err, NotifyError::Request(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_http_notifier_gives_up_on_hung_api() {
        let app = Router::new().route(
            "/v1/send",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = Url::parse(&format!("http://{}/v1/send", addr)).unwrap();
        let timeout = Duration::from_millis(100);
        let notifier = HttpNotifier::new(url, "key".to_string(), timeout, None).unwrap();

        let started = std::time::Instant::now();
        let err = notifier.send(&notification(), None).await.unwrap_err();
        assert_eq!(err, NotifyError::Timeout(timeout));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_log_only_notifier_skips() {
        let outcome = LogOnlyNotifier.send(&notification(), None).await.unwrap();
        assert!(matches!(outcome, NotifyOutcome::Skipped { .. }));
    }
}
