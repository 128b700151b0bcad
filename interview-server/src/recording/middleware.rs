use super::RecordingLogger;
use axum::http;
use interview_core::recording::{
    CorrelationId, Direction, RecordedEvent, Sanitizer, ServiceType, CORRELATION_ID_HEADER,
};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result as MiddlewareResult};
use std::collections::HashMap;
use uuid::Uuid;

/// Bodies larger than this are recorded by size only.
const MAX_RECORDED_BODY: usize = 10_000;

/// Records every outbound request and its response through a
/// `RecordingLogger`, tagging both with the caller's correlation ID.
pub struct RecordingMiddleware {
    logger: RecordingLogger,
    service_type: ServiceType,
}

impl RecordingMiddleware {
    pub fn new(logger: RecordingLogger, service_type: ServiceType) -> Self {
        Self {
            logger,
            service_type,
        }
    }
}

#[async_trait::async_trait]
impl Middleware for RecordingMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> MiddlewareResult<Response> {
        // Header first, then the extension set by the caller, then a fresh ID.
        let correlation_id = req
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| extensions.get::<CorrelationId>().map(|id| id.0.clone()))
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if !req.headers().contains_key(CORRELATION_ID_HEADER) {
            if let Ok(value) = correlation_id.parse() {
                req.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
        }

        let request_data = RequestData::from_request(&req);
        self.record(
            &correlation_id,
            Direction::Request,
            format!("{} {}", request_data.method, extract_path(&request_data.url)),
            serde_json::to_value(&request_data).unwrap_or(serde_json::Value::Null),
        );

        let response = next.run(req, extensions).await;

        match &response {
            Ok(resp) => {
                let response_data = ResponseData::from_response(resp);
                self.record(
                    &correlation_id,
                    Direction::Response,
                    format!("response_{}", response_data.status_code),
                    serde_json::to_value(&response_data).unwrap_or(serde_json::Value::Null),
                );
            }
            Err(err) => {
                self.record(
                    &correlation_id,
                    Direction::Response,
                    "error".to_string(),
                    serde_json::json!({
                        "error": err.to_string(),
                        "error_type": format!("{:?}", err)
                    }),
                );
            }
        }

        response
    }
}

impl RecordingMiddleware {
    fn record(
        &self,
        correlation_id: &str,
        direction: Direction,
        operation: String,
        data: serde_json::Value,
    ) {
        self.logger.record(RecordedEvent {
            timestamp: chrono::Utc::now().to_rfc3339(),
            correlation_id: correlation_id.to_string(),
            event_type: self.service_type.event_type(),
            direction,
            operation,
            data,
            metadata: HashMap::new(),
        });
    }
}

fn header_map(headers: &http::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
}

#[derive(Debug, serde::Serialize)]
struct RequestData {
    method: String,
    url: String,
    headers: HashMap<String, String>,
    body: serde_json::Value,
}

impl RequestData {
    fn from_request(request: &Request) -> Self {
        Self {
            method: request.method().to_string(),
            url: request.url().to_string(),
            headers: Sanitizer::sanitize_headers(&header_map(request.headers())),
            body: describe_body(request.body().map(|b| b.as_bytes())),
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct ResponseData {
    status_code: u16,
    headers: HashMap<String, String>,
    body_size: u64,
}

impl ResponseData {
    fn from_response(response: &Response) -> Self {
        Self {
            status_code: response.status().as_u16(),
            headers: Sanitizer::sanitize_headers(&header_map(response.headers())),
            body_size: response.content_length().unwrap_or(0),
        }
    }
}

/// JSON bodies are recorded sanitized (notifier requests carry the
/// candidate's address); anything else is summarized.
fn describe_body(body: Option<Option<&[u8]>>) -> serde_json::Value {
    use serde_json::Value;

    match body {
        None => Value::String("[NO_BODY]".to_string()),
        Some(None) => Value::String("[STREAM_BODY]".to_string()),
        Some(Some(bytes)) if bytes.len() > MAX_RECORDED_BODY => {
            Value::String(format!("[LARGE_BODY_{}b]", bytes.len()))
        }
        Some(Some(bytes)) => match serde_json::from_slice::<Value>(bytes) {
            Ok(json) => Sanitizer::sanitize_json(&json),
            Err(_) => match std::str::from_utf8(bytes) {
                Ok(text) => Value::String(text.to_string()),
                Err(_) => Value::String(format!("[BINARY_BODY_{}b]", bytes.len())),
            },
        },
    }
}

fn extract_path(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_body_is_sanitized() {
        let body = serde_json::to_vec(&json!({
            "address": "ada@example.com",
            "template": "interview-ready",
            "variables": {"interviewUrl": "https://call.example/e1"}
        }))
        .unwrap();

        let described = describe_body(Some(Some(&body)));
        assert_eq!(described["address"], "[REDACTED]");
        assert_eq!(described["template"], "interview-ready");
        assert_eq!(
            described["variables"]["interviewUrl"],
            "https://call.example/e1"
        );
    }

    #[test]
    fn test_non_json_bodies_are_summarized() {
        assert_eq!(describe_body(None), json!("[NO_BODY]"));
        assert_eq!(describe_body(Some(None)), json!("[STREAM_BODY]"));
        assert_eq!(describe_body(Some(Some(b"plain"))), json!("plain"));
        assert_eq!(
            describe_body(Some(Some(&[0xff, 0xfe]))),
            json!("[BINARY_BODY_2b]")
        );
        let big = vec![b'x'; MAX_RECORDED_BODY + 1];
        assert_eq!(
            describe_body(Some(Some(&big))),
            json!(format!("[LARGE_BODY_{}b]", MAX_RECORDED_BODY + 1))
        );
    }

    #[test]
    fn test_extract_path() {
        assert_eq!(extract_path("https://mail.example/v1/send?x=1"), "/v1/send");
        assert_eq!(extract_path("not a url"), "not a url");
    }
}
