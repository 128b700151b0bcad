use serde_json::Value;
use std::collections::HashMap;

/// Headers that carry credentials and must be redacted.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-signature-256",
];

/// JSON keys whose values are credentials or candidate contact details.
pub const SENSITIVE_JSON_KEYS: &[&str] = &[
    "address",
    "apiKey",
    "email",
    "password",
    "secret",
    "token",
];

const REDACTED: &str = "[REDACTED]";

pub struct Sanitizer;

impl Sanitizer {
    pub fn is_sensitive_header(header_name: &str) -> bool {
        let lower = header_name.to_lowercase();
        SENSITIVE_HEADERS.contains(&lower.as_str())
    }

    pub fn sanitize_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
        headers
            .iter()
            .map(|(key, value)| {
                let value = if Self::is_sensitive_header(key) {
                    REDACTED.to_string()
                } else {
                    value.clone()
                };
                (key.clone(), value)
            })
            .collect()
    }

    /// Redact sensitive keys at any depth. Transcripts are left alone; they
    /// are the point of recording a result callback.
    pub fn sanitize_json(value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, val)| {
                        let val = if SENSITIVE_JSON_KEYS.contains(&key.as_str()) {
                            Value::String(REDACTED.to_string())
                        } else {
                            Self::sanitize_json(val)
                        };
                        (key.clone(), val)
                    })
                    .collect(),
            ),
            Value::Array(arr) => Value::Array(arr.iter().map(Self::sanitize_json).collect()),
            _ => value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sensitive_headers_redacted_case_insensitively() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer abc".to_string());
        headers.insert("X-Signature-256".to_string(), "sha256=00".to_string());
        headers.insert("content-type".to_string(), "application/json".to_string());

        let sanitized = Sanitizer::sanitize_headers(&headers);
        assert_eq!(sanitized["Authorization"], REDACTED);
        assert_eq!(sanitized["X-Signature-256"], REDACTED);
        assert_eq!(sanitized["content-type"], "application/json");
    }

    #[test]
    fn test_nested_contact_details_redacted() {
        let body = json!({
            "address": "c1@example.com",
            "template": "interview-ready",
            "variables": {"interviewUrl": "https://call.example/e1"},
            "recipients": [{"email": "c1@example.com"}]
        });

        let sanitized = Sanitizer::sanitize_json(&body);
        assert_eq!(sanitized["address"], REDACTED);
        assert_eq!(sanitized["recipients"][0]["email"], REDACTED);
        assert_eq!(sanitized["template"], "interview-ready");
        assert_eq!(
            sanitized["variables"]["interviewUrl"],
            "https://call.example/e1"
        );
    }
}
