use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One line of the recording log.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecordedEvent {
    pub timestamp: String,      // RFC 3339
    pub correlation_id: String, // groups a callback with the calls it caused
    pub event_type: EventType,
    pub direction: Direction,
    pub operation: String,       // e.g. "session_ready", "POST /v1/send"
    pub data: serde_json::Value, // sanitized request/response data
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum EventType {
    CallbackReceived,
    NotifierApiCall,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Direction {
    Request,
    Response,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ServiceType {
    Notifier,
}

impl ServiceType {
    pub fn event_type(&self) -> EventType {
        match self {
            ServiceType::Notifier => EventType::NotifierApiCall,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub String);

pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";
