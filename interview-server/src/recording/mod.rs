//! JSONL recording of inbound callbacks and outbound notifier calls.
//!
//! Event types and the sanitizer live in `interview_core::recording`; this
//! module owns the file writer and the reqwest middleware.

pub mod logger;
pub mod middleware;

pub use logger::RecordingLogger;
pub use middleware::RecordingMiddleware;
