//! Types for recording inbound callbacks and outbound notifier calls.
//!
//! The writer lives in the server crate; these types are shared so recorded
//! JSONL files can be read back by tooling.

pub mod sanitizer;
pub mod types;

pub use sanitizer::{Sanitizer, SENSITIVE_HEADERS, SENSITIVE_JSON_KEYS};
pub use types::*;
