//! Domain model and pure rules for the interview session lifecycle engine.
//!
//! Nothing in this crate performs I/O. The server crate resolves sessions
//! against a store, runs them through [`guard`], and persists the result.

pub mod error;
pub mod events;
pub mod guard;
pub mod recording;
pub mod resolver;
pub mod result;
pub mod session;
pub mod signature;
pub mod status;

pub use error::EngineError;
pub use events::{SessionEvent, SessionEventKind};
pub use guard::Transition;
pub use recording::{
    CorrelationId, Direction, EventType, RecordedEvent, Sanitizer, ServiceType,
    CORRELATION_ID_HEADER,
};
pub use resolver::{ResolveKeys, Resolved};
pub use result::{InterviewResult, ResultPayload};
pub use session::{CandidateId, CandidateProfile, InterviewId, ResultId, Session, SessionId};
pub use status::{SessionStatus, UPDATE_TARGETS};
