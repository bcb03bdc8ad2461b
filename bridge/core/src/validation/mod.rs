//! Validation at both edges of the bridge
//!
//! - [`input`]: caller-supplied query text, rejected with `InvalidQuery`
//! - [`payload`]: backend payloads, normalized and never rejected

pub mod input;
pub mod payload;

pub use input::{QueryValidator, MAX_QUERY_CHARS};
pub use payload::RawPayload;
