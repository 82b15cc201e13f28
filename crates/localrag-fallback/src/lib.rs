//! localrag-fallback
//!
//! Rule-based fallback policy used when retrieval finds nothing: keyword
//! signals decide escalation and intent, templates turn them into a message.

pub mod handler;
pub mod signals;
pub mod templates;

pub use handler::FallbackHandler;
pub use signals::Intent;
