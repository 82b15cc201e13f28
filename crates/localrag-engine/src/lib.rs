//! localrag-engine
//!
//! Indexing, cosine ranking and the [`RagOrchestrator`] that ties the
//! embedding provider, cache and fallback handler together.

pub mod indexer;
pub mod orchestrator;
pub mod ranking;

pub use indexer::Indexer;
pub use orchestrator::RagOrchestrator;
pub use ranking::{cosine_similarity, rank_chunks};
