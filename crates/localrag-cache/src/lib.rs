//! localrag-cache
//!
//! TTL embedding cache ([`EmbeddingCache`]) with pluggable durable backups:
//! [`MemoryBackup`] always, `LanceBackup` with the `lance` feature.

pub mod backup;
pub mod cache;
pub mod glob;
#[cfg(feature = "lance")]
pub mod lance;

pub use backup::MemoryBackup;
pub use cache::{CacheEntry, EmbeddingCache};
#[cfg(feature = "lance")]
pub use lance::LanceBackup;
