use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::types::{BackupRecord, CacheStats, Meta};

/// Turns text into a fixed-dimension vector.
///
/// Failures must be reported, never papered over with a default vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    /// Embedding dimensionality (D).
    fn dimensions(&self) -> usize;
    fn model_name(&self) -> &str;
}

/// Optional durable copy of the embedding cache. Every call is best-effort
/// from the cache's point of view.
#[async_trait]
pub trait CacheBackup: Send + Sync {
    /// Insert or replace the record stored under `record.key`.
    async fn upsert(&self, record: BackupRecord) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<BackupRecord>>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn delete_all(&self) -> Result<()>;
    /// All stored keys; used for glob invalidation.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// The cache surface the orchestrator depends on.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    async fn lookup(&self, key: &str) -> Option<Vec<f32>>;
    async fn store(&self, key: &str, embedding: Vec<f32>, metadata: Option<Meta>) -> Result<()>;
    /// Remove everything. Every store must support this.
    async fn clear(&self) -> Result<()>;
    /// Remove entries whose key matches `pattern`; returns whether anything was removed.
    async fn invalidate_pattern(&self, pattern: &str) -> Result<bool> {
        Err(RagError::Unsupported(format!("pattern invalidation ('{}') is not supported by this cache", pattern)))
    }
    fn stats(&self) -> CacheStats;
    /// Zero the hit/miss counters. Stores without counters keep the default no-op.
    fn reset_stats(&self) {}
}
