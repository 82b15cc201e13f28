//! TTL embedding cache with optional write-through / read-through backup.
//!
//! The local map is the source of truth. Backup calls are best-effort: their
//! failures are logged and never reach the caller. Hit/miss counters measure
//! the local map only, so an entry restored from the backup counts as a miss.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use localrag_core::error::{RagError, Result};
use localrag_core::traits::{CacheBackup, EmbeddingStore};
use localrag_core::types::{BackupRecord, CacheStats, Meta};

use crate::glob::{glob_to_regex, is_glob};

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub embedding: Vec<f32>,
    pub timestamp: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ttl: Duration,
    pub metadata: Option<Meta>,
}

impl CacheEntry {
    fn new(key: &str, embedding: Vec<f32>, metadata: Option<Meta>, ttl: Duration, timestamp: DateTime<Utc>) -> Result<Self> {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| timestamp.checked_add_signed(ttl))
            .ok_or_else(|| RagError::Validation(format!("ttl {:?} is out of range", ttl)))?;
        Ok(Self { key: key.to_string(), embedding, timestamp, expires_at, ttl, metadata })
    }

    /// Expired once strictly more than `ttl` has passed since `timestamp`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool { now > self.expires_at }

    fn to_record(&self) -> BackupRecord {
        BackupRecord {
            key: self.key.clone(),
            embedding: self.embedding.clone(),
            timestamp: self.timestamp,
            ttl: self.ttl,
            metadata: self.metadata.clone(),
        }
    }

    fn from_record(record: BackupRecord) -> Result<Self> {
        Self::new(&record.key, record.embedding, record.metadata, record.ttl, record.timestamp)
    }

    fn estimated_size(&self) -> usize {
        let metadata_len = self
            .metadata
            .as_ref()
            .and_then(|m| serde_json::to_string(m).ok())
            .map(|s| s.len())
            .unwrap_or(0);
        self.embedding.len() * std::mem::size_of::<f32>() + self.key.len() + metadata_len
    }
}

pub struct EmbeddingCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    default_ttl: Duration,
    dimension: usize,
    backup: Option<Arc<dyn CacheBackup>>,
}

impl EmbeddingCache {
    pub fn new(default_ttl: Duration, dimension: usize) -> Result<Self> {
        if default_ttl.is_zero() {
            return Err(RagError::Validation("cache ttl must be greater than zero".into()));
        }
        if dimension == 0 {
            return Err(RagError::Validation("cache dimension must be greater than zero".into()));
        }
        Ok(Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            default_ttl,
            dimension,
            backup: None,
        })
    }

    pub fn with_backup(mut self, backup: Arc<dyn CacheBackup>) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn default_ttl(&self) -> Duration { self.default_ttl }

    pub fn dimension(&self) -> usize { self.dimension }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = Utc::now();
        {
            let mut entries = self.entries();
            let expired = match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key, "cache hit");
                    return Some(entry.clone());
                }
                Some(_) => true,
                None => false,
            };
            if expired {
                entries.remove(key);
                tracing::debug!(key, "cache entry expired");
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key, "cache miss");

        let backup = self.backup.as_ref()?;
        let record = match backup.get(key).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "backup read failed");
                return None;
            }
        };
        if record.is_expired(Utc::now()) {
            if let Err(e) = backup.delete(key).await {
                tracing::warn!(key, error = %e, "failed to delete expired backup entry");
            }
            return None;
        }
        if record.embedding.len() != self.dimension {
            tracing::warn!(key, got = record.embedding.len(), expected = self.dimension, "backup entry has wrong dimension");
            return None;
        }
        match CacheEntry::from_record(record) {
            Ok(entry) => {
                self.entries().insert(key.to_string(), entry.clone());
                tracing::debug!(key, "restored cache entry from backup");
                Some(entry)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "unusable backup entry");
                None
            }
        }
    }

    /// Insert or replace `key`. Rejects an empty key and a vector of the wrong
    /// dimension without touching the cache.
    pub async fn set(&self, key: &str, embedding: Vec<f32>, metadata: Option<Meta>, ttl: Option<Duration>) -> Result<()> {
        if key.trim().is_empty() {
            return Err(RagError::Validation("cache key must not be empty".into()));
        }
        if embedding.len() != self.dimension {
            return Err(RagError::Validation(format!(
                "embedding for '{}' has {} dimensions, expected {}",
                key,
                embedding.len(),
                self.dimension
            )));
        }
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            return Err(RagError::Validation("ttl override must be greater than zero".into()));
        }
        let entry = CacheEntry::new(key, embedding, metadata, ttl, Utc::now())?;
        let record = self.backup.as_ref().map(|_| entry.to_record());
        self.entries().insert(key.to_string(), entry);

        if let (Some(backup), Some(record)) = (&self.backup, record) {
            if let Err(e) = backup.upsert(record).await {
                tracing::warn!(key, error = %e, "backup write failed");
            }
        }
        Ok(())
    }

    /// Remove an exact key or every key matching a glob (`*`, `?`), locally and
    /// in the backup. Returns whether any local entry was removed.
    pub async fn invalidate(&self, pattern: &str) -> Result<bool> {
        if !is_glob(pattern) {
            let removed = self.entries().remove(pattern).is_some();
            if let Some(backup) = &self.backup {
                if let Err(e) = backup.delete(pattern).await {
                    tracing::warn!(key = pattern, error = %e, "backup delete failed");
                }
            }
            return Ok(removed);
        }

        let re = glob_to_regex(pattern)?;
        let removed = {
            let mut entries = self.entries();
            let before = entries.len();
            entries.retain(|k, _| !re.is_match(k));
            before - entries.len()
        };
        if let Some(backup) = &self.backup {
            match backup.keys().await {
                Ok(keys) => {
                    for key in keys.iter().filter(|k| re.is_match(k)) {
                        if let Err(e) = backup.delete(key).await {
                            tracing::warn!(key = %key, error = %e, "backup delete failed");
                        }
                    }
                }
                Err(e) => tracing::warn!(pattern, error = %e, "backup key listing failed"),
            }
        }
        tracing::info!(pattern, removed, "invalidated cache entries");
        Ok(removed > 0)
    }

    /// Local presence of a live entry. Does not count as a hit or miss.
    pub fn has(&self, key: &str) -> bool {
        let now = Utc::now();
        let mut entries = self.entries();
        match entries.get(key).map(|e| e.is_expired(now)) {
            Some(false) => true,
            Some(true) => {
                entries.remove(key);
                false
            }
            None => false,
        }
    }

    pub async fn clear(&self) {
        let removed = {
            let mut entries = self.entries();
            let n = entries.len();
            entries.clear();
            n
        };
        if let Some(backup) = &self.backup {
            if let Err(e) = backup.delete_all().await {
                tracing::warn!(error = %e, "backup clear failed");
            }
        }
        tracing::info!(removed, "cache cleared");
    }

    /// Drop every expired local entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize { self.entries().len() }

    pub fn is_empty(&self) -> bool { self.entries().is_empty() }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 { 0.0 } else { hits as f64 / total as f64 };

        let entries = self.entries();
        CacheStats {
            total_entries: entries.len(),
            hits,
            misses,
            hit_rate,
            memory_usage_bytes: entries.values().map(CacheEntry::estimated_size).sum(),
            oldest_entry: entries.values().map(|e| e.timestamp).min(),
            newest_entry: entries.values().map(|e| e.timestamp).max(),
        }
    }
}

#[async_trait]
impl EmbeddingStore for EmbeddingCache {
    async fn lookup(&self, key: &str) -> Option<Vec<f32>> {
        self.get(key).await.map(|entry| entry.embedding)
    }

    async fn store(&self, key: &str, embedding: Vec<f32>, metadata: Option<Meta>) -> Result<()> {
        self.set(key, embedding, metadata, None).await
    }

    async fn clear(&self) -> Result<()> {
        EmbeddingCache::clear(self).await;
        Ok(())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<bool> {
        self.invalidate(pattern).await
    }

    fn stats(&self) -> CacheStats { EmbeddingCache::stats(self) }

    fn reset_stats(&self) { EmbeddingCache::reset_stats(self) }
}
