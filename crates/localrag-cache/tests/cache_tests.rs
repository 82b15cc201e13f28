use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use localrag_cache::{EmbeddingCache, MemoryBackup};
use localrag_core::error::{RagError, Result};
use localrag_core::traits::{CacheBackup, EmbeddingStore};
use localrag_core::types::{BackupRecord, Meta};

const DIM: usize = 4;

fn vec_of(x: f32) -> Vec<f32> { vec![x; DIM] }

fn cache() -> EmbeddingCache { EmbeddingCache::new(Duration::from_secs(60), DIM).unwrap() }

struct FailingBackup;

#[async_trait]
impl CacheBackup for FailingBackup {
    async fn upsert(&self, _record: BackupRecord) -> Result<()> { Err(RagError::Backup("down".into())) }
    async fn get(&self, _key: &str) -> Result<Option<BackupRecord>> { Err(RagError::Backup("down".into())) }
    async fn delete(&self, _key: &str) -> Result<()> { Err(RagError::Backup("down".into())) }
    async fn delete_all(&self) -> Result<()> { Err(RagError::Backup("down".into())) }
    async fn keys(&self) -> Result<Vec<String>> { Err(RagError::Backup("down".into())) }
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let cache = cache();
    cache.set("k", vec_of(0.5), None, Some(Duration::from_millis(100))).await.unwrap();
    assert!(cache.get("k").await.is_some());
    assert!(cache.has("k"));

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!cache.has("k"));
    assert!(cache.get("k").await.is_none());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn hits_and_misses_are_counted() {
    let cache = cache();
    assert!(cache.get("absent").await.is_none());
    cache.set("k", vec_of(1.0), None, None).await.unwrap();
    assert_eq!(cache.get("k").await.unwrap().embedding, vec_of(1.0));
    assert!(cache.get("k").await.is_some());

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.total_entries, 1);
}

#[tokio::test]
async fn has_does_not_touch_counters() {
    let cache = cache();
    cache.set("k", vec_of(1.0), None, None).await.unwrap();
    assert!(cache.has("k"));
    assert!(!cache.has("other"));
    let stats = cache.stats();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 0);
}

#[tokio::test]
async fn rejects_wrong_dimension_and_empty_key() {
    let cache = cache();
    let err = cache.set("k", vec![1.0; DIM + 1], None, None).await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
    assert!(cache.set("   ", vec_of(1.0), None, None).await.is_err());
    assert!(cache.set("k", vec_of(1.0), None, Some(Duration::ZERO)).await.is_err());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn set_replaces_existing_entry() {
    let cache = cache();
    cache.set("k", vec_of(1.0), None, None).await.unwrap();
    cache.set("k", vec_of(2.0), None, None).await.unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("k").await.unwrap().embedding, vec_of(2.0));
}

#[tokio::test]
async fn invalidates_exact_keys_and_globs() {
    let cache = cache();
    for key in ["chunk:qribar:0", "chunk:qribar:1", "chunk:reviews:0", "query:abc"] {
        cache.set(key, vec_of(1.0), None, None).await.unwrap();
    }

    assert!(cache.invalidate("query:abc").await.unwrap());
    assert!(!cache.invalidate("query:abc").await.unwrap());

    assert!(cache.invalidate("chunk:qribar:*").await.unwrap());
    assert!(!cache.has("chunk:qribar:0"));
    assert!(!cache.has("chunk:qribar:1"));
    assert!(cache.has("chunk:reviews:0"));

    assert!(!cache.invalidate("nothing:*").await.unwrap());
}

#[tokio::test]
async fn stats_track_memory_and_entry_ages() {
    let cache = cache();
    let empty = cache.stats();
    assert_eq!(empty.memory_usage_bytes, 0);
    assert!(empty.oldest_entry.is_none());
    assert!(empty.newest_entry.is_none());

    let mut meta = Meta::new();
    meta.insert("source".into(), "qribar".into());
    cache.set("a", vec_of(1.0), Some(meta), None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    cache.set("bb", vec_of(1.0), None, None).await.unwrap();

    let stats = cache.stats();
    // {"source":"qribar"} is 19 bytes
    assert_eq!(stats.memory_usage_bytes, (DIM * 4 + 1 + 19) + (DIM * 4 + 2));
    assert!(stats.oldest_entry.unwrap() <= stats.newest_entry.unwrap());
}

#[tokio::test]
async fn purge_expired_reports_removed_count() {
    let cache = cache();
    cache.set("short", vec_of(1.0), None, Some(Duration::from_millis(50))).await.unwrap();
    cache.set("long", vec_of(1.0), None, None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(cache.purge_expired(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn backup_is_written_through_and_read_through() {
    let backup = Arc::new(MemoryBackup::new());
    let first = cache().with_backup(backup.clone());
    first.set("k", vec_of(3.0), None, None).await.unwrap();
    assert!(backup.contains("k"));

    let second = cache().with_backup(backup.clone());
    let restored = second.get("k").await.unwrap();
    assert_eq!(restored.embedding, vec_of(3.0));
    // restored entries count as a miss, the next read is a local hit
    assert_eq!(second.stats().misses, 1);
    assert!(second.get("k").await.is_some());
    assert_eq!(second.stats().hits, 1);
}

#[tokio::test]
async fn expired_backup_records_are_deleted_on_read() {
    let backup = Arc::new(MemoryBackup::new());
    backup
        .upsert(BackupRecord {
            key: "old".into(),
            embedding: vec_of(1.0),
            timestamp: Utc::now() - chrono::Duration::seconds(120),
            ttl: Duration::from_secs(60),
            metadata: None,
        })
        .await
        .unwrap();
    let cache = cache().with_backup(backup.clone());
    assert!(cache.get("old").await.is_none());
    assert!(!backup.contains("old"));
}

#[tokio::test]
async fn clear_and_invalidate_reach_the_backup() {
    let backup = Arc::new(MemoryBackup::new());
    let cache = cache().with_backup(backup.clone());
    for key in ["chunk:a:0", "chunk:a:1", "chunk:b:0"] {
        cache.set(key, vec_of(1.0), None, None).await.unwrap();
    }
    cache.invalidate("chunk:a:*").await.unwrap();
    assert_eq!(backup.keys().await.unwrap(), vec!["chunk:b:0".to_string()]);

    cache.clear().await;
    assert!(cache.is_empty());
    assert!(backup.is_empty());
}

#[tokio::test]
async fn failing_backup_never_surfaces() {
    let cache = cache().with_backup(Arc::new(FailingBackup));
    cache.set("k", vec_of(1.0), None, None).await.unwrap();
    assert!(cache.get("k").await.is_some());
    assert!(cache.get("missing").await.is_none());
    assert!(cache.invalidate("k").await.unwrap());
    assert!(!cache.invalidate("*").await.unwrap());
    cache.clear().await;
}

#[tokio::test]
async fn works_through_the_store_trait() {
    let cache = cache();
    let store: &dyn EmbeddingStore = &cache;
    store.store("k", vec_of(1.0), None).await.unwrap();
    assert_eq!(store.lookup("k").await, Some(vec_of(1.0)));
    assert!(store.invalidate_pattern("k*").await.unwrap());
    store.clear().await.unwrap();
    assert_eq!(store.stats().total_entries, 0);
}

#[tokio::test]
async fn reset_stats_zeroes_counters_but_keeps_entries() {
    let cache = cache();
    cache.set("k", vec_of(1.0), None, None).await.unwrap();
    cache.get("k").await;
    cache.get("absent").await;
    let store: &dyn EmbeddingStore = &cache;
    store.reset_stats();

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (0, 0));
    assert_eq!(stats.hit_rate, 0.0);
    assert_eq!(stats.total_entries, 1);
}
