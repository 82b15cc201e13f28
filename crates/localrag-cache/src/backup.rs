use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use localrag_core::error::Result;
use localrag_core::traits::CacheBackup;
use localrag_core::types::BackupRecord;

/// In-process backup. Shares records between caches that hold the same `Arc`,
/// which is enough for tests and for warm restarts within one process.
#[derive(Default)]
pub struct MemoryBackup {
    records: Mutex<HashMap<String, BackupRecord>>,
}

impl MemoryBackup {
    pub fn new() -> Self { Self::default() }

    fn records(&self) -> MutexGuard<'_, HashMap<String, BackupRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize { self.records().len() }

    pub fn is_empty(&self) -> bool { self.records().is_empty() }

    pub fn contains(&self, key: &str) -> bool { self.records().contains_key(key) }
}

#[async_trait]
impl CacheBackup for MemoryBackup {
    async fn upsert(&self, record: BackupRecord) -> Result<()> {
        self.records().insert(record.key.clone(), record);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<BackupRecord>> {
        Ok(self.records().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.records().remove(key);
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.records().clear();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.records().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
