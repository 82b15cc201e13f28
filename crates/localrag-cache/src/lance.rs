//! LanceDB-backed durable copy of the embedding cache.
//!
//! One row per cache key. Upserts go through `merge_insert` on `key`, so a
//! re-set key replaces its row instead of duplicating it.

use std::sync::Arc;
use std::time::Duration;

use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{
    Array, FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray,
};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use async_trait::async_trait;
use chrono::DateTime;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection, Table};

use localrag_core::error::{RagError, Result};
use localrag_core::traits::CacheBackup;
use localrag_core::types::{BackupRecord, Meta};

pub const DEFAULT_TABLE: &str = "embedding_cache";

fn backup_err(e: impl std::fmt::Display) -> RagError { RagError::Backup(e.to_string()) }

fn quote(key: &str) -> String { format!("'{}'", key.replace('\'', "''")) }

pub struct LanceBackup {
    conn: Connection,
    table: String,
    dim: i32,
}

impl LanceBackup {
    /// Connect to `uri` and create the cache table when missing.
    pub async fn open(uri: &str, table: &str, dim: usize) -> Result<Self> {
        let dim = i32::try_from(dim).map_err(|_| RagError::Validation(format!("dimension {} is too large", dim)))?;
        let conn = connect(uri).execute().await.map_err(backup_err)?;
        let backup = Self { conn, table: table.to_string(), dim };
        backup.ensure_table().await?;
        tracing::info!(uri, table, "lance cache backup ready");
        Ok(backup)
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("key", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), self.dim),
                true,
            ),
            Field::new("created_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
            Field::new("ttl_ms", DataType::Int64, false),
            Field::new("metadata", DataType::Utf8, true),
        ]))
    }

    async fn ensure_table(&self) -> Result<()> {
        let names = self.conn.table_names().execute().await.map_err(backup_err)?;
        if names.contains(&self.table) {
            return Ok(());
        }
        let iter = RecordBatchIterator::new(vec![].into_iter(), self.schema());
        self.conn.create_table(&self.table, Box::new(iter)).execute().await.map_err(backup_err)?;
        Ok(())
    }

    async fn open_table(&self) -> Result<Table> {
        self.conn.open_table(&self.table).execute().await.map_err(backup_err)
    }

    fn to_batch(&self, record: &BackupRecord) -> Result<RecordBatch> {
        if record.embedding.len() != self.dim as usize {
            return Err(RagError::Validation(format!(
                "backup record '{}' has {} dimensions, expected {}",
                record.key,
                record.embedding.len(),
                self.dim
            )));
        }
        let metadata = record
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(backup_err)?;
        let ttl_ms = i64::try_from(record.ttl.as_millis()).unwrap_or(i64::MAX);
        let vectors = vec![Some(record.embedding.iter().map(|&x| Some(x)).collect::<Vec<_>>())];
        RecordBatch::try_new(
            self.schema(),
            vec![
                Arc::new(StringArray::from(vec![record.key.clone()])),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), self.dim)),
                Arc::new(TimestampMillisecondArray::from(vec![record.timestamp.timestamp_millis()])),
                Arc::new(Int64Array::from(vec![ttl_ms])),
                Arc::new(StringArray::from(vec![metadata])),
            ],
        )
        .map_err(backup_err)
    }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| RagError::Backup(format!("cache table column '{}' missing or mistyped", name)))
}

fn record_at(batch: &RecordBatch, row: usize) -> Result<BackupRecord> {
    let keys = column::<StringArray>(batch, "key")?;
    let vectors = column::<FixedSizeListArray>(batch, "vector")?;
    let created = column::<TimestampMillisecondArray>(batch, "created_at")?;
    let ttls = column::<Int64Array>(batch, "ttl_ms")?;
    let metadata = column::<StringArray>(batch, "metadata")?;

    let embedding = vectors.value(row).as_primitive::<Float32Type>().values().to_vec();
    let timestamp = DateTime::from_timestamp_millis(created.value(row))
        .ok_or_else(|| RagError::Backup("invalid created_at timestamp".into()))?;
    let metadata = if metadata.is_null(row) {
        None
    } else {
        Some(serde_json::from_str::<Meta>(metadata.value(row)).map_err(backup_err)?)
    };
    Ok(BackupRecord {
        key: keys.value(row).to_string(),
        embedding,
        timestamp,
        ttl: Duration::from_millis(ttls.value(row).max(0) as u64),
        metadata,
    })
}

#[async_trait]
impl CacheBackup for LanceBackup {
    async fn upsert(&self, record: BackupRecord) -> Result<()> {
        let batch = self.to_batch(&record)?;
        let table = self.open_table().await?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), self.schema()));
        let mut mi = table.merge_insert(&["key"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await.map_err(backup_err)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<BackupRecord>> {
        let table = self.open_table().await?;
        let mut stream = table
            .query()
            .only_if(format!("key = {}", quote(key)))
            .limit(1)
            .execute()
            .await
            .map_err(backup_err)?;
        while let Some(batch) = stream.try_next().await.map_err(backup_err)? {
            if batch.num_rows() > 0 {
                return record_at(&batch, 0).map(Some);
            }
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let table = self.open_table().await?;
        table.delete(&format!("key = {}", quote(key))).await.map_err(backup_err)?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let table = self.open_table().await?;
        table.delete("true").await.map_err(backup_err)?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let table = self.open_table().await?;
        let mut stream = table
            .query()
            .select(Select::columns(&["key"]))
            .execute()
            .await
            .map_err(backup_err)?;
        let mut keys = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(backup_err)? {
            let col = column::<StringArray>(&batch, "key")?;
            keys.extend((0..batch.num_rows()).map(|i| col.value(i).to_string()));
        }
        Ok(keys)
    }
}
