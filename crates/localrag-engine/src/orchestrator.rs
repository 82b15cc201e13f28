//! RAG orchestrator.
//!
//! Holds the in-memory chunk index, the optional embedding cache and the
//! fallback handler. `search` embeds the query (through the cache when
//! enabled), ranks every indexed chunk by cosine similarity and hands over to
//! the fallback handler when nothing clears the threshold.
//!
//! The chunk list is a copy-on-write snapshot: searches clone the `Arc` and
//! release the lock before ranking, and indexing swaps in the extended list
//! only after every embedding of the call is ready.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::Instant;

use localrag_cache::EmbeddingCache;
use localrag_core::chunker::Chunker;
use localrag_core::config::{RagConfig, SearchConfig};
use localrag_core::error::{RagError, Result};
use localrag_core::traits::{CacheBackup, EmbeddingProvider, EmbeddingStore};
use localrag_core::types::{
    CacheStats, Document, DocumentChunk, FallbackContext, FallbackStats, Meta, RagSearchResult, SearchOptions,
    GENERIC_CATEGORY,
};
use localrag_fallback::FallbackHandler;

use crate::indexer::Indexer;
use crate::ranking::rank_chunks;

pub fn query_cache_key(query: &str) -> String {
    format!("query:{}", blake3::hash(query.as_bytes()).to_hex())
}

pub fn chunk_cache_key(source: &str, chunk_index: usize) -> String {
    format!("chunk:{}:{}", source, chunk_index)
}

/// Await `fut`, failing with `RagError::Timeout(limit)` once `at` passes.
async fn bounded<T>(until: Option<(Instant, Duration)>, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match until {
        Some((at, limit)) => tokio::time::timeout_at(at, fut).await.map_err(|_| RagError::Timeout(limit))?,
        None => fut.await,
    }
}

pub struct RagOrchestrator {
    indexer: Indexer,
    cache: Option<Arc<dyn EmbeddingStore>>,
    fallback: FallbackHandler,
    chunks: RwLock<Arc<Vec<DocumentChunk>>>,
    defaults: SearchConfig,
}

impl RagOrchestrator {
    /// Build from configuration. The cache is created when `cache.enabled`;
    /// `backup` is attached to it as its durable copy.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        config: &RagConfig,
        backup: Option<Arc<dyn CacheBackup>>,
    ) -> Result<Self> {
        let cache = if config.cache.enabled {
            let mut cache = EmbeddingCache::new(config.cache.ttl(), config.embedding.dimension)?;
            if let Some(backup) = backup {
                cache = cache.with_backup(backup);
            }
            Some(Arc::new(cache) as Arc<dyn EmbeddingStore>)
        } else {
            None
        };
        Self::build(provider, cache, config)
    }

    /// Build around an existing cache implementation.
    pub fn with_cache(
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<dyn EmbeddingStore>,
        config: &RagConfig,
    ) -> Result<Self> {
        Self::build(provider, Some(cache), config)
    }

    fn build(
        provider: Arc<dyn EmbeddingProvider>,
        cache: Option<Arc<dyn EmbeddingStore>>,
        config: &RagConfig,
    ) -> Result<Self> {
        config.validate().map_err(|e| RagError::InvalidConfig(e.to_string()))?;
        let dimension = config.embedding.dimension;
        if provider.dimensions() != dimension {
            return Err(RagError::InvalidConfig(format!(
                "provider {} produces {} dimensions but embedding.dimension is {}",
                provider.model_name(),
                provider.dimensions(),
                dimension
            )));
        }
        tracing::info!(
            model = provider.model_name(),
            dimension,
            cache = cache.is_some(),
            top_k = config.search.top_k,
            threshold = config.search.similarity_threshold,
            "rag orchestrator ready"
        );
        Ok(Self {
            indexer: Indexer::new(provider, Chunker::new(config.chunking)?, dimension),
            cache,
            fallback: FallbackHandler::new(),
            chunks: RwLock::new(Arc::new(Vec::new())),
            defaults: config.search.clone(),
        })
    }

    fn snapshot(&self) -> Arc<Vec<DocumentChunk>> {
        let guard = self.chunks.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*guard)
    }

    /// Index `documents`, grouped by source in order of first appearance.
    ///
    /// Nothing is added to the index unless every source succeeds. When a
    /// cache is configured each chunk's vector is stored under
    /// `chunk:{source}:{n}`, where `n` is the chunk's position among all
    /// chunks indexed so far for that source.
    pub async fn index_documents(&self, documents: &[Document]) -> Result<Vec<DocumentChunk>> {
        self.index_documents_within(documents, None).await
    }

    /// Like [`index_documents`](Self::index_documents), bounded by `deadline`.
    ///
    /// Running out of time while embedding returns `RagError::Timeout` and
    /// leaves the index untouched. Running out while seeding the cache keeps
    /// the new chunks and skips the remaining cache writes.
    pub async fn index_documents_within(
        &self,
        documents: &[Document],
        deadline: Option<Duration>,
    ) -> Result<Vec<DocumentChunk>> {
        let until = deadline.map(|limit| (Instant::now() + limit, limit));
        let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for doc in documents {
            let slot = *positions.entry(doc.source.as_str()).or_insert_with(|| {
                groups.push((doc.source.as_str(), Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(doc.content.as_str());
        }

        let embed_all = async {
            let mut indexed = Vec::new();
            for (source, contents) in &groups {
                indexed.extend(self.indexer.index_documents(source, contents.as_slice()).await?);
            }
            Ok::<_, RagError>(indexed)
        };
        let indexed: Vec<DocumentChunk> = bounded(until, embed_all).await?;

        let keys: Vec<String> = {
            let mut guard = self.chunks.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            let list = Arc::make_mut(&mut *guard);
            let mut next: HashMap<&str, usize> = HashMap::new();
            let keys = indexed
                .iter()
                .map(|chunk| {
                    let source = chunk.metadata.source.as_str();
                    let n = next
                        .entry(source)
                        .or_insert_with(|| list.iter().filter(|c| c.metadata.source == source).count());
                    let key = chunk_cache_key(source, *n);
                    *n += 1;
                    key
                })
                .collect::<Vec<_>>();
            list.extend(indexed.iter().cloned());
            keys
        };

        if let Some(cache) = &self.cache {
            let seed = async {
                for (chunk, key) in indexed.iter().zip(&keys) {
                    let mut meta = Meta::new();
                    meta.insert("source".to_string(), chunk.metadata.source.clone());
                    meta.insert("chunk_index".to_string(), chunk.metadata.chunk_index.to_string());
                    if let Err(e) = cache.store(key, chunk.embedding.clone(), Some(meta)).await {
                        tracing::warn!(key = %key, error = %e, "failed to seed chunk embedding");
                    }
                }
                Ok::<_, RagError>(())
            };
            if let Err(e) = bounded(until, seed).await {
                tracing::warn!(error = %e, "stopped seeding chunk embeddings");
            }
        }

        tracing::info!(documents = documents.len(), sources = groups.len(), chunks = indexed.len(), "indexed documents");
        Ok(indexed)
    }

    async fn embed_query(&self, query: &str, options: &SearchOptions) -> Result<(Vec<f32>, bool)> {
        let cache = match (&self.cache, options.use_cache.unwrap_or(true)) {
            (Some(cache), true) => cache,
            _ => return Ok((self.indexer.generate_embedding(query, None).await?, false)),
        };
        let key = query_cache_key(query);
        if let Some(embedding) = cache.lookup(&key).await {
            if embedding.len() == self.indexer.dimension() {
                return Ok((embedding, true));
            }
            tracing::warn!(key = %key, "ignoring cached query vector of wrong dimension");
        }
        let embedding = self.indexer.generate_embedding(query, None).await?;
        if let Err(e) = cache.store(&key, embedding.clone(), None).await {
            tracing::warn!(key = %key, error = %e, "failed to cache query embedding");
        }
        Ok((embedding, false))
    }

    fn fallback_result(&self, query: &str, source: Option<&str>) -> RagSearchResult {
        let context = FallbackContext::new(query, source.unwrap_or(GENERIC_CATEGORY), 0.0);
        RagSearchResult::fallback(self.fallback.get_fallback(&context))
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<RagSearchResult> {
        let query = query.trim();
        let source = options.source.as_deref();
        if query.is_empty() {
            return Ok(self.fallback_result(query, source));
        }

        let top_k = options.top_k.unwrap_or(self.defaults.top_k);
        let threshold = options.similarity_threshold.unwrap_or(self.defaults.similarity_threshold);
        // The deadline covers the cache lookup (and any backup read) as well as the provider.
        let until = options.deadline.map(|limit| (Instant::now() + limit, limit));
        let (embedding, cache_hit) = bounded(until, self.embed_query(query, options)).await?;

        let snapshot = self.snapshot();
        let ranked = rank_chunks(&embedding, &snapshot, source, threshold, top_k);
        tracing::debug!(candidates = snapshot.len(), found = ranked.len(), cache_hit, "ranked chunks");
        if ranked.is_empty() {
            return Ok(self.fallback_result(query, source));
        }
        let (chunks, scores): (Vec<DocumentChunk>, Vec<f32>) =
            ranked.into_iter().map(|(chunk, score)| (chunk.clone(), score)).unzip();
        Ok(RagSearchResult::ranked(chunks, scores, cache_hit))
    }

    /// Ranked chunks as a context block for a generator prompt, or the
    /// fallback message when nothing matched.
    pub async fn get_context(&self, query: &str, options: &SearchOptions) -> Result<String> {
        let result = self.search(query, options).await?;
        if result.used_fallback {
            return Ok(result.fallback_response.map(|r| r.message).unwrap_or_default());
        }
        let blocks: Vec<String> = result
            .chunks
            .iter()
            .zip(&result.relevance_scores)
            .enumerate()
            .map(|(i, (chunk, score))| {
                format!(
                    "--- Context {} (relevance: {:.1}%, source: {}) ---\n{}",
                    i + 1,
                    score * 100.0,
                    chunk.metadata.source,
                    chunk.text
                )
            })
            .collect();
        Ok(blocks.join("\n\n"))
    }

    /// `*` clears the whole cache; anything else goes to the cache's pattern
    /// invalidation, which may be unsupported.
    ///
    /// Without a cache, `*` is a no-op returning `false` and any other
    /// pattern is `RagError::Unsupported`.
    pub async fn invalidate_cache(&self, pattern: &str) -> Result<bool> {
        let Some(cache) = &self.cache else {
            if pattern == "*" {
                tracing::debug!("no cache configured, nothing to clear");
                return Ok(false);
            }
            return Err(RagError::Unsupported(format!(
                "cannot invalidate '{}': caching is disabled",
                pattern
            )));
        };
        if pattern == "*" {
            cache.clear().await?;
            return Ok(true);
        }
        cache.invalidate_pattern(pattern).await
    }

    /// Clear the cache and its counters, fallback statistics and chunk index.
    pub async fn reset(&self) -> Result<()> {
        if let Some(cache) = &self.cache {
            cache.clear().await?;
            cache.reset_stats();
        }
        self.fallback.reset_stats();
        *self.chunks.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(Vec::new());
        tracing::info!("orchestrator reset");
        Ok(())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.as_ref().map(|c| c.stats()).unwrap_or_default()
    }

    pub fn fallback_stats(&self) -> FallbackStats { self.fallback.stats() }

    pub fn chunk_count(&self) -> usize { self.snapshot().len() }

    pub fn sources(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        let sources: BTreeSet<&str> = snapshot.iter().map(|c| c.metadata.source.as_str()).collect();
        sources.into_iter().map(str::to_string).collect()
    }
}
