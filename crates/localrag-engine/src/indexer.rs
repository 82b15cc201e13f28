//! Chunk + embed. One call covers one source and is all-or-nothing: chunks are
//! only returned once every window has an embedding.

use std::sync::Arc;
use std::time::Duration;

use localrag_core::chunker::{infer_category, Chunker};
use localrag_core::error::{RagError, Result};
use localrag_core::traits::EmbeddingProvider;
use localrag_core::types::{ChunkMetadata, DocumentChunk};

pub struct Indexer {
    provider: Arc<dyn EmbeddingProvider>,
    chunker: Chunker,
    dimension: usize,
}

impl Indexer {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, chunker: Chunker, dimension: usize) -> Self {
        Self { provider, chunker, dimension }
    }

    pub fn dimension(&self) -> usize { self.dimension }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> { &self.provider }

    /// Embed `text`, bounded by `deadline` when given. A vector of the wrong
    /// length is a provider error.
    pub async fn generate_embedding(&self, text: &str, deadline: Option<Duration>) -> Result<Vec<f32>> {
        let embedding = match deadline {
            Some(limit) => tokio::time::timeout(limit, self.provider.embed(text))
                .await
                .map_err(|_| RagError::Timeout(limit))??,
            None => self.provider.embed(text).await?,
        };
        if embedding.len() != self.dimension {
            return Err(RagError::Embedding(format!(
                "{} returned {} dimensions, expected {}",
                self.provider.model_name(),
                embedding.len(),
                self.dimension
            )));
        }
        Ok(embedding)
    }

    /// Split every document into windows and embed them. `chunk_index` runs
    /// across all documents of the call; `total_chunks` is the call total.
    pub async fn index_documents<S>(&self, source: &str, documents: &[S]) -> Result<Vec<DocumentChunk>>
    where
        S: AsRef<str> + Sync,
    {
        let category = infer_category(source);
        let mut chunks = Vec::new();
        for doc in documents {
            for text in self.chunker.split(doc.as_ref()) {
                let embedding = self
                    .generate_embedding(&text, None)
                    .await
                    .map_err(|e| RagError::indexing(source, e))?;
                chunks.push(DocumentChunk {
                    text,
                    embedding,
                    metadata: ChunkMetadata {
                        source: source.to_string(),
                        category: Some(category.to_string()),
                        chunk_index: chunks.len(),
                        total_chunks: 0,
                    },
                });
            }
        }
        let total = chunks.len();
        for chunk in &mut chunks {
            chunk.metadata.total_chunks = total;
        }
        tracing::debug!(source, documents = documents.len(), chunks = total, "indexed source");
        Ok(chunks)
    }
}
