//! localrag-embed
//!
//! Embedding providers: the deterministic [`HashEmbedder`] and, with the
//! `local-model` feature, a candle-backed transformer model.

use std::sync::Arc;

use localrag_core::config::EmbeddingConfig;
use localrag_core::error::{RagError, Result};
use localrag_core::traits::EmbeddingProvider;

pub mod hash;
#[cfg(feature = "local-model")]
mod device;
#[cfg(feature = "local-model")]
pub mod model;
#[cfg(feature = "local-model")]
mod pool;
#[cfg(feature = "local-model")]
mod tokenize;

pub use hash::HashEmbedder;
#[cfg(feature = "local-model")]
pub use model::LocalModelProvider;
#[cfg(feature = "local-model")]
pub use pool::masked_mean_l2;

/// Build the provider named by `embedding.provider`.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` forces the hash embedder regardless of config.
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake || config.provider == "hash" {
        tracing::debug!(dim = config.dimension, "using hash embedder");
        return Ok(Arc::new(HashEmbedder::new(config.dimension)));
    }
    match config.provider.as_str() {
        "local" => local_provider(config),
        other => Err(RagError::InvalidConfig(format!("unknown embedding provider '{}'", other))),
    }
}

#[cfg(feature = "local-model")]
fn local_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let dir = model::resolve_model_dir(&config.model_dir)?;
    let provider = LocalModelProvider::load(&dir)?;
    if provider.dimensions() != config.dimension {
        return Err(RagError::InvalidConfig(format!(
            "model at {} produces {} dims but embedding.dimension is {}",
            dir.display(),
            provider.dimensions(),
            config.dimension
        )));
    }
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "local-model"))]
fn local_provider(_config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(RagError::InvalidConfig("provider 'local' requires the `local-model` feature".into()))
}
