//! Deterministic bag-of-words embedder.
//!
//! Each normalized token is hashed with xxHash64 into one of `dim` buckets; the
//! result is L2-normalized. No model files, no network: used for development,
//! offline runs and tests. Texts sharing words get positive cosine similarity.

use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use twox_hash::XxHash64;

use localrag_core::error::{RagError, Result};
use localrag_core::traits::EmbeddingProvider;

pub struct HashEmbedder {
    dim: usize,
    name: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, name: format!("hash:xxh64:d{}", dim) }
    }

    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>> {
        if self.dim == 0 {
            return Err(RagError::Validation("hash embedder dimension must be greater than zero".into()));
        }
        let mut v = vec![0f32; self.dim];
        for (i, token) in tokens(text).enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        Ok(v)
    }
}

/// Lowercased words with surrounding punctuation stripped ("QRIBAR?" -> "qribar").
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> { self.embed_sync(text) }

    fn dimensions(&self) -> usize { self.dim }

    fn model_name(&self) -> &str { &self.name }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

    #[test]
    fn punctuation_and_case_do_not_change_tokens() {
        let e = HashEmbedder::new(64);
        let a = e.embed_sync("QRIBAR?").unwrap();
        let b = e.embed_sync("qribar").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn shared_words_give_positive_similarity() {
        let e = HashEmbedder::new(768);
        let doc = e.embed_sync("QRIBAR is a digital menu with QR ordering").unwrap();
        let query = e.embed_sync("What is QRIBAR?").unwrap();
        assert!(dot(&doc, &query) > 0.0);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashEmbedder::new(8);
        let v = e.embed_sync("  ?! ").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(HashEmbedder::new(0).embed_sync("x").is_err());
    }
}
