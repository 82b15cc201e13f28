//! Local transformer embedder (XLM-RoBERTa family, e.g. BGE-M3) on candle.
//!
//! Expects `tokenizer.json`, `config.json` and `pytorch_model.bin` in the model
//! directory. Forward passes run on the blocking pool so the async caller never
//! stalls a runtime worker.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use localrag_core::error::{RagError, Result};
use localrag_core::traits::EmbeddingProvider;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::{candle_err, tokenize_on_device};

const MAX_LEN: usize = 256;
const PAD_ID: u32 = 1;

struct LocalModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
}

impl LocalModel {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, MAX_LEN, PAD_ID, &self.device)?;
        let token_type_ids = Tensor::zeros((1, MAX_LEN), DType::I64, &self.device).map_err(candle_err)?;
        let hidden_states = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)
            .map_err(candle_err)?;
        let pooled = masked_mean_l2(&hidden_states, &attention_mask).map_err(candle_err)?;
        let emb = pooled
            .to_device(&Device::Cpu)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(candle_err)?;
        if emb.len() != self.dim {
            return Err(RagError::Embedding(format!("model produced {} dims, expected {}", emb.len(), self.dim)));
        }
        let elapsed = start.elapsed().as_millis();
        if elapsed > 100 { tracing::warn!(elapsed_ms = elapsed as u64, "slow embedding"); }
        Ok(emb)
    }
}

pub struct LocalModelProvider {
    inner: Arc<LocalModel>,
    name: String,
}

impl LocalModelProvider {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading local embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| RagError::InvalidConfig(format!("failed to load tokenizer from {}: {}", tokenizer_path.display(), e)))?;

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| RagError::InvalidConfig(format!("failed to read {}: {}", config_path.display(), e)))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw)
            .map_err(|e| RagError::InvalidConfig(format!("invalid model config: {}", e)))?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw)
            .ok()
            .and_then(|v| v.get("hidden_size").and_then(|h| h.as_u64()))
            .ok_or_else(|| RagError::InvalidConfig("model config has no hidden_size".into()))? as usize;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path).map_err(candle_err)?;
        let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb).map_err(candle_err)?;
        tracing::info!(dim, "local embedding model loaded");

        let name = format!("local:{}:d{}", model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(), dim);
        Ok(Self { inner: Arc::new(LocalModel { model, tokenizer, device, dim }), name })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalModelProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || inner.embed_text(&text))
            .await
            .map_err(|e| RagError::Embedding(format!("embedding task failed: {}", e)))?
    }

    fn dimensions(&self) -> usize { self.inner.dim }

    fn model_name(&self) -> &str { &self.name }
}

/// Configured directory first, then `APP_MODEL_DIR`, then `./models/bge-m3`.
pub fn resolve_model_dir(configured: &str) -> Result<PathBuf> {
    if !configured.is_empty() {
        let p = localrag_core::config::expand_path(configured);
        if p.exists() { return Ok(p); }
    }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() { return Ok(p); }
    }
    let default = Path::new("models/bge-m3");
    if default.exists() { return Ok(default.to_path_buf()); }
    Err(RagError::InvalidConfig("could not locate a local embedding model directory".into()))
}
