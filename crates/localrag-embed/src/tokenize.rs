use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

use localrag_core::error::{RagError, Result};

/// Encode `text`, truncate/pad to `max_len` and move ids + mask onto `device`.
pub fn tokenize_on_device(tokenizer: &Tokenizer, text: &str, max_len: usize, pad_id: u32, device: &Device) -> Result<(Tensor, Tensor)> {
    let enc = tokenizer
        .encode(text, true)
        .map_err(|e| RagError::Embedding(format!("tokenization failed: {}", e)))?;
    let mut ids = enc.get_ids().to_vec();
    let mut mask = enc.get_attention_mask().to_vec();
    if ids.len() > max_len { ids.truncate(max_len); mask.truncate(max_len); }
    if ids.len() < max_len {
        let pad = max_len - ids.len();
        ids.extend(std::iter::repeat(pad_id).take(pad));
        mask.extend(std::iter::repeat(0).take(pad));
    }
    let input_ids = Tensor::from_iter(ids, device).and_then(|t| t.reshape((1, max_len))).map_err(candle_err)?;
    let attention_mask = Tensor::from_iter(mask, device).and_then(|t| t.reshape((1, max_len))).map_err(candle_err)?;
    Ok((input_ids, attention_mask))
}

pub(crate) fn candle_err(e: candle_core::Error) -> RagError {
    RagError::Embedding(format!("candle: {}", e))
}
