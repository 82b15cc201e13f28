use std::cmp::Ordering;

use localrag_core::types::DocumentChunk;

/// Cosine similarity accumulated in f64. Returns 0.0 for mismatched lengths,
/// zero-norm inputs and non-finite results, so NaN never reaches ranking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if sim.is_finite() { sim as f32 } else { 0.0 }
}

/// Linear scan: filter by `source`, keep scores `>= threshold`, sort
/// descending (stable, so ties keep index order) and take `top_k`.
pub fn rank_chunks<'a>(
    query: &[f32],
    chunks: &'a [DocumentChunk],
    source: Option<&str>,
    threshold: f32,
    top_k: usize,
) -> Vec<(&'a DocumentChunk, f32)> {
    let mut scored: Vec<(&DocumentChunk, f32)> = chunks
        .iter()
        .filter(|c| source.map_or(true, |s| c.metadata.source == s))
        .map(|c| (c, cosine_similarity(query, &c.embedding)))
        .filter(|(_, score)| *score >= threshold)
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use localrag_core::types::ChunkMetadata;

    fn chunk(text: &str, source: &str, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk {
            text: text.into(),
            embedding,
            metadata: ChunkMetadata { source: source.into(), category: None, chunk_index: 0, total_chunks: 1 },
        }
    }

    #[test]
    fn self_similarity_is_one() {
        let v = vec![0.3, -1.2, 4.5, 0.01];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_inputs_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn ranks_descending_with_stable_ties() {
        let chunks = vec![
            chunk("first", "a", vec![1.0, 1.0]),
            chunk("best", "a", vec![1.0, 0.0]),
            chunk("second", "a", vec![2.0, 2.0]),
            chunk("opposite", "a", vec![-1.0, 0.0]),
        ];
        let ranked = rank_chunks(&[1.0, 0.0], &chunks, None, 0.0, 10);
        let texts: Vec<_> = ranked.iter().map(|(c, _)| c.text.as_str()).collect();
        assert_eq!(texts, vec!["best", "first", "second"]);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn filters_by_source_threshold_and_top_k() {
        let chunks = vec![
            chunk("a1", "a", vec![1.0, 0.0]),
            chunk("b1", "b", vec![1.0, 0.0]),
            chunk("a2", "a", vec![0.0, 1.0]),
        ];
        let ranked = rank_chunks(&[1.0, 0.0], &chunks, Some("a"), 0.5, 5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0.text, "a1");

        assert_eq!(rank_chunks(&[1.0, 0.0], &chunks, None, -1.0, 2).len(), 2);
        assert!(rank_chunks(&[1.0, 0.0], &chunks, None, 0.0, 0).is_empty());
    }
}
