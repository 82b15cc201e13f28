use localrag_core::config::EmbeddingConfig;
use localrag_embed::{provider_from_config, HashEmbedder};
use localrag_core::traits::EmbeddingProvider;

#[tokio::test]
async fn hash_embedder_shapes_and_determinism() {
    let embedder = HashEmbedder::new(768);
    let v1 = embedder.embed("hello world").await.expect("embed");
    let v2 = embedder.embed("hello world").await.expect("embed");

    assert_eq!(v1.len(), 768, "embedding dim is 768");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[tokio::test]
async fn factory_builds_hash_provider_with_configured_dimension() {
    let config = EmbeddingConfig { dimension: 32, provider: "hash".into(), model_dir: String::new() };
    let provider = provider_from_config(&config).expect("provider");
    assert_eq!(provider.dimensions(), 32);
    assert_eq!(provider.embed("anything").await.expect("embed").len(), 32);
    assert!(provider.model_name().starts_with("hash:"));
}

#[cfg(not(feature = "local-model"))]
#[test]
fn factory_rejects_local_without_feature() {
    if std::env::var("APP_USE_FAKE_EMBEDDINGS").is_ok() { return; }
    let config = EmbeddingConfig { dimension: 768, provider: "local".into(), model_dir: String::new() };
    assert!(provider_from_config(&config).is_err());
}

#[test]
fn factory_rejects_unknown_provider() {
    if std::env::var("APP_USE_FAKE_EMBEDDINGS").is_ok() { return; }
    let config = EmbeddingConfig { dimension: 768, provider: "mystery".into(), model_dir: String::new() };
    assert!(provider_from_config(&config).is_err());
}
