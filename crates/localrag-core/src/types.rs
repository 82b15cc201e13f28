//! Domain types shared by the indexer, cache, fallback handler and orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub type Meta = HashMap<String, String>;

/// Embedding dimensionality used when nothing else is configured.
pub const DEFAULT_EMBEDDING_DIM: usize = 768;

/// Category used when a source or fallback context names none we recognise.
pub const GENERIC_CATEGORY: &str = "general";

/// Position and provenance of a chunk.
///
/// - `source`: logical source the document was indexed under
/// - `category`: category inferred from `source`
/// - `chunk_index`/`total_chunks`: position within the indexing call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub category: Option<String>,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// A word window of a source document together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A raw document handed to the orchestrator for indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub source: String,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>, source: impl Into<String>) -> Self {
        Self { id: id.into(), content: content.into(), source: source.into() }
    }
}

/// Per-call overrides for `search`. Unset fields fall back to the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub top_k: Option<usize>,
    pub similarity_threshold: Option<f32>,
    pub use_cache: Option<bool>,
    pub source: Option<String>,
    /// Upper bound on every embedding provider call made by this search.
    pub deadline: Option<Duration>,
}

impl SearchOptions {
    pub fn new() -> Self { Self::default() }

    pub fn top_k(mut self, k: usize) -> Self { self.top_k = Some(k); self }

    pub fn similarity_threshold(mut self, threshold: f32) -> Self { self.similarity_threshold = Some(threshold); self }

    pub fn use_cache(mut self, enabled: bool) -> Self { self.use_cache = Some(enabled); self }

    pub fn source(mut self, source: impl Into<String>) -> Self { self.source = Some(source.into()); self }

    pub fn deadline(mut self, deadline: Duration) -> Self { self.deadline = Some(deadline); self }
}

/// Outcome of a search: ranked chunks, or an empty set plus a fallback response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagSearchResult {
    pub chunks: Vec<DocumentChunk>,
    pub relevance_scores: Vec<f32>,
    pub total_found: usize,
    pub cache_hit: bool,
    pub used_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_response: Option<FallbackResponse>,
}

impl RagSearchResult {
    pub fn ranked(chunks: Vec<DocumentChunk>, relevance_scores: Vec<f32>, cache_hit: bool) -> Self {
        let total_found = chunks.len();
        Self { chunks, relevance_scores, total_found, cache_hit, used_fallback: false, fallback_response: None }
    }

    pub fn fallback(response: FallbackResponse) -> Self {
        Self {
            chunks: Vec::new(),
            relevance_scores: Vec::new(),
            total_found: 0,
            cache_hit: false,
            used_fallback: true,
            fallback_response: Some(response),
        }
    }
}

/// Input to the fallback handler. Built per call, never stored.
#[derive(Debug, Clone, Default)]
pub struct FallbackContext {
    pub query: String,
    pub category: String,
    pub rag_results: Vec<DocumentChunk>,
    pub confidence: f32,
    pub user_name: Option<String>,
    pub previous_interactions: Option<u32>,
}

impl FallbackContext {
    pub fn new(query: impl Into<String>, category: impl Into<String>, confidence: f32) -> Self {
        Self { query: query.into(), category: category.into(), confidence, ..Self::default() }
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self { self.user_name = Some(name.into()); self }

    pub fn with_previous_interactions(mut self, count: u32) -> Self { self.previous_interactions = Some(count); self }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Predefined,
    Contextual,
    Escalation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Formal,
    Familiar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    Urgent,
    Sensitive,
    LowConfidence,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::Urgent => "urgent",
            EscalationReason::Sensitive => "sensitive",
            EscalationReason::LowConfidence => "low_confidence",
        }
    }
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSuggestion {
    Contact,
    Documentation,
    Demo,
    Testimonials,
}

impl ActionSuggestion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionSuggestion::Contact => "contact",
            ActionSuggestion::Documentation => "documentation",
            ActionSuggestion::Demo => "demo",
            ActionSuggestion::Testimonials => "testimonials",
        }
    }
}

impl fmt::Display for ActionSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackResponse {
    pub message: String,
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub category: String,
    pub should_escalate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<EscalationReason>,
    pub action_suggestions: Vec<ActionSuggestion>,
    pub tone: Tone,
    pub confidence: f32,
}

/// Aggregate usage counters of a fallback handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FallbackStats {
    pub total_fallbacks: u64,
    pub by_category: HashMap<String, u64>,
    pub total_escalations: u64,
    pub average_confidence: f64,
    pub escalation_rate: f64,
}

/// Snapshot of the embedding cache, derived on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub memory_usage_bytes: usize,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Unit of exchange with a durable cache backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub key: String,
    pub embedding: Vec<f32>,
    pub timestamp: DateTime<Utc>,
    pub ttl: Duration,
    pub metadata: Option<Meta>,
}

impl BackupRecord {
    /// Expired once strictly more than `ttl` has elapsed since `timestamp`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now.signed_duration_since(self.timestamp) > ttl,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranked_result_counts_chunks() {
        let chunk = DocumentChunk {
            text: "a".into(),
            embedding: vec![1.0],
            metadata: ChunkMetadata { source: "s".into(), category: None, chunk_index: 0, total_chunks: 1 },
        };
        let res = RagSearchResult::ranked(vec![chunk], vec![0.9], true);
        assert_eq!(res.total_found, 1);
        assert!(!res.used_fallback);
        assert!(res.fallback_response.is_none());
    }

    #[test]
    fn backup_record_expiry_is_strict() {
        let now = Utc::now();
        let rec = BackupRecord {
            key: "k".into(),
            embedding: vec![0.0],
            timestamp: now - chrono::Duration::seconds(10),
            ttl: Duration::from_secs(10),
            metadata: None,
        };
        assert!(!rec.is_expired(now));
        assert!(rec.is_expired(now + chrono::Duration::milliseconds(1)));
    }

    #[test]
    fn response_type_serializes_snake_case() {
        let s = serde_json::to_string(&EscalationReason::LowConfidence).expect("serialize");
        assert_eq!(s, "\"low_confidence\"");
        assert_eq!(EscalationReason::LowConfidence.to_string(), "low_confidence");
    }
}
