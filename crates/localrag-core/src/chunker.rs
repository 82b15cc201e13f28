//! Word-window chunking and source → category inference.
//!
//! Words approximate tokens: a document is split on whitespace and cut into
//! windows of `chunk_size` words, consecutive windows sharing `overlap` words.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::types::GENERIC_CATEGORY;

pub const CHUNK_SIZE: usize = 500;
pub const CHUNK_OVERLAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: CHUNK_SIZE, overlap: CHUNK_OVERLAP }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidConfig("chunk_size must be greater than zero".into()));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    pub fn step(&self) -> usize { self.chunk_size - self.overlap }
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig { self.config }

    /// Split `content` into overlapping word windows joined by single spaces.
    ///
    /// The last window always ends at the last word; no window is emitted twice.
    pub fn split(&self, content: &str) -> Vec<String> {
        let words: Vec<&str> = content.split_whitespace().collect();
        let mut windows = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + self.config.chunk_size).min(words.len());
            windows.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start += self.config.step();
        }
        windows
    }
}

// Order matters: the first rule whose keyword occurs in the source wins.
const CATEGORY_RULES: &[(&[&str], &str)] = &[
    (&["review"], "reviews_reputation"),
    (&["qribar", "menu"], "digital_menu"),
    (&["reserv", "booking"], "reservations"),
];

/// Map a source name to its category by case-insensitive substring match.
///
/// Total: unknown sources map to [`GENERIC_CATEGORY`]. Every category contains
/// one of its own keywords, so feeding a category back in returns it unchanged.
pub fn infer_category(source: &str) -> &'static str {
    let lower = source.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, category)| *category)
        .unwrap_or(GENERIC_CATEGORY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn exact_chunk_size_yields_one_window() {
        let chunker = Chunker::default();
        let windows = chunker.split(&words(CHUNK_SIZE));
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn one_word_over_yields_two_windows_with_overlap() {
        let chunker = Chunker::default();
        let windows = chunker.split(&words(CHUNK_SIZE + 1));
        assert_eq!(windows.len(), 2);
        let second: Vec<&str> = windows[1].split(' ').collect();
        assert_eq!(second.first().copied(), Some("w450"));
        assert_eq!(second.last().copied(), Some("w500"));
        assert_eq!(second.len(), CHUNK_OVERLAP + 1);
    }

    #[test]
    fn whitespace_is_collapsed() {
        let chunker = Chunker::default();
        assert_eq!(chunker.split("  alpha\n\tbravo   charlie "), vec!["alpha bravo charlie".to_string()]);
        assert!(chunker.split("   \n ").is_empty());
    }

    #[test]
    fn small_windows_step_by_size_minus_overlap() {
        let chunker = Chunker::new(ChunkingConfig { chunk_size: 4, overlap: 1 }).expect("config");
        let windows = chunker.split("a b c d e f g");
        assert_eq!(windows, vec!["a b c d", "d e f g"]);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        assert!(Chunker::new(ChunkingConfig { chunk_size: 10, overlap: 10 }).is_err());
        assert!(Chunker::new(ChunkingConfig { chunk_size: 0, overlap: 0 }).is_err());
    }

    #[test]
    fn category_inference_is_total_and_idempotent() {
        assert_eq!(infer_category("Google-Reviews"), "reviews_reputation");
        assert_eq!(infer_category("qribar"), "digital_menu");
        assert_eq!(infer_category("Online BOOKING"), "reservations");
        assert_eq!(infer_category("blog"), GENERIC_CATEGORY);
        for c in ["reviews_reputation", "digital_menu", "reservations", GENERIC_CATEGORY] {
            assert_eq!(infer_category(c), c);
        }
    }
}
