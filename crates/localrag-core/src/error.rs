use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Embedding provider error: {0}")]
    Embedding(String),

    #[error("Failed to index documents for source '{source_name}': {cause}")]
    Indexing {
        source_name: String,
        #[source]
        cause: Box<RagError>,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Cache backup error: {0}")]
    Backup(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl RagError {
    /// Wrap a per-window failure into the batch-level indexing error.
    pub fn indexing(source_name: impl Into<String>, cause: RagError) -> Self {
        RagError::Indexing { source_name: source_name.into(), cause: Box::new(cause) }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
