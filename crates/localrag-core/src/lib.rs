//! localrag-core
//!
//! Domain types, error enum, provider/backup/store traits, configuration and
//! the word-window chunker shared by every localrag crate.

pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod traits;
pub mod types;

pub use error::{RagError, Result};
