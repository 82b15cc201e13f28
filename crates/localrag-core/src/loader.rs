//! Loads a directory of `.txt` files into [`Document`]s.
//!
//! The source of a document is its parent directory relative to the root
//! (`misc` for files at the root), so a tree like `reviews/a.txt` indexes `a`
//! under the `reviews` source.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};
use crate::types::Document;

const ROOT_SOURCE: &str = "misc";

pub fn load_txt_documents(data_dir: &Path) -> Result<Vec<Document>> {
    let files = list_txt_files(data_dir);
    if files.is_empty() {
        tracing::warn!(dir = %data_dir.display(), "no .txt files found");
        return Ok(vec![]);
    }
    let mut documents = Vec::with_capacity(files.len());
    for file_path in &files {
        let content = read_file_content(file_path)?;
        documents.push(Document {
            id: doc_id(file_path),
            content,
            source: source_from_path(file_path, data_dir),
        });
    }
    tracing::info!(files = documents.len(), dir = %data_dir.display(), "loaded documents");
    Ok(documents)
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => {
            let bytes = fs::read(file_path)
                .map_err(|e| RagError::Validation(format!("cannot read {}: {}", file_path.display(), e)))?;
            Ok(String::from_utf8_lossy(&bytes).to_string())
        }
    }
}

fn doc_id(file_path: &Path) -> String {
    file_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.to_string_lossy().to_string())
}

fn source_from_path(file_path: &Path, data_dir: &Path) -> String {
    let relative_path = file_path.strip_prefix(data_dir).unwrap_or(file_path);
    match relative_path.parent().and_then(|p| p.to_str()) {
        Some(parent) if !parent.is_empty() => parent.replace('\\', "/"),
        _ => ROOT_SOURCE.to_string(),
    }
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
        .collect();
    txt_files.sort();
    txt_files
}
