//! Metadata manifest loading.
//!
//! A manifest is a JSON array of [`HandlerMeta`] entries, one per declared
//! port or wrap-in class. It is what offline tooling (`portctl`) and
//! applications without compile-time registration feed to the assembler.

use std::fs;
use std::path::Path;

use crate::metadata::types::HandlerMeta;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Load handler metadata from a JSON manifest file.
pub fn load_manifest(path: &Path) -> Result<Vec<HandlerMeta>, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest(&content)
}

pub fn parse_manifest(content: &str) -> Result<Vec<HandlerMeta>, ManifestError> {
    let metas: Vec<HandlerMeta> = serde_json::from_str(content)?;
    tracing::debug!(classes = metas.len(), "Manifest parsed");
    Ok(metas)
}
