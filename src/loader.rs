//! Schema document loading
//!
//! Reads JSON documents from files or directories of `.json` files. A file
//! holds either a bundle `{"tables": [...], "sequences": [...]}` or a single
//! table or sequence document.

use crate::definition::Document;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Bundle {
    #[serde(default)]
    tables: Vec<serde_json::Value>,
    #[serde(default)]
    sequences: Vec<serde_json::Value>,
}

/// Load every document found at `paths`, in order
pub fn load_documents(paths: &[PathBuf]) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for path in paths {
        for file in expand(path)? {
            documents.extend(load_file(&file)?);
        }
    }
    Ok(documents)
}

fn expand(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(Error::Import(format!("{} does not exist", path.display())));
    }
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let entries = std::fs::read_dir(path)
        .map_err(|e| Error::Import(format!("cannot read {}: {}", path.display(), e)))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::Import(format!("cannot read {}: {}", path.display(), e)))?;
        let file = entry.path();
        if file.extension().is_some_and(|ext| ext == "json") {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}

fn load_file(path: &Path) -> Result<Vec<Document>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Import(format!("cannot read {}: {}", path.display(), e)))?;
    let invalid = |e: serde_json::Error| Error::Import(format!("{} is not a valid schema document: {}", path.display(), e));

    let value: serde_json::Value = serde_json::from_str(&text).map_err(invalid)?;
    let is_bundle = value.get("name").is_none()
        && (value.get("tables").is_some() || value.get("sequences").is_some());

    let documents = if is_bundle {
        let bundle: Bundle = serde_json::from_value(value).map_err(invalid)?;
        bundle
            .sequences
            .into_iter()
            .map(|v| serde_json::from_value(v).map(Document::Sequence))
            .chain(bundle.tables.into_iter().map(|v| serde_json::from_value(v).map(Document::Table)))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(invalid)?
    } else {
        vec![Document::from_value(value).map_err(invalid)?]
    };

    debug!(path = %path.display(), documents = documents.len(), "Loaded schema documents");
    Ok(documents)
}
