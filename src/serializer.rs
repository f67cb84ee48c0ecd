//! Serialization of generated documents to JSON or YAML.
//!
//! Works for both the route manifest ([`GenerationOutput`]) and the OpenAPI
//! document built from it.
//!
//! [`GenerationOutput`]: crate::generator::GenerationOutput

use crate::config::ManifestFormat;
use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Serializes `doc` as YAML.
pub fn serialize_yaml<T: Serialize>(doc: &T) -> Result<String> {
    debug!("Serializing document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize document to YAML")
}

/// Serializes `doc` as pretty-printed JSON.
pub fn serialize_json<T: Serialize>(doc: &T) -> Result<String> {
    debug!("Serializing document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize document to JSON")
}

pub fn serialize<T: Serialize>(doc: &T, format: ManifestFormat) -> Result<String> {
    match format {
        ManifestFormat::Json => serialize_json(doc),
        ManifestFormat::Yaml => serialize_yaml(doc),
    }
}

/// Writes `content` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if a directory or the file cannot be written.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
