//! Core data models used throughout foldex.
//!
//! These types represent the fingerprints and documents that flow through the
//! ingestion and search pipeline.

use serde::{Deserialize, Serialize};

/// Structural digest of a directory tree.
///
/// Computed over relative paths, file sizes, and lowercased extensions —
/// never over file byte content. Always a lowercase hex SHA-256 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps an already hex-encoded digest string.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Fingerprint(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines and summaries.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One indexed file, owned by the destination scope for its lifetime.
///
/// Created by the ingestion pipeline; deleted only by bulk delete-by-owner
/// or scope deletion.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub id: String,
    /// Logical identifier of the uploaded folder's origin (top-level folder name).
    pub owner: String,
    /// Path between the owner folder and the file name, `/`-separated.
    /// Empty for files directly under the owner folder.
    pub subdirectory: String,
    pub full_path: String,
    pub file_name: String,
    pub extracted_text: String,
    /// Raw file content for text-like formats; `None` for binary formats.
    pub raw_content: Option<String>,
    pub fingerprint: String,
    /// Unix timestamp of the index write.
    pub indexed_at: i64,
}
