//! Core data models for the indexing and retrieval pipeline.
//!
//! Documents are stored as metadata records holding index ranges into a flat
//! chunk arena owned by the [`store`](crate::store). The persisted forms of
//! these types live next to the artifact code in `store.rs`.

use serde::{Deserialize, Serialize};

/// Detected content category of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocFormat {
    Code,
    Prose,
    Tabular,
    Markup,
    Unknown,
}

impl DocFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DocFormat::Code => "code",
            DocFormat::Prose => "prose",
            DocFormat::Tabular => "tabular",
            DocFormat::Markup => "markup",
            DocFormat::Unknown => "unknown",
        }
    }
}

/// Document metadata held by the store.
///
/// `chunk_start`/`chunk_count` locate the document's chunks inside the
/// store's arena for the generation this record belongs to.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub source_path: String,
    pub content_hash: String,
    pub format: DocFormat,
    /// Unix milliseconds of the last successful (re-)embedding.
    pub indexed_at: i64,
    pub chunk_start: usize,
    pub chunk_count: usize,
}

/// One entry of the flat chunk arena: a text span and its embedding.
#[derive(Debug, Clone)]
pub struct ArenaChunk {
    /// Index of the owning document within the same snapshot. Back-reference
    /// only; the arena never owns documents.
    pub doc_slot: usize,
    /// Order of this chunk within its document.
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// One row of `list` output.
#[derive(Debug, Clone)]
pub struct DocumentSummary {
    pub id: String,
    pub source_path: String,
    pub format: DocFormat,
    pub chunk_count: usize,
    pub indexed_at: i64,
}

/// A ranked hit returned by the query engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub document_id: String,
    pub source_path: String,
    pub chunk_index: usize,
    pub score: f32,
    pub snippet: String,
}
