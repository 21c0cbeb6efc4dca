//! Engine error taxonomy.
//!
//! Every variant is recoverable: a single-document failure never poisons the
//! store, and the router surfaces command-level failures as response text.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The source path could not be opened or read. Aborts only the one
    /// document; batch ingestion continues.
    #[error("cannot read source {path}: {source}")]
    UnreadableSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Binary or otherwise unindexable content. The document is still
    /// recorded with an empty chunk list so `list` and `status` stay accurate.
    #[error("unsupported content: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// The persisted artifact failed its checksum or could not be parsed.
    /// The store starts empty instead of serving partial data.
    #[error("index artifact is corrupted: {reason}")]
    IndexCorrupted { reason: String },

    /// Router-level: the verb is not part of the command surface. Nothing
    /// was mutated.
    #[error("unknown command: {verb}")]
    UnknownCommand { verb: String },

    /// Router-level: the verb is known but its argument tail is malformed.
    #[error("invalid arguments for {verb}: {message}")]
    InvalidArgument { verb: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
