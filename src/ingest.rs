//! Ingestion pipeline: scan, normalize, embed, upsert.
//!
//! `add` accepts a file or a directory. Directories are walked in sorted
//! order and filtered through include/exclude glob sets, with the usual
//! vendored-tree excludes applied on top of configuration. Each document is
//! prepared (read + normalize + embed) on a blocking worker so a large batch
//! parallelizes across cores; chunks embed independently, so results are
//! deterministic regardless of execution order. Upserts then land in scan
//! order, one document at a time — a failure in one file never disturbs the
//! documents already committed.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::embedding::embed;
use crate::error::{EngineError, Result};
use crate::models::DocFormat;
use crate::normalize;
use crate::store::{DocumentStore, UpsertOutcome};

/// Per-batch outcome tally reported back through the router.
#[derive(Debug, Default)]
pub struct AddReport {
    pub indexed: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub unindexable: usize,
    pub failed: usize,
    /// Path and reason for each failed document.
    pub failures: Vec<(PathBuf, String)>,
}

impl AddReport {
    pub fn touched(&self) -> usize {
        self.indexed + self.updated
    }
}

/// Result of `add_text`.
#[derive(Debug)]
pub struct AddedText {
    pub id: String,
    pub chunk_count: usize,
    pub outcome: UpsertOutcome,
}

struct Prepared {
    id: String,
    source_path: String,
    content_hash: String,
    format: DocFormat,
    chunks: Vec<(String, Vec<f32>)>,
}

enum PrepareOutcome {
    Ready(Prepared),
    /// Content hash matched the stored copy; embedding was skipped entirely.
    Unchanged,
    /// Binary or undecodable content; recorded with an empty chunk list.
    Unindexable(Prepared),
}

/// Ingest a file or directory tree into the store.
///
/// The store is saved once at the end when anything actually changed.
pub async fn run_add(config: &Config, store: &DocumentStore, path: &Path) -> Result<AddReport> {
    let files = collect_files(config, path)?;
    let mut report = AddReport::default();

    // Known hashes let workers skip re-embedding unchanged files.
    let known: std::collections::HashMap<String, String> = store
        .snapshot()
        .documents
        .iter()
        .map(|d| (d.id.clone(), d.content_hash.clone()))
        .collect();

    let max_chunk_chars = config.chunking.max_chunk_chars;
    let generation_before = store.generation();

    let mut handles = Vec::with_capacity(files.len());
    for file in files {
        let known_hash = {
            let id = document_id(&canonical_name(&file));
            known.get(&id).cloned()
        };
        handles.push((
            file.clone(),
            tokio::task::spawn_blocking(move || prepare_file(&file, known_hash, max_chunk_chars)),
        ));
    }

    for (file, handle) in handles {
        let outcome = match handle.await {
            Ok(result) => result,
            Err(join_err) => {
                warn!(path = %file.display(), error = %join_err, "ingest worker panicked");
                report.failed += 1;
                report.failures.push((file, join_err.to_string()));
                continue;
            }
        };

        match outcome {
            Ok(PrepareOutcome::Unchanged) => report.unchanged += 1,
            Ok(PrepareOutcome::Unindexable(prepared)) => {
                store.upsert(
                    &prepared.id,
                    &prepared.source_path,
                    &prepared.content_hash,
                    prepared.format,
                    Vec::new(),
                );
                let status = EngineError::UnsupportedFormat { path: file.clone() };
                debug!(status = %status, "recorded unindexable document with empty chunk list");
                report.unindexable += 1;
            }
            Ok(PrepareOutcome::Ready(prepared)) => {
                match store.upsert(
                    &prepared.id,
                    &prepared.source_path,
                    &prepared.content_hash,
                    prepared.format,
                    prepared.chunks,
                ) {
                    UpsertOutcome::Inserted => report.indexed += 1,
                    UpsertOutcome::Updated => report.updated += 1,
                    UpsertOutcome::Unchanged => report.unchanged += 1,
                }
            }
            Err(err) => {
                warn!(path = %file.display(), error = %err, "skipping unreadable source");
                report.failed += 1;
                report.failures.push((file, err.to_string()));
            }
        }
    }

    if store.generation() != generation_before {
        store.save()?;
    }

    Ok(report)
}

/// Index literal text under a logical source name.
///
/// The id derives from the name, so re-adding the same name with new
/// content replaces the document like a re-ingested file would.
pub async fn run_add_text(
    config: &Config,
    store: &DocumentStore,
    name: &str,
    content: &str,
) -> Result<AddedText> {
    let max_chunk_chars = config.chunking.max_chunk_chars;
    let owned_name = name.to_string();
    let owned_content = content.to_string();

    let prepared = tokio::task::spawn_blocking(move || -> Prepared {
        let source = format!("text:{}", owned_name);
        let normalized = normalize::normalize(
            Path::new(&owned_name),
            owned_content.as_bytes(),
            max_chunk_chars,
        );
        let chunks = normalized
            .chunks
            .into_iter()
            .map(|text| {
                let vector = embed(&text);
                (text, vector)
            })
            .collect();
        Prepared {
            id: document_id(&source),
            source_path: owned_name,
            content_hash: content_digest(owned_content.as_bytes()),
            format: normalized.format,
            chunks,
        }
    })
    .await
    .map_err(|e| EngineError::Io(std::io::Error::other(e.to_string())))?;

    let chunk_count = prepared.chunks.len();
    let outcome = store.upsert(
        &prepared.id,
        &prepared.source_path,
        &prepared.content_hash,
        prepared.format,
        prepared.chunks,
    );

    if outcome != UpsertOutcome::Unchanged {
        store.save()?;
    }

    Ok(AddedText {
        id: prepared.id,
        chunk_count,
        outcome,
    })
}

/// Stable document id: leading hex of the SHA-256 of the canonical source.
pub fn document_id(canonical_source: &str) -> String {
    let digest = Sha256::digest(canonical_source.as_bytes());
    format!("{:x}", digest)[..16].to_string()
}

fn content_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Canonical name for a filesystem source: the absolute path when
/// resolvable, the given path otherwise.
fn canonical_name(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}

fn prepare_file(
    path: &Path,
    known_hash: Option<String>,
    max_chunk_chars: usize,
) -> Result<PrepareOutcome> {
    let bytes = std::fs::read(path).map_err(|source| EngineError::UnreadableSource {
        path: path.to_path_buf(),
        source,
    })?;

    let source = canonical_name(path);
    let content_hash = content_digest(&bytes);
    if known_hash.as_deref() == Some(content_hash.as_str()) {
        return Ok(PrepareOutcome::Unchanged);
    }

    let normalized = normalize::normalize(path, &bytes, max_chunk_chars);
    let prepared = Prepared {
        id: document_id(&source),
        source_path: source,
        content_hash,
        format: normalized.format,
        chunks: normalized
            .chunks
            .into_iter()
            .map(|text| {
                let vector = embed(&text);
                (text, vector)
            })
            .collect(),
    };

    if prepared.format == DocFormat::Unknown && prepared.chunks.is_empty() {
        return Ok(PrepareOutcome::Unindexable(prepared));
    }
    Ok(PrepareOutcome::Ready(prepared))
}

/// Expand a path argument into the sorted list of files to ingest.
fn collect_files(config: &Config, path: &Path) -> Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(path).map_err(|source| EngineError::UnreadableSource {
        path: path.to_path_buf(),
        source,
    })?;

    if metadata.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let include_set = build_globset(&config.ingest.include_globs)?;

    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(config.ingest.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(path).follow_links(config.ingest.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(path).unwrap_or(entry.path());
        let rel_str = relative.to_string_lossy().to_string();
        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(entry.path().to_path_buf());
    }

    // Sort for deterministic ordering.
    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| EngineError::InvalidArgument {
            verb: "add".to_string(),
            message: format!("bad glob pattern {:?}: {}", pattern, e),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| EngineError::InvalidArgument {
        verb: "add".to_string(),
        message: e.to_string(),
    })
}
