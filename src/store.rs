//! Durable document store: insertion-ordered documents over a flat chunk arena.
//!
//! The store exclusively owns the index. Documents hold ranges into a flat
//! `Vec` of chunks-with-embeddings (the arena); that arena is the unit of
//! similarity scan, persistence, and rebuild. Readers take [`Snapshot`]s —
//! `Arc` clones installed under a brief lock — and then scan lock-free, so a
//! long similarity pass never blocks ingestion. Mutations rebuild the arena
//! and swap fresh `Arc`s in, bumping the generation counter the cache keys
//! its validity on.
//!
//! Persistence is a single JSON artifact: format-version tag, generation,
//! ordered documents with embedded chunk vectors, and a SHA-256 checksum
//! over the payload. A checksum or parse failure on load surfaces
//! [`EngineError::IndexCorrupted`] and the store starts empty rather than
//! serving partial data.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::models::{ArenaChunk, DocFormat, Document, DocumentSummary};

/// Artifact layout version; bump on any incompatible change.
const FORMAT_VERSION: u32 = 1;

/// Immutable view of the indexed corpus at one generation.
///
/// Cheap to clone out of the store and safe to scan while writers proceed.
#[derive(Clone)]
pub struct Snapshot {
    pub documents: Arc<Vec<Document>>,
    pub arena: Arc<Vec<ArenaChunk>>,
    pub generation: u64,
}

impl Snapshot {
    /// Arena index of a chunk addressed by document id and chunk order.
    pub fn arena_index(&self, document_id: &str, chunk_index: usize) -> Option<usize> {
        let doc = self.documents.iter().find(|d| d.id == document_id)?;
        if chunk_index >= doc.chunk_count {
            return None;
        }
        Some(doc.chunk_start + chunk_index)
    }
}

/// Outcome of [`DocumentStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Same id, same content hash: nothing changed, no generation bump.
    Unchanged,
}

struct StoreInner {
    documents: Arc<Vec<Document>>,
    by_id: HashMap<String, usize>,
    arena: Arc<Vec<ArenaChunk>>,
    generation: u64,
}

impl StoreInner {
    fn empty() -> Self {
        Self {
            documents: Arc::new(Vec::new()),
            by_id: HashMap::new(),
            arena: Arc::new(Vec::new()),
            generation: 0,
        }
    }
}

pub struct DocumentStore {
    inner: RwLock<StoreInner>,
    artifact_path: PathBuf,
}

impl DocumentStore {
    /// Open a store backed by the artifact at `path`.
    ///
    /// A missing artifact yields an empty store. A corrupted one also yields
    /// an empty store, with the failure returned alongside so the caller can
    /// surface it instead of silently serving partial data.
    pub fn open(path: &Path) -> (Self, Option<EngineError>) {
        let store = Self {
            inner: RwLock::new(StoreInner::empty()),
            artifact_path: path.to_path_buf(),
        };

        if !path.exists() {
            debug!(path = %path.display(), "no index artifact, starting empty");
            return (store, None);
        }

        match read_artifact(path) {
            Ok(payload) => {
                let doc_count = payload.documents.len();
                let mut inner = store.inner.write().unwrap();
                *inner = inner_from_payload(payload);
                drop(inner);
                info!(path = %path.display(), documents = doc_count, "index artifact loaded");
                (store, None)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "index artifact rejected, starting empty");
                (store, Some(err))
            }
        }
    }

    /// In-memory store for tests; persists to the given path only on `save`.
    pub fn empty_at(path: &Path) -> Self {
        Self {
            inner: RwLock::new(StoreInner::empty()),
            artifact_path: path.to_path_buf(),
        }
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().unwrap().generation
    }

    /// Take an immutable snapshot for scanning.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read().unwrap();
        Snapshot {
            documents: Arc::clone(&inner.documents),
            arena: Arc::clone(&inner.arena),
            generation: inner.generation,
        }
    }

    /// Insert or replace a document.
    ///
    /// An existing document with the same content hash is left untouched
    /// (`indexed_at` included) and the generation does not move. Any real
    /// change replaces the prior chunks and embeddings wholesale.
    pub fn upsert(
        &self,
        id: &str,
        source_path: &str,
        content_hash: &str,
        format: DocFormat,
        chunks: Vec<(String, Vec<f32>)>,
    ) -> UpsertOutcome {
        let mut inner = self.inner.write().unwrap();

        let existing_slot = inner.by_id.get(id).copied();
        if let Some(slot) = existing_slot {
            if inner.documents[slot].content_hash == content_hash {
                return UpsertOutcome::Unchanged;
            }
        }

        let document = Document {
            id: id.to_string(),
            source_path: source_path.to_string(),
            content_hash: content_hash.to_string(),
            format,
            indexed_at: chrono::Utc::now().timestamp_millis(),
            chunk_start: 0,
            chunk_count: chunks.len(),
        };

        let mut documents: Vec<Document> = inner.documents.as_ref().clone();
        let outcome = match existing_slot {
            Some(slot) => {
                documents[slot] = document;
                UpsertOutcome::Updated
            }
            None => {
                documents.push(document);
                UpsertOutcome::Inserted
            }
        };

        let slot = existing_slot.unwrap_or(documents.len() - 1);
        rebuild(&mut inner, documents, Some((slot, chunks)));
        outcome
    }

    /// Remove a document by id. Returns the removed summary, if any.
    pub fn remove(&self, id: &str) -> Option<DocumentSummary> {
        let mut inner = self.inner.write().unwrap();
        let slot = inner.by_id.get(id).copied()?;

        let mut documents: Vec<Document> = inner.documents.as_ref().clone();
        let removed = documents.remove(slot);
        let summary = DocumentSummary {
            id: removed.id,
            source_path: removed.source_path,
            format: removed.format,
            chunk_count: removed.chunk_count,
            indexed_at: removed.indexed_at,
        };

        rebuild(&mut inner, documents, None);
        Some(summary)
    }

    /// Reset to an empty index. Returns (documents, chunks) dropped.
    pub fn clear(&self) -> (usize, usize) {
        let mut inner = self.inner.write().unwrap();
        let dropped = (inner.documents.len(), inner.arena.len());
        let generation = inner.generation + 1;
        *inner = StoreInner::empty();
        inner.generation = generation;
        dropped
    }

    /// Lazy, restartable iteration over document summaries in insertion
    /// order. The iterator owns a snapshot, so concurrent mutation cannot
    /// disturb an in-progress walk.
    pub fn list(&self) -> DocumentIter {
        DocumentIter {
            snapshot: self.snapshot(),
            next: 0,
        }
    }

    /// Persist the current state to the backing artifact.
    pub fn save(&self) -> Result<()> {
        let snapshot = self.snapshot();
        write_artifact(&self.artifact_path, &snapshot)?;
        debug!(path = %self.artifact_path.display(), generation = snapshot.generation, "index artifact saved");
        Ok(())
    }

    /// Write the current state to `dest` as a portable artifact.
    /// Returns (documents, chunks) written.
    pub fn export(&self, dest: &Path) -> Result<(usize, usize)> {
        let snapshot = self.snapshot();
        write_artifact(dest, &snapshot)?;
        Ok((snapshot.documents.len(), snapshot.arena.len()))
    }

    /// Replace the store contents with the artifact at `src`.
    ///
    /// A corrupted artifact leaves the current store untouched. On success
    /// the generation moves to at least one past its current value, so cache
    /// entries from before the import can never be served again.
    pub fn import(&self, src: &Path) -> Result<(usize, usize)> {
        let payload = read_artifact(src)?;

        let mut inner = self.inner.write().unwrap();
        let floor = inner.generation + 1;
        let mut fresh = inner_from_payload(payload);
        fresh.generation = fresh.generation.max(floor);
        let counts = (fresh.documents.len(), fresh.arena.len());
        *inner = fresh;
        Ok(counts)
    }
}

/// Iterator over document summaries, backed by an owned snapshot.
pub struct DocumentIter {
    snapshot: Snapshot,
    next: usize,
}

impl Iterator for DocumentIter {
    type Item = DocumentSummary;

    fn next(&mut self) -> Option<Self::Item> {
        let doc = self.snapshot.documents.get(self.next)?;
        self.next += 1;
        Some(DocumentSummary {
            id: doc.id.clone(),
            source_path: doc.source_path.clone(),
            format: doc.format,
            chunk_count: doc.chunk_count,
            indexed_at: doc.indexed_at,
        })
    }
}

/// Recompute arena ranges and install fresh `Arc`s, bumping the generation.
///
/// `replacement` carries the new chunk texts/embeddings for the document at
/// the given slot; every other document keeps its chunks from the old arena.
fn rebuild(
    inner: &mut StoreInner,
    mut documents: Vec<Document>,
    replacement: Option<(usize, Vec<(String, Vec<f32>)>)>,
) {
    let old_arena = Arc::clone(&inner.arena);
    let old_by_id = inner.by_id.clone();
    let old_docs = Arc::clone(&inner.documents);

    let mut arena: Vec<ArenaChunk> = Vec::new();
    let mut by_id = HashMap::with_capacity(documents.len());

    for (slot, doc) in documents.iter_mut().enumerate() {
        let start = arena.len();
        match replacement.as_ref() {
            Some((target, chunks)) if *target == slot => {
                for (chunk_index, (text, embedding)) in chunks.iter().enumerate() {
                    arena.push(ArenaChunk {
                        doc_slot: slot,
                        chunk_index,
                        text: text.clone(),
                        embedding: embedding.clone(),
                    });
                }
            }
            _ => {
                // Carry this document's chunks over from the previous arena.
                let old_slot = old_by_id.get(&doc.id).copied();
                if let Some(old_slot) = old_slot {
                    let old_doc = &old_docs[old_slot];
                    for (chunk_index, chunk) in old_arena
                        [old_doc.chunk_start..old_doc.chunk_start + old_doc.chunk_count]
                        .iter()
                        .enumerate()
                    {
                        arena.push(ArenaChunk {
                            doc_slot: slot,
                            chunk_index,
                            text: chunk.text.clone(),
                            embedding: chunk.embedding.clone(),
                        });
                    }
                }
            }
        }
        doc.chunk_start = start;
        doc.chunk_count = arena.len() - start;
        by_id.insert(doc.id.clone(), slot);
    }

    inner.documents = Arc::new(documents);
    inner.arena = Arc::new(arena);
    inner.by_id = by_id;
    inner.generation += 1;
}

// ============ Persisted artifact ============

#[derive(Serialize, Deserialize)]
struct PersistedChunk {
    text: String,
    embedding: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct PersistedDocument {
    id: String,
    source_path: String,
    content_hash: String,
    format: DocFormat,
    indexed_at: i64,
    chunks: Vec<PersistedChunk>,
}

#[derive(Serialize, Deserialize)]
struct ArtifactPayload {
    format_version: u32,
    generation: u64,
    documents: Vec<PersistedDocument>,
}

#[derive(Serialize, Deserialize)]
struct Artifact {
    checksum: String,
    payload: ArtifactPayload,
}

fn payload_checksum(payload: &ArtifactPayload) -> Result<String> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

fn write_artifact(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let documents = snapshot
        .documents
        .iter()
        .map(|doc| PersistedDocument {
            id: doc.id.clone(),
            source_path: doc.source_path.clone(),
            content_hash: doc.content_hash.clone(),
            format: doc.format,
            indexed_at: doc.indexed_at,
            chunks: snapshot.arena[doc.chunk_start..doc.chunk_start + doc.chunk_count]
                .iter()
                .map(|chunk| PersistedChunk {
                    text: chunk.text.clone(),
                    embedding: chunk.embedding.clone(),
                })
                .collect(),
        })
        .collect();

    let payload = ArtifactPayload {
        format_version: FORMAT_VERSION,
        generation: snapshot.generation,
        documents,
    };

    let artifact = Artifact {
        checksum: payload_checksum(&payload)?,
        payload,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_vec(&artifact)?)?;
    Ok(())
}

fn read_artifact(path: &Path) -> Result<ArtifactPayload> {
    let bytes = std::fs::read(path)?;

    let artifact: Artifact =
        serde_json::from_slice(&bytes).map_err(|e| EngineError::IndexCorrupted {
            reason: format!("unparseable artifact: {}", e),
        })?;

    if artifact.payload.format_version != FORMAT_VERSION {
        return Err(EngineError::IndexCorrupted {
            reason: format!(
                "unsupported format version {} (expected {})",
                artifact.payload.format_version, FORMAT_VERSION
            ),
        });
    }

    let expected = payload_checksum(&artifact.payload)?;
    if expected != artifact.checksum {
        return Err(EngineError::IndexCorrupted {
            reason: "checksum mismatch".to_string(),
        });
    }

    Ok(artifact.payload)
}

fn inner_from_payload(payload: ArtifactPayload) -> StoreInner {
    let mut documents = Vec::with_capacity(payload.documents.len());
    let mut arena = Vec::new();
    let mut by_id = HashMap::with_capacity(payload.documents.len());

    for (slot, doc) in payload.documents.into_iter().enumerate() {
        let start = arena.len();
        let count = doc.chunks.len();
        for (chunk_index, chunk) in doc.chunks.into_iter().enumerate() {
            arena.push(ArenaChunk {
                doc_slot: slot,
                chunk_index,
                text: chunk.text,
                embedding: chunk.embedding,
            });
        }
        by_id.insert(doc.id.clone(), slot);
        documents.push(Document {
            id: doc.id,
            source_path: doc.source_path,
            content_hash: doc.content_hash,
            format: doc.format,
            indexed_at: doc.indexed_at,
            chunk_start: start,
            chunk_count: count,
        });
    }

    StoreInner {
        documents: Arc::new(documents),
        by_id,
        arena: Arc::new(arena),
        generation: payload.generation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::embed;

    fn chunked(texts: &[&str]) -> Vec<(String, Vec<f32>)> {
        texts
            .iter()
            .map(|t| (t.to_string(), embed(t)))
            .collect()
    }

    fn scratch_store() -> (tempfile::TempDir, DocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::empty_at(&dir.path().join("index.json"));
        (dir, store)
    }

    #[test]
    fn test_insert_then_unchanged_is_noop() {
        let (_dir, store) = scratch_store();

        let outcome = store.upsert("d1", "a.txt", "hash-1", DocFormat::Prose, chunked(&["alpha"]));
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(store.generation(), 1);

        let first = store.snapshot();
        let indexed_at = first.documents[0].indexed_at;

        let outcome = store.upsert("d1", "a.txt", "hash-1", DocFormat::Prose, chunked(&["alpha"]));
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert_eq!(store.generation(), 1, "unchanged re-add must not bump");
        assert_eq!(store.snapshot().documents[0].indexed_at, indexed_at);
    }

    #[test]
    fn test_changed_content_replaces_chunks() {
        let (_dir, store) = scratch_store();
        store.upsert(
            "d1",
            "a.txt",
            "hash-1",
            DocFormat::Prose,
            chunked(&["alpha", "beta"]),
        );
        let outcome = store.upsert("d1", "a.txt", "hash-2", DocFormat::Prose, chunked(&["gamma"]));
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(store.generation(), 2);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.documents.len(), 1);
        assert_eq!(snapshot.arena.len(), 1);
        assert_eq!(snapshot.arena[0].text, "gamma");
    }

    #[test]
    fn test_arena_ranges_after_mixed_mutations() {
        let (_dir, store) = scratch_store();
        store.upsert("d1", "a.txt", "h1", DocFormat::Prose, chunked(&["a1", "a2"]));
        store.upsert("d2", "b.txt", "h2", DocFormat::Prose, chunked(&["b1"]));
        store.upsert("d3", "c.txt", "h3", DocFormat::Prose, chunked(&["c1", "c2", "c3"]));

        store.remove("d2").unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.documents.len(), 2);
        assert_eq!(snapshot.arena.len(), 5);
        for (slot, doc) in snapshot.documents.iter().enumerate() {
            for offset in 0..doc.chunk_count {
                let chunk = &snapshot.arena[doc.chunk_start + offset];
                assert_eq!(chunk.doc_slot, slot);
                assert_eq!(chunk.chunk_index, offset);
            }
        }
        assert_eq!(snapshot.arena[0].text, "a1");
        assert_eq!(snapshot.arena[2].text, "c1");
    }

    #[test]
    fn test_snapshot_isolated_from_mutation() {
        let (_dir, store) = scratch_store();
        store.upsert("d1", "a.txt", "h1", DocFormat::Prose, chunked(&["alpha"]));

        let before = store.snapshot();
        store.upsert("d2", "b.txt", "h2", DocFormat::Prose, chunked(&["beta"]));

        assert_eq!(before.documents.len(), 1);
        assert_eq!(before.arena.len(), 1);
        assert_eq!(store.snapshot().documents.len(), 2);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let (_dir, store) = scratch_store();
        store.upsert("d1", "a.txt", "h1", DocFormat::Prose, chunked(&["alpha"]));
        let generation = store.generation();
        assert!(store.remove("nope").is_none());
        assert_eq!(store.generation(), generation);
    }

    #[test]
    fn test_clear_resets_and_bumps() {
        let (_dir, store) = scratch_store();
        store.upsert("d1", "a.txt", "h1", DocFormat::Prose, chunked(&["alpha"]));
        let (docs, chunks) = store.clear();
        assert_eq!((docs, chunks), (1, 1));
        assert_eq!(store.generation(), 2);
        assert!(store.snapshot().documents.is_empty());
    }

    #[test]
    fn test_list_insertion_order() {
        let (_dir, store) = scratch_store();
        store.upsert("d1", "a.txt", "h1", DocFormat::Prose, chunked(&["x"]));
        store.upsert("d2", "b.txt", "h2", DocFormat::Code, chunked(&["y"]));
        let ids: Vec<String> = store.list().map(|s| s.id).collect();
        assert_eq!(ids, vec!["d1".to_string(), "d2".to_string()]);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let store = DocumentStore::empty_at(&path);
        store.upsert(
            "d1",
            "a.txt",
            "h1",
            DocFormat::Prose,
            chunked(&["the quick brown fox"]),
        );
        store.upsert("d2", "b.rs", "h2", DocFormat::Code, chunked(&["fn main() {}"]));
        store.save().unwrap();

        let (reloaded, corruption) = DocumentStore::open(&path);
        assert!(corruption.is_none());

        let a = store.snapshot();
        let b = reloaded.snapshot();
        assert_eq!(a.generation, b.generation);
        assert_eq!(a.documents.len(), b.documents.len());
        for (x, y) in a.documents.iter().zip(b.documents.iter()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.content_hash, y.content_hash);
            assert_eq!(x.indexed_at, y.indexed_at);
            assert_eq!((x.chunk_start, x.chunk_count), (y.chunk_start, y.chunk_count));
        }
        for (x, y) in a.arena.iter().zip(b.arena.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.embedding, y.embedding);
        }
    }

    #[test]
    fn test_corrupted_artifact_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let store = DocumentStore::empty_at(&path);
        store.upsert("d1", "a.txt", "h1", DocFormat::Prose, chunked(&["alpha"]));
        store.save().unwrap();

        // Flip part of the payload without touching the stored checksum.
        let text = std::fs::read_to_string(&path).unwrap();
        let tampered = text.replace("alpha", "omega");
        assert_ne!(text, tampered);
        std::fs::write(&path, tampered).unwrap();

        let (reloaded, corruption) = DocumentStore::open(&path);
        assert!(matches!(
            corruption,
            Some(EngineError::IndexCorrupted { .. })
        ));
        assert!(reloaded.snapshot().documents.is_empty());
    }

    #[test]
    fn test_export_import_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::empty_at(&dir.path().join("index.json"));
        store.upsert("d1", "a.txt", "h1", DocFormat::Prose, chunked(&["one", "two"]));
        store.upsert("d2", "b.txt", "h2", DocFormat::Prose, chunked(&["three"]));

        let dest = dir.path().join("bundle.json");
        let (docs, chunks) = store.export(&dest).unwrap();
        assert_eq!((docs, chunks), (2, 3));

        let fresh = DocumentStore::empty_at(&dir.path().join("other.json"));
        fresh.import(&dest).unwrap();

        let a = store.snapshot();
        let b = fresh.snapshot();
        assert_eq!(a.documents.len(), b.documents.len());
        for (x, y) in a.documents.iter().zip(b.documents.iter()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.content_hash, y.content_hash);
        }
        for (x, y) in a.arena.iter().zip(b.arena.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.embedding, y.embedding);
        }
    }

    #[test]
    fn test_import_bumps_generation_past_current() {
        let dir = tempfile::tempdir().unwrap();
        let source = DocumentStore::empty_at(&dir.path().join("src.json"));
        source.upsert("d1", "a.txt", "h1", DocFormat::Prose, chunked(&["alpha"]));
        let bundle = dir.path().join("bundle.json");
        source.export(&bundle).unwrap();

        let target = DocumentStore::empty_at(&dir.path().join("dst.json"));
        for i in 0..5 {
            target.upsert(
                &format!("x{}", i),
                "x.txt",
                &format!("h{}", i),
                DocFormat::Prose,
                chunked(&["filler"]),
            );
        }
        let before = target.generation();
        target.import(&bundle).unwrap();
        assert!(target.generation() > before);
    }

    #[test]
    fn test_import_failure_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::empty_at(&dir.path().join("index.json"));
        store.upsert("d1", "a.txt", "h1", DocFormat::Prose, chunked(&["alpha"]));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, b"{ not json").unwrap();
        assert!(store.import(&bad).is_err());
        assert_eq!(store.snapshot().documents.len(), 1);
    }
}
