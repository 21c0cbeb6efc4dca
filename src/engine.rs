//! Engine context: one object owning the configuration, store, and cache.
//!
//! Constructed once at startup and passed to the router — there is no
//! module-level mutable state anywhere in the crate. Query-shaped
//! operations (`search`, `ask`, `summary`) share the result cache; all of
//! them read from snapshots, so they never contend with ingestion.

use std::path::Path;

use tracing::info;

use crate::cache::{QueryCache, QueryKey};
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::ingest::{self, AddReport, AddedText};
use crate::models::{DocumentSummary, SearchHit};
use crate::query;
use crate::store::{DocumentStore, Snapshot};

pub struct Engine {
    config: Config,
    store: DocumentStore,
    cache: QueryCache,
}

/// Answer produced by `ask`: extractive text plus cited source ids.
#[derive(Debug)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}

/// One topic snippet produced by `summary`.
#[derive(Debug)]
pub struct TopicSnippet {
    pub source_path: String,
    pub score: f32,
    pub snippet: String,
}

/// Counters reported by `status`.
#[derive(Debug)]
pub struct EngineStatus {
    pub documents: usize,
    pub chunks: usize,
    pub generation: u64,
    pub cache_entries: usize,
    pub cache_hits: u64,
    pub cache_lookups: u64,
    pub artifact_path: String,
    pub artifact_bytes: u64,
}

impl Engine {
    /// Open the engine over the configured artifact.
    ///
    /// A corrupted artifact is surfaced to the caller while the engine
    /// starts empty and stays fully usable.
    pub fn open(config: Config) -> (Self, Option<EngineError>) {
        let (store, corruption) = DocumentStore::open(&config.storage.index_path);
        let cache = QueryCache::new(config.cache.capacity);
        info!(
            artifact = %config.storage.index_path.display(),
            "engine ready"
        );
        (
            Self {
                config,
                store,
                cache,
            },
            corruption,
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn add_path(&self, path: &Path) -> Result<AddReport> {
        ingest::run_add(&self.config, &self.store, path).await
    }

    pub async fn add_text(&self, name: &str, content: &str) -> Result<AddedText> {
        ingest::run_add_text(&self.config, &self.store, name, content).await
    }

    /// Ranked similarity search, memoized per (normalized query, k).
    pub fn search(&self, raw_query: &str, k: Option<usize>) -> Vec<SearchHit> {
        let k = k.unwrap_or(self.config.retrieval.top_k);
        let snapshot = self.store.snapshot();
        let snippet_chars = self.config.retrieval.snippet_chars;

        let key = QueryKey::new(raw_query, k);
        self.cache.get_or_compute(key, snapshot.generation, || {
            query::rank(&snapshot, raw_query, k, snippet_chars)
        })
    }

    /// Extractive answer from the top hit, with cited source ids.
    pub fn ask(&self, raw_query: &str) -> Answer {
        let hits = self.search(raw_query, None);
        let Some(top) = hits.first() else {
            return Answer {
                text: "No indexed content matches the question.".to_string(),
                sources: Vec::new(),
            };
        };

        let snapshot = self.store.snapshot();
        let text = chunk_text(&snapshot, top)
            .map(|t| query::extract_answer(t, raw_query, self.config.retrieval.answer_max_chars))
            .unwrap_or_else(|| top.snippet.clone());

        let mut sources: Vec<String> = Vec::new();
        for hit in &hits {
            if !sources.contains(&hit.document_id) {
                sources.push(hit.document_id.clone());
            }
        }

        Answer { text, sources }
    }

    /// Top-k snippets on a topic, for concatenated summaries.
    pub fn summary(&self, topic: &str) -> Vec<TopicSnippet> {
        self.search(topic, None)
            .into_iter()
            .map(|hit| TopicSnippet {
                source_path: hit.source_path,
                score: hit.score,
                snippet: hit.snippet,
            })
            .collect()
    }

    pub fn status(&self) -> EngineStatus {
        let snapshot = self.store.snapshot();
        let (cache_hits, cache_lookups) = self.cache.hit_stats();
        let artifact_bytes = std::fs::metadata(self.store.artifact_path())
            .map(|m| m.len())
            .unwrap_or(0);

        EngineStatus {
            documents: snapshot.documents.len(),
            chunks: snapshot.arena.len(),
            generation: snapshot.generation,
            cache_entries: self.cache.len(),
            cache_hits,
            cache_lookups,
            artifact_path: self.store.artifact_path().display().to_string(),
            artifact_bytes,
        }
    }

    pub fn list(&self) -> impl Iterator<Item = DocumentSummary> {
        self.store.list()
    }

    pub fn export(&self, dest: &Path) -> Result<(usize, usize)> {
        self.store.export(dest)
    }

    pub fn import(&self, src: &Path) -> Result<(usize, usize)> {
        let counts = self.store.import(src)?;
        self.store.save()?;
        Ok(counts)
    }

    /// Remove one document, addressed by id or by source path.
    pub fn remove(&self, target: &str) -> Result<Option<DocumentSummary>> {
        let id = self
            .list()
            .find(|summary| summary.id == target || summary.source_path == target)
            .map(|summary| summary.id);

        let Some(id) = id else {
            return Ok(None);
        };

        let removed = self.store.remove(&id);
        if removed.is_some() {
            self.store.save()?;
        }
        Ok(removed)
    }

    /// Reset the store and cache. Returns (documents, chunks) dropped.
    pub fn clear(&self) -> Result<(usize, usize)> {
        let dropped = self.store.clear();
        self.cache.clear();
        self.store.save()?;
        Ok(dropped)
    }
}

fn chunk_text<'s>(snapshot: &'s Snapshot, hit: &SearchHit) -> Option<&'s str> {
    snapshot
        .arena_index(&hit.document_id, hit.chunk_index)
        .map(|idx| snapshot.arena[idx].text.as_str())
}
