//! Similarity ranking over store snapshots.
//!
//! A query embeds through the same feature-hash scheme as indexed chunks,
//! scans the snapshot's arena linearly, and keeps the top k by cosine
//! score. Linear scan is a deliberate scale assumption: the target corpus
//! is a working set of local files, not a vector database.
//!
//! Ties break toward the document indexed earlier, then original chunk
//! order, so rankings are stable across runs.

use crate::embedding::{cosine_similarity, embed};
use crate::models::SearchHit;
use crate::store::Snapshot;

/// Rank the snapshot's chunks against `query` and keep the top `k`.
///
/// An empty or token-free query, or an empty store, yields an empty list
/// rather than an error. Zero-scoring chunks are never reported.
pub fn rank(snapshot: &Snapshot, query: &str, k: usize, snippet_chars: usize) -> Vec<SearchHit> {
    scored_arena(snapshot, query)
        .into_iter()
        .take(k)
        .map(|(arena_idx, score)| {
            let chunk = &snapshot.arena[arena_idx];
            let doc = &snapshot.documents[chunk.doc_slot];
            SearchHit {
                document_id: doc.id.clone(),
                source_path: doc.source_path.clone(),
                chunk_index: chunk.chunk_index,
                score,
                snippet: snippet(&chunk.text, snippet_chars),
            }
        })
        .collect()
}

/// Score every arena chunk, returning positive-scoring indices sorted by
/// descending score with deterministic tie-breaks.
fn scored_arena(snapshot: &Snapshot, query: &str) -> Vec<(usize, f32)> {
    if query.trim().is_empty() {
        return Vec::new();
    }

    let query_vec = embed(query);

    let mut scored: Vec<(usize, f32)> = snapshot
        .arena
        .iter()
        .enumerate()
        .map(|(idx, chunk)| (idx, cosine_similarity(&query_vec, &chunk.embedding)))
        .filter(|(_, score)| *score > 0.0)
        .collect();

    scored.sort_by(|a, b| {
        let doc_a = &snapshot.documents[snapshot.arena[a.0].doc_slot];
        let doc_b = &snapshot.documents[snapshot.arena[b.0].doc_slot];
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(doc_a.indexed_at.cmp(&doc_b.indexed_at))
            .then(a.0.cmp(&b.0))
    });

    scored
}

/// Extractive answer assembled from the top hit's chunk text.
///
/// Sentences containing query terms are kept in document order up to
/// `max_chars`; when nothing overlaps (possible through hash-collision
/// matches), the chunk's leading sentences stand in.
pub fn extract_answer(chunk_text: &str, query: &str, max_chars: usize) -> String {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| t.chars().count() >= 2)
        .collect();

    let sentences: Vec<&str> = chunk_text
        .split_inclusive(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut picked: Vec<&str> = sentences
        .iter()
        .copied()
        .filter(|sentence| {
            let lowered = sentence.to_lowercase();
            terms.iter().any(|t| lowered.contains(t.as_str()))
        })
        .collect();

    if picked.is_empty() {
        picked = sentences;
    }

    let mut answer = String::new();
    for sentence in picked {
        if !answer.is_empty() {
            if answer.chars().count() + 1 + sentence.chars().count() > max_chars {
                break;
            }
            answer.push(' ');
        } else if sentence.chars().count() > max_chars {
            answer.extend(sentence.chars().take(max_chars));
            break;
        }
        answer.push_str(sentence);
    }

    answer
}

/// Bounded single-line preview of chunk text.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocFormat;
    use crate::store::DocumentStore;

    fn store_with(texts: &[(&str, &str)]) -> DocumentStore {
        let dir = std::env::temp_dir().join("recall-query-tests");
        let store = DocumentStore::empty_at(&dir.join("unused.json"));
        for (id, text) in texts {
            store.upsert(
                id,
                &format!("{}.txt", id),
                &format!("hash-{}", id),
                DocFormat::Prose,
                vec![(text.to_string(), embed(text))],
            );
        }
        store
    }

    #[test]
    fn test_empty_store_empty_results() {
        let store = store_with(&[]);
        assert!(rank(&store.snapshot(), "anything", 5, 240).is_empty());
    }

    #[test]
    fn test_empty_query_empty_results() {
        let store = store_with(&[("d1", "the quick brown fox")]);
        assert!(rank(&store.snapshot(), "", 5, 240).is_empty());
        assert!(rank(&store.snapshot(), "   ", 5, 240).is_empty());
    }

    #[test]
    fn test_exact_match_scores_one_and_ranks_first() {
        let store = store_with(&[
            ("d1", "completely unrelated text about cooking pasta"),
            ("d2", "the quick brown fox"),
        ]);
        let hits = rank(&store.snapshot(), "the quick brown fox", 5, 240);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].document_id, "d2");
        assert!((hits[0].score - 1.0).abs() < 1e-5, "score {}", hits[0].score);
        for hit in &hits[1..] {
            assert!(hit.score <= hits[0].score);
        }
    }

    #[test]
    fn test_top_k_truncation() {
        let texts: Vec<(String, String)> = (0..10)
            .map(|i| (format!("d{}", i), format!("shared subject plus variant{}", i)))
            .collect();
        let refs: Vec<(&str, &str)> = texts
            .iter()
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect();
        let store = store_with(&refs);
        let hits = rank(&store.snapshot(), "shared subject", 3, 240);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_tied_scores_prefer_earlier_document() {
        // Identical chunk text means identical scores; the earlier-indexed
        // document must come first.
        let store = store_with(&[("first", "identical words"), ("second", "identical words")]);
        let hits = rank(&store.snapshot(), "identical words", 5, 240);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document_id, "first");
        assert_eq!(hits[1].document_id, "second");
    }

    #[test]
    fn test_zero_scores_filtered() {
        let store = store_with(&[("d1", "alpha bravo charlie")]);
        let hits = rank(&store.snapshot(), "zzqx wwvv", 5, 240);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_extract_answer_picks_matching_sentence() {
        let text = "Rust is a systems language. Python is interpreted. Both are popular.";
        let answer = extract_answer(text, "python interpreted", 600);
        assert!(answer.contains("Python is interpreted."));
        assert!(!answer.contains("systems language"));
    }

    #[test]
    fn test_extract_answer_falls_back_to_leading_text() {
        let text = "First sentence here. Second sentence there.";
        let answer = extract_answer(text, "zzqx", 600);
        assert!(answer.starts_with("First sentence here."));
    }

    #[test]
    fn test_extract_answer_respects_bound() {
        let text = "alpha one. alpha two. alpha three. alpha four. alpha five.";
        let answer = extract_answer(text, "alpha", 25);
        assert!(answer.chars().count() <= 25);
        assert!(answer.contains("alpha one."));
    }

    #[test]
    fn test_snippet_bounds_and_flattens() {
        assert_eq!(snippet("line one\nline two", 240), "line one line two");
        let long = "x".repeat(300);
        let s = snippet(&long, 240);
        assert_eq!(s.chars().count(), 243);
        assert!(s.ends_with("..."));
    }
}
