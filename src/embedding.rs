//! Deterministic feature-hashed embeddings.
//!
//! [`embed`] maps text to a fixed 256-dimensional vector with no model, no
//! network call, and no hidden state: tokens are lowercased, weighted by a
//! fixed term table, and feature-hashed into buckets via SHA-256 so the same
//! text produces a bit-identical vector on every run and every toolchain.
//! Hash collisions between terms are tolerated by design; retrieval only
//! needs relative ranking, not absolute semantic accuracy.
//!
//! Vectors are L2-normalized, so cosine similarity and dot product coincide.

use sha2::{Digest, Sha256};

/// System-wide embedding dimensionality.
pub const EMBEDDING_DIMS: usize = 256;

const KEYWORD_WEIGHT: f32 = 3.0;
const IDENTIFIER_WEIGHT: f32 = 1.5;
const PROSE_WEIGHT: f32 = 1.0;

/// Reserved words shared across the languages the normalizer classifies as
/// code. Membership is heuristic; ranking depends only on the table being
/// applied identically to documents and queries. Sorted for binary search.
const PROGRAMMING_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "bool", "break", "case", "catch", "char", "class",
    "const", "continue", "def", "default", "del", "do", "elif", "else", "enum", "except",
    "export", "extends", "false", "final", "finally", "fn", "for", "from", "func", "function",
    "if", "impl", "import", "in", "int", "interface", "lambda", "let", "loop", "match",
    "mod", "mut", "new", "nil", "none", "not", "null", "pass", "print", "priv",
    "pub", "raise", "return", "self", "static", "str", "struct", "super", "switch", "throw",
    "trait", "true", "try", "type", "typeof", "use", "var", "void", "while", "with",
    "yield",
];

/// Embed text as a fixed-length, L2-normalized vector.
///
/// Pure and deterministic: identical input always yields a bit-identical
/// vector. Text with no recognizable tokens embeds to the zero vector, which
/// scores 0.0 against everything.
pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIMS];

    for raw in tokens(text) {
        let lowered = raw.to_lowercase();
        vector[bucket(&lowered)] += term_weight(raw, &lowered);
    }

    l2_normalize(&mut vector);
    vector
}

/// Split text into candidate terms: runs of alphanumerics and underscores,
/// at least two characters long.
fn tokens(text: &str) -> impl Iterator<Item = &str> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.chars().count() >= 2)
}

/// Weight a term: programming keywords above identifier-shaped tokens above
/// generic prose. The raw (pre-lowercase) form is consulted for identifier
/// shape, since case information is gone after folding.
fn term_weight(raw: &str, lowered: &str) -> f32 {
    if PROGRAMMING_KEYWORDS.binary_search(&lowered).is_ok() {
        KEYWORD_WEIGHT
    } else if looks_like_identifier(raw) {
        IDENTIFIER_WEIGHT
    } else {
        PROSE_WEIGHT
    }
}

/// Identifier shape: snake_case, embedded digits, or camelCase interior.
fn looks_like_identifier(raw: &str) -> bool {
    if raw.contains('_') || raw.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }
    // Uppercase after the first character suggests camelCase or PascalCase.
    raw.chars().skip(1).any(|c| c.is_uppercase()) && raw.chars().any(|c| c.is_lowercase())
}

/// Feature-hash a term into one of [`EMBEDDING_DIMS`] buckets.
///
/// SHA-256 rather than the stdlib hasher: the bucket assignment is part of
/// the persisted artifact contract and must not drift across toolchains.
fn bucket(term: &str) -> usize {
    let digest = Sha256::digest(term.as_bytes());
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&digest[..8]);
    (u64::from_le_bytes(raw) % EMBEDDING_DIMS as u64) as usize
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm < f32::EPSILON {
        return;
    }
    for v in vector.iter_mut() {
        *v /= norm;
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors, vectors of
/// different lengths, or a zero vector on either side.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_table_is_sorted() {
        for pair in PROGRAMMING_KEYWORDS.windows(2) {
            assert!(pair[0] < pair[1], "table out of order at {:?}", pair);
        }
    }

    #[test]
    fn test_embedding_dimensions() {
        assert_eq!(embed("test text").len(), EMBEDDING_DIMS);
    }

    #[test]
    fn test_deterministic_bit_identical() {
        let a = embed("The quick brown fox jumps over the lazy dog");
        let b = embed("The quick brown fox jumps over the lazy dog");
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalized_to_unit_length() {
        let v = embed("some ordinary text about nothing in particular");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {}", norm);
    }

    #[test]
    fn test_identical_text_full_similarity() {
        let a = embed("fn main prints hello world");
        let b = embed("fn main prints hello world");
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_different_texts_differ() {
        let a = embed("This is about Python programming");
        let b = embed("This is about machine learning");
        assert_ne!(a, b);
    }

    #[test]
    fn test_overlapping_texts_rank_above_unrelated() {
        let query = embed("quick fox");
        let related = embed("the quick brown fox");
        let unrelated = embed("slow yellow dog");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_zero_vector() {
        let v = embed("");
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(cosine_similarity(&v, &embed("anything at all")), 0.0);
    }

    #[test]
    fn test_single_char_tokens_ignored() {
        assert_eq!(embed("a b c"), embed(""));
    }

    #[test]
    fn test_keyword_outweighs_prose() {
        // "fn" is in the table, "ox" is not; both hash to one bucket each.
        let kw = embed("fn");
        let prose = embed("ox");
        // Both normalize to a single unit spike, so compare pre-normalized
        // weight through a mixed embedding instead.
        let mixed = embed("fn ox");
        let kw_sim = cosine_similarity(&mixed, &kw);
        let prose_sim = cosine_similarity(&mixed, &prose);
        assert!(
            kw_sim > prose_sim,
            "keyword similarity {} should exceed prose {}",
            kw_sim,
            prose_sim
        );
    }
}
