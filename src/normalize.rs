//! Content normalization: format detection and chunk extraction.
//!
//! Raw bytes plus a source path go in; a detected [`DocFormat`] and an
//! ordered sequence of bounded chunk texts come out. Splitting happens at
//! natural boundaries — paragraph breaks for prose and markup, line breaks
//! for code and tabular data — and never mid-token. Binary content yields
//! zero chunks so the caller can record the document as unindexable without
//! failing the whole batch.

use std::path::Path;

use crate::models::DocFormat;

/// Outcome of normalizing one source.
#[derive(Debug)]
pub struct Normalized {
    pub format: DocFormat,
    pub chunks: Vec<String>,
}

/// How many leading bytes to sniff for binary content.
const SNIFF_LEN: usize = 8192;

const CODE_EXTENSIONS: &[&str] = &[
    "c", "cc", "cpp", "cs", "go", "h", "hpp", "java", "js", "jsx", "kt", "lua", "pl", "py", "rb",
    "rs", "scala", "sh", "sql", "swift", "ts", "tsx", "zsh",
];

const MARKUP_EXTENSIONS: &[&str] = &[
    "adoc", "htm", "html", "ini", "json", "md", "markdown", "rst", "tex", "toml", "xml", "yaml",
    "yml",
];

const TABULAR_EXTENSIONS: &[&str] = &["csv", "tsv"];

const PROSE_EXTENSIONS: &[&str] = &["log", "text", "txt"];

/// Normalize raw bytes into format plus bounded chunk texts.
pub fn normalize(path: &Path, bytes: &[u8], max_chunk_chars: usize) -> Normalized {
    if looks_binary(bytes) {
        return Normalized {
            format: DocFormat::Unknown,
            chunks: Vec::new(),
        };
    }

    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t,
        Err(_) => {
            return Normalized {
                format: DocFormat::Unknown,
                chunks: Vec::new(),
            }
        }
    };

    let format = classify(path, text);
    let chunks = match format {
        DocFormat::Code | DocFormat::Tabular => split_text(text, max_chunk_chars, "\n"),
        _ => split_text(text, max_chunk_chars, "\n\n"),
    };

    Normalized { format, chunks }
}

/// Detect the content category from the extension, falling back to content
/// sniffing for extensionless or unrecognized sources.
pub fn classify(path: &Path, text: &str) -> DocFormat {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        let ext = ext.to_ascii_lowercase();
        if CODE_EXTENSIONS.contains(&ext.as_str()) {
            return DocFormat::Code;
        }
        if MARKUP_EXTENSIONS.contains(&ext.as_str()) {
            return DocFormat::Markup;
        }
        if TABULAR_EXTENSIONS.contains(&ext.as_str()) {
            return DocFormat::Tabular;
        }
        if PROSE_EXTENSIONS.contains(&ext.as_str()) {
            return DocFormat::Prose;
        }
    }

    sniff(text)
}

fn sniff(text: &str) -> DocFormat {
    let trimmed = text.trim_start();
    if trimmed.starts_with("#!") {
        return DocFormat::Code;
    }
    if trimmed.starts_with('<') || trimmed.starts_with('{') || trimmed.starts_with('[') {
        return DocFormat::Markup;
    }
    DocFormat::Prose
}

/// NUL bytes in the sniff window mark the content as binary.
fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(SNIFF_LEN).any(|b| *b == 0)
}

/// Split text into chunks no longer than `max_chars`, preferring the given
/// separator, then single newlines, then spaces. Empty or whitespace-only
/// text yields no chunks.
fn split_text(text: &str, max_chars: usize, separator: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for part in text.split(separator) {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current.is_empty() {
            trimmed.chars().count()
        } else {
            current.chars().count() + separator.len() + trimmed.chars().count()
        };

        if would_be > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if trimmed.chars().count() > max_chars {
            // A single oversized part: hard-split at word boundaries.
            hard_split(trimmed, max_chars, &mut chunks);
        } else {
            if !current.is_empty() {
                current.push_str(separator);
            }
            current.push_str(trimmed);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split an oversized span at whitespace, falling back to a character
/// boundary only when a single token exceeds the limit.
fn hard_split(span: &str, max_chars: usize, out: &mut Vec<String>) {
    let mut remaining = span;
    while !remaining.is_empty() {
        let limit = char_floor(remaining, max_chars);
        if limit >= remaining.len() {
            let piece = remaining.trim();
            if !piece.is_empty() {
                out.push(piece.to_string());
            }
            break;
        }

        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .map(|pos| pos + 1)
            .unwrap_or(limit);

        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[split_at..];
    }
}

/// Byte index of the last char boundary at or below `max_chars` characters.
fn char_floor(s: &str, max_chars: usize) -> usize {
    s.char_indices()
        .nth(max_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn chunks_of(text: &str, max: usize) -> Vec<String> {
        normalize(&PathBuf::from("note.txt"), text.as_bytes(), max).chunks
    }

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(
            classify(&PathBuf::from("lib.rs"), ""),
            DocFormat::Code
        );
        assert_eq!(
            classify(&PathBuf::from("README.md"), ""),
            DocFormat::Markup
        );
        assert_eq!(
            classify(&PathBuf::from("data.csv"), ""),
            DocFormat::Tabular
        );
        assert_eq!(
            classify(&PathBuf::from("notes.txt"), ""),
            DocFormat::Prose
        );
    }

    #[test]
    fn test_sniff_without_extension() {
        assert_eq!(
            classify(&PathBuf::from("run"), "#!/bin/sh\necho hi"),
            DocFormat::Code
        );
        assert_eq!(
            classify(&PathBuf::from("page"), "<html><body/></html>"),
            DocFormat::Markup
        );
        assert_eq!(
            classify(&PathBuf::from("letter"), "Dear reader,"),
            DocFormat::Prose
        );
    }

    #[test]
    fn test_binary_yields_no_chunks() {
        let result = normalize(&PathBuf::from("blob.bin"), &[0u8, 159, 146, 150], 2000);
        assert_eq!(result.format, DocFormat::Unknown);
        assert!(result.chunks.is_empty());
    }

    #[test]
    fn test_invalid_utf8_yields_no_chunks() {
        let result = normalize(&PathBuf::from("weird.txt"), &[0xff, 0xfe, 0x41], 2000);
        assert_eq!(result.format, DocFormat::Unknown);
        assert!(result.chunks.is_empty());
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunks_of("", 2000).is_empty());
        assert!(chunks_of("   \n\n  ", 2000).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunks_of("Hello, world!", 2000);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_paragraphs_merge_under_limit() {
        let chunks = chunks_of("First paragraph.\n\nSecond paragraph.", 2000);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("First paragraph."));
        assert!(chunks[0].contains("Second paragraph."));
    }

    #[test]
    fn test_paragraphs_split_over_limit() {
        let text = "This is paragraph one.\n\nThis is paragraph two.\n\nThis is paragraph three.";
        let chunks = chunks_of(text, 30);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 30, "oversized chunk: {:?}", chunk);
        }
    }

    #[test]
    fn test_never_splits_mid_word() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = chunks_of(text, 20);
        let words: Vec<&str> = text.split_whitespace().collect();
        for chunk in &chunks {
            for word in chunk.split_whitespace() {
                assert!(words.contains(&word), "torn token {:?}", word);
            }
        }
    }

    #[test]
    fn test_multibyte_safe_hard_split() {
        let text = "日本語のテキスト ".repeat(40);
        let chunks = chunks_of(&text, 25);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 25);
        }
    }

    #[test]
    fn test_code_splits_on_lines() {
        let code = "fn one() {}\nfn two() {}\nfn three() {}";
        let result = normalize(&PathBuf::from("x.rs"), code.as_bytes(), 24);
        assert_eq!(result.format, DocFormat::Code);
        assert!(result.chunks.len() > 1);
        for chunk in &result.chunks {
            assert!(!chunk.contains("one() {}\nfn two() {}\nfn three"));
        }
    }

    #[test]
    fn test_order_preserved() {
        let text = (0..30)
            .map(|i| format!("Paragraph number {} here.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunks_of(&text, 60);
        let joined = chunks.join("\n\n");
        let mut last = None;
        for i in 0..30 {
            let pos = joined
                .find(&format!("Paragraph number {} here.", i))
                .expect("paragraph missing");
            if let Some(prev) = last {
                assert!(pos > prev, "paragraph {} out of order", i);
            }
            last = Some(pos);
        }
    }
}
