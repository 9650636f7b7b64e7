//! Text chunking module
//!
//! Splits text into overlapping windows of whitespace-delimited words.

use ragnarok_common::config::ChunkingConfig;
use tracing::{debug, warn};

/// Split text into chunks of `chunk_size` words with `overlap` words shared
/// between neighbours.
///
/// `chunk_size` is clamped to `[1, max_chunk_size]` and `overlap` to at most
/// half of it. Output is capped at `max_chunks`; hitting the cap yields a
/// truncated but valid result.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || config.max_chunks == 0 {
        return Vec::new();
    }

    let chunk_size = config.chunk_size.clamp(1, config.max_chunk_size.max(1));
    let overlap = config.overlap.min(chunk_size / 2);
    let stride = chunk_size - overlap;

    let mut chunks = Vec::new();
    for start in (0..words.len()).step_by(stride) {
        if chunks.len() >= config.max_chunks {
            warn!(
                max_chunks = config.max_chunks,
                total_words = words.len(),
                "Chunk limit reached, remaining text dropped"
            );
            break;
        }

        let end = (start + chunk_size).min(words.len());
        let chunk = words[start..end].join(" ");
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
    }

    debug!(
        word_count = words.len(),
        chunk_count = chunks.len(),
        chunk_size,
        overlap,
        "Text chunked"
    );

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            overlap,
            ..Default::default()
        }
    }

    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_sliding_window() {
        let chunks = chunk_text(&numbered_words(10), &config(4, 1));
        assert_eq!(
            chunks,
            vec!["w0 w1 w2 w3", "w3 w4 w5 w6", "w6 w7 w8 w9", "w9"]
        );
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", &ChunkingConfig::default()).is_empty());
        assert!(chunk_text("   \n\t ", &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn test_overlap_clamped_to_half() {
        // overlap 10 on size 4 behaves like overlap 2
        let chunks = chunk_text(&numbered_words(6), &config(4, 10));
        assert_eq!(chunks, vec!["w0 w1 w2 w3", "w2 w3 w4 w5", "w4 w5"]);
    }

    #[test]
    fn test_chunk_size_clamped_to_maximum() {
        let cfg = ChunkingConfig {
            chunk_size: 5000,
            overlap: 0,
            max_chunk_size: 1000,
            max_chunks: 1000,
        };
        let chunks = chunk_text(&numbered_words(2500), &cfg);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].split_whitespace().count(), 1000);
    }

    #[test]
    fn test_max_chunks_and_non_empty_for_many_sizes() {
        let text = "lorem ipsum dolor sit amet ".repeat(400);
        for chunk_size in [2, 3, 7, 50, 500] {
            let cfg = ChunkingConfig {
                chunk_size,
                overlap: chunk_size,
                max_chunk_size: 1000,
                max_chunks: 25,
            };
            let chunks = chunk_text(&text, &cfg);
            assert!(!chunks.is_empty());
            assert!(chunks.len() <= 25);
            assert!(chunks.iter().all(|c| !c.trim().is_empty()));
        }
    }

    #[test]
    fn test_deterministic() {
        let text = numbered_words(1234);
        let cfg = ChunkingConfig::default();
        assert_eq!(chunk_text(&text, &cfg), chunk_text(&text, &cfg));
    }
}
