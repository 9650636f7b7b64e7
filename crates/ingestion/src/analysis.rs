//! Lightweight content analysis recorded on completed documents

use crate::errors::truncate_chars;
use ragnarok_common::CONTENT_PREVIEW_CHARS;
use regex_lite::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Characters of text scanned for key topics
const TOPIC_SCAN_CHARS: usize = 1000;
const MAX_TOPICS: usize = 5;

const STOP_WORDS: &[&str] = &[
    "This", "That", "With", "From", "They", "Have", "Will", "Been", "Were", "Said",
];

fn capitalized_word() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-z]{3,}\b").ok()).as_ref()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentAnalysis {
    pub content_preview: String,
    pub key_topics: Vec<String>,
}

pub fn analyze(text: &str) -> ContentAnalysis {
    ContentAnalysis {
        content_preview: content_preview(text),
        key_topics: key_topics(text),
    }
}

/// First 500 characters, with `...` appended when the text is longer
pub fn content_preview(text: &str) -> String {
    let preview = truncate_chars(text, CONTENT_PREVIEW_CHARS);
    if preview.len() < text.len() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Capitalized words seen more than once near the start of the text,
/// most frequent first, ties in order of first appearance
pub fn key_topics(text: &str) -> Vec<String> {
    let Some(re) = capitalized_word() else {
        return Vec::new();
    };
    let head = truncate_chars(text, TOPIC_SCAN_CHARS);

    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, m) in re.find_iter(&head).enumerate() {
        let word = m.as_str();
        if STOP_WORDS.contains(&word) {
            continue;
        }
        counts.entry(word).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .filter(|(_, (count, _))| *count > 1)
        .map(|(word, (count, first))| (word, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(MAX_TOPICS)
        .map(|(word, _, _)| word.to_string())
        .collect()
}
