//! Selectable-text extraction with lopdf

use anyhow::Context;
use lopdf::Document;
use std::path::Path;
use tracing::{debug, warn};

/// Text layer of a PDF plus what is needed to plan recognition
#[derive(Debug, Clone, Default)]
pub struct SelectableText {
    pub text: String,
    pub page_count: u32,
    /// 1-based numbers of pages that draw at least one image
    pub image_pages: Vec<u32>,
}

/// Reads the embedded text layer of a document
pub trait SelectableTextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> anyhow::Result<SelectableText>;

    /// Page count, or `None` if the file cannot be parsed
    fn page_count(&self, path: &Path) -> Option<u32>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfExtractor;

impl SelectableTextExtractor for LopdfExtractor {
    fn extract(&self, path: &Path) -> anyhow::Result<SelectableText> {
        let doc = Document::load(path)
            .with_context(|| format!("failed to load PDF {}", path.display()))?;

        let pages = doc.get_pages();
        debug!(page_count = pages.len(), "Extracting text from PDF");

        let mut text = String::new();
        let mut image_pages = Vec::new();

        for (&page_num, &page_id) in pages.iter() {
            match doc.extract_text(&[page_num]) {
                Ok(page_text) => {
                    let cleaned = clean_text(&page_text);
                    if !cleaned.is_empty() {
                        if !text.is_empty() {
                            text.push_str("\n\n");
                        }
                        text.push_str(&cleaned);
                    }
                }
                Err(e) => {
                    warn!(page = page_num, error = %e, "Failed to extract text from page, skipping");
                }
            }

            let has_images = doc
                .get_page_images(page_id)
                .map(|images| !images.is_empty())
                .unwrap_or(false);
            if has_images {
                image_pages.push(page_num);
            }
        }

        debug!(
            text_len = text.len(),
            image_pages = image_pages.len(),
            "Text layer extracted"
        );

        Ok(SelectableText {
            text,
            page_count: pages.len() as u32,
            image_pages,
        })
    }

    fn page_count(&self, path: &Path) -> Option<u32> {
        match Document::load(path) {
            Ok(doc) => Some(doc.get_pages().len() as u32),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Page count probe failed");
                None
            }
        }
    }
}

/// Collapse whitespace runs and drop byte-order marks
fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
