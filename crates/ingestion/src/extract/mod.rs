//! Extraction selector
//!
//! Chooses between the embedded text layer and page-image recognition for a
//! document. The policy itself is the pure [`decide`] function; the
//! [`ExtractionSelector`] only gathers its inputs.

mod ocr;
mod pdf;

pub use ocr::{DisabledRecognizer, PageRecognizer, TesseractRecognizer};
pub use pdf::{LopdfExtractor, SelectableText, SelectableTextExtractor};

use ragnarok_common::config::ExtractionConfig;
use ragnarok_common::document::ExtractionMethod;
use ragnarok_common::metrics;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Thresholds for telling real prose apart from extraction noise
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meaningfulness {
    /// Minimum trimmed length, in characters
    pub min_chars: usize,
    /// Alphabetic share of non-whitespace characters must exceed this
    pub min_alpha_ratio: f64,
}

impl Default for Meaningfulness {
    fn default() -> Self {
        Self {
            min_chars: 50,
            min_alpha_ratio: 0.3,
        }
    }
}

impl Meaningfulness {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            min_chars: config.min_meaningful_chars,
            min_alpha_ratio: config.min_alpha_ratio,
        }
    }

    pub fn is_meaningful(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.min_chars {
            return false;
        }

        let (alpha, visible) = trimmed
            .chars()
            .filter(|c| !c.is_whitespace())
            .fold((0usize, 0usize), |(alpha, visible), c| {
                (alpha + usize::from(c.is_alphabetic()), visible + 1)
            });

        visible > 0 && alpha as f64 / visible as f64 > self.min_alpha_ratio
    }
}

/// Meaningfulness check with the default thresholds
pub fn meaningful(text: &str) -> bool {
    Meaningfulness::default().is_meaningful(text)
}

/// Which source the final text came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Selectable(String),
    Recognized(String),
    Combined { selectable: String, recognized: String },
    None,
}

impl ExtractionOutcome {
    pub fn method(&self) -> ExtractionMethod {
        match self {
            ExtractionOutcome::Selectable(_) => ExtractionMethod::Text,
            ExtractionOutcome::Recognized(_) => ExtractionMethod::Ocr,
            ExtractionOutcome::Combined { .. } => ExtractionMethod::Mixed,
            ExtractionOutcome::None => ExtractionMethod::Error,
        }
    }

    pub fn into_parts(self) -> (String, ExtractionMethod) {
        let method = self.method();
        let text = match self {
            ExtractionOutcome::Selectable(text) | ExtractionOutcome::Recognized(text) => text,
            ExtractionOutcome::Combined { selectable, recognized } => {
                format!("{}\n\n--- Text from Images ---\n{}", selectable, recognized)
            }
            ExtractionOutcome::None => String::new(),
        };
        (text, method)
    }
}

/// Pick the extraction result.
///
/// `recognized` is `None` when recognition was not attempted or could not
/// run at all. Meaningful selectable text is kept, combined with recognized
/// text only when that is meaningful too. Otherwise recognition output is
/// returned as-is, however poor.
pub fn decide(
    selectable: String,
    recognized: Option<String>,
    rule: &Meaningfulness,
) -> ExtractionOutcome {
    if rule.is_meaningful(&selectable) {
        match recognized {
            Some(recognized) if rule.is_meaningful(&recognized) => {
                ExtractionOutcome::Combined { selectable, recognized }
            }
            _ => ExtractionOutcome::Selectable(selectable),
        }
    } else {
        match recognized {
            Some(recognized) => ExtractionOutcome::Recognized(recognized),
            None => ExtractionOutcome::None,
        }
    }
}

/// Runs the engines for one document and applies [`decide`]
#[derive(Clone)]
pub struct ExtractionSelector {
    text: Arc<dyn SelectableTextExtractor>,
    recognizer: Arc<dyn PageRecognizer>,
    rule: Meaningfulness,
}

impl ExtractionSelector {
    pub fn new(
        text: Arc<dyn SelectableTextExtractor>,
        recognizer: Arc<dyn PageRecognizer>,
        rule: Meaningfulness,
    ) -> Self {
        Self { text, recognizer, rule }
    }

    /// lopdf for the text layer, tesseract for images unless disabled
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let recognizer: Arc<dyn PageRecognizer> = if config.ocr_enabled {
            Arc::new(TesseractRecognizer::from_config(config))
        } else {
            Arc::new(DisabledRecognizer)
        };

        Self::new(
            Arc::new(LopdfExtractor),
            recognizer,
            Meaningfulness::from_config(config),
        )
    }

    /// Extract a document's text off the async runtime
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn extract(&self, path: &Path) -> ExtractionOutcome {
        let selector = self.clone();
        let path: PathBuf = path.to_path_buf();

        match tokio::task::spawn_blocking(move || selector.extract_blocking(&path)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Extraction task did not complete");
                ExtractionOutcome::None
            }
        }
    }

    pub async fn page_count(&self, path: &Path) -> Option<u32> {
        let text = Arc::clone(&self.text);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || text.page_count(&path))
            .await
            .ok()
            .flatten()
    }

    fn extract_blocking(&self, path: &Path) -> ExtractionOutcome {
        let started = Instant::now();

        let selectable = match self.text.extract(path) {
            Ok(selectable) => selectable,
            Err(e) => {
                warn!(error = %e, "Document could not be read");
                return decide(String::new(), None, &self.rule);
            }
        };

        // With a usable text layer only pages carrying images need recognition.
        // Without one, recognition always runs, even over zero pages.
        let (pages, recognized) = if self.rule.is_meaningful(&selectable.text) {
            let pages = selectable.image_pages.clone();
            let recognized = (!pages.is_empty()).then(|| self.recognize_pages(path, &pages));
            (pages, recognized)
        } else {
            let pages: Vec<u32> = (1..=selectable.page_count).collect();
            let recognized = self.recognize_pages(path, &pages);
            (pages, Some(recognized))
        };

        let outcome = decide(selectable.text, recognized, &self.rule);
        let method = outcome.method();
        metrics::record_extraction(started.elapsed().as_secs_f64(), method.as_str());
        info!(%method, ocr_pages = pages.len(), "Extraction finished");

        outcome
    }

    /// Recognize pages one by one; failed or blank pages are skipped
    fn recognize_pages(&self, path: &Path, pages: &[u32]) -> String {
        let mut recognized = String::new();

        for &page in pages {
            match self.recognizer.recognize_page(path, page) {
                Ok(text) => {
                    metrics::record_ocr_page(true);
                    let text = text.trim();
                    if !text.is_empty() {
                        recognized.push_str(&format!("\n--- Page {} (OCR) ---\n{}\n", page, text));
                    }
                }
                Err(e) => {
                    metrics::record_ocr_page(false);
                    warn!(page, error = %e, "Page recognition failed, skipping");
                }
            }
        }

        debug!(pages = pages.len(), chars = recognized.len(), "Recognition finished");
        recognized
    }
}
