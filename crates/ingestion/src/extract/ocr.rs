//! Page-image recognition
//!
//! Pages are rendered one at a time with poppler's `pdftoppm` and read back
//! with `tesseract`. The rendered image lives in a per-page scratch
//! directory that is removed when the call returns, whatever the outcome.

use anyhow::{bail, Context};
use ragnarok_common::config::ExtractionConfig;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Recognizes the text drawn on one page of a document
pub trait PageRecognizer: Send + Sync {
    /// `page` is 1-based
    fn recognize_page(&self, pdf: &Path, page: u32) -> anyhow::Result<String>;
}

/// Used when recognition is turned off; every page reads as blank
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRecognizer;

impl PageRecognizer for DisabledRecognizer {
    fn recognize_page(&self, _pdf: &Path, _page: u32) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    pdftoppm_bin: String,
    tesseract_bin: String,
    dpi: u32,
    language: String,
    scratch_root: Option<PathBuf>,
}

impl TesseractRecognizer {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            pdftoppm_bin: config.pdftoppm_bin.clone(),
            tesseract_bin: config.tesseract_bin.clone(),
            dpi: config.ocr_dpi,
            language: config.ocr_language.clone(),
            scratch_root: config.ocr_scratch_dir.as_ref().map(PathBuf::from),
        }
    }

    fn render(&self, pdf: &Path, page: u32, prefix: &Path) -> anyhow::Result<()> {
        let page = page.to_string();
        let output = Command::new(&self.pdftoppm_bin)
            .args(["-r", &self.dpi.to_string()])
            .args(["-f", &page, "-l", &page])
            .args(["-png", "-singlefile"])
            .arg(pdf)
            .arg(prefix)
            .output()
            .with_context(|| format!("Failed to execute '{}'. Is poppler installed?", self.pdftoppm_bin))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("pdftoppm failed on page {}: {}", page, stderr.trim());
        }
        Ok(())
    }
}

impl PageRecognizer for TesseractRecognizer {
    fn recognize_page(&self, pdf: &Path, page: u32) -> anyhow::Result<String> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ragnarok-ocr-");
        let scratch = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .context("Failed to create scratch directory")?;
        let prefix = scratch.path().join("page");

        self.render(pdf, page, &prefix)?;
        let image = prefix.with_extension("png");

        let output = Command::new(&self.tesseract_bin)
            .arg(&image)
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .with_context(|| format!("Failed to execute '{}'. Is tesseract installed?", self.tesseract_bin))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("tesseract failed on page {}: {}", page, stderr.trim());
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(page, chars = text.len(), "Page recognized");
        Ok(text)
    }
}
