//! Document record and processing state machine
//!
//! A [`Document`] is created `pending` outside the ingestion core and then
//! driven `pending -> processing -> {completed | failed}` by exactly one
//! pipeline run. Transitions are methods on the record so an illegal move is
//! an error instead of a silent overwrite.

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Document lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    /// Terminal states are only left through an explicit reprocess
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(AppError::InvalidFormat {
                message: format!("unknown processing status '{}'", other),
            }),
        }
    }
}

/// Which engine produced the extracted text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Text,
    Ocr,
    Mixed,
    Error,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Text => "text",
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::Mixed => "mixed",
            ExtractionMethod::Error => "error",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(ExtractionMethod::Text),
            "ocr" => Ok(ExtractionMethod::Ocr),
            "mixed" => Ok(ExtractionMethod::Mixed),
            "error" => Ok(ExtractionMethod::Error),
            other => Err(AppError::InvalidFormat {
                message: format!("unknown extraction method '{}'", other),
            }),
        }
    }
}

/// Everything recorded on a successful run
#[derive(Debug, Clone)]
pub struct CompletionReport {
    pub method: ExtractionMethod,
    pub chunk_count: usize,
    pub text_length: usize,
    pub content_preview: String,
    pub key_topics: Vec<String>,
}

/// Everything recorded on a failed run
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub message: String,
    /// Set when extraction was attempted before the failure
    pub method: Option<ExtractionMethod>,
    pub text_length: Option<usize>,
}

/// One uploaded file and its processing history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    pub filepath: String,
    pub upload_time: DateTime<Utc>,

    /// Size in bytes
    pub file_size: Option<u64>,
    pub page_count: Option<u32>,

    pub processing_status: ProcessingStatus,
    pub extraction_method: Option<ExtractionMethod>,
    pub processing_start_time: Option<DateTime<Utc>>,
    pub processing_end_time: Option<DateTime<Utc>>,
    /// Seconds between start and terminal transition
    pub processing_duration: Option<f64>,

    /// Characters of extracted text
    pub text_length: Option<usize>,
    pub chunk_count: usize,
    /// Present only while status is `failed`
    pub processing_error: Option<String>,

    pub content_preview: Option<String>,
    pub key_topics: Vec<String>,
}

impl Document {
    /// New `pending` record for an uploaded file
    pub fn new(filename: impl Into<String>, filepath: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            filepath: filepath.into(),
            upload_time: Utc::now(),
            file_size: None,
            page_count: None,
            processing_status: ProcessingStatus::Pending,
            extraction_method: None,
            processing_start_time: None,
            processing_end_time: None,
            processing_duration: None,
            text_length: None,
            chunk_count: 0,
            processing_error: None,
            content_preview: None,
            key_topics: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.processing_status.is_terminal()
    }

    /// `pending -> processing`
    pub fn begin_processing(
        &mut self,
        now: DateTime<Utc>,
        file_size: Option<u64>,
        page_count: Option<u32>,
    ) -> Result<()> {
        self.expect_status(ProcessingStatus::Pending, ProcessingStatus::Processing)?;

        self.processing_status = ProcessingStatus::Processing;
        self.processing_start_time = Some(now);
        self.processing_end_time = None;
        self.processing_duration = None;
        self.processing_error = None;
        self.file_size = file_size;
        self.page_count = page_count;
        Ok(())
    }

    /// `processing -> completed`
    pub fn complete(&mut self, report: CompletionReport, now: DateTime<Utc>) -> Result<()> {
        self.expect_status(ProcessingStatus::Processing, ProcessingStatus::Completed)?;

        self.processing_status = ProcessingStatus::Completed;
        self.extraction_method = Some(report.method);
        self.chunk_count = report.chunk_count;
        self.text_length = Some(report.text_length);
        self.content_preview = Some(report.content_preview);
        self.key_topics = report.key_topics;
        self.processing_error = None;
        self.stamp_end(now);
        Ok(())
    }

    /// `processing -> failed`
    ///
    /// File size, page count and any previously known text length are kept.
    pub fn fail(&mut self, report: FailureReport, now: DateTime<Utc>) -> Result<()> {
        self.expect_status(ProcessingStatus::Processing, ProcessingStatus::Failed)?;

        self.processing_status = ProcessingStatus::Failed;
        if report.method.is_some() {
            self.extraction_method = report.method;
        }
        if report.text_length.is_some() {
            self.text_length = report.text_length;
        }
        self.chunk_count = 0;
        self.processing_error = Some(report.message);
        self.stamp_end(now);
        Ok(())
    }

    /// Explicit re-drive of a terminal document back to `pending`
    pub fn reset_for_reprocessing(&mut self) -> Result<()> {
        if !self.is_terminal() {
            return Err(self.transition_error(ProcessingStatus::Pending));
        }

        self.processing_status = ProcessingStatus::Pending;
        self.extraction_method = None;
        self.processing_start_time = None;
        self.processing_end_time = None;
        self.processing_duration = None;
        self.text_length = None;
        self.chunk_count = 0;
        self.processing_error = None;
        self.content_preview = None;
        self.key_topics.clear();
        Ok(())
    }

    fn stamp_end(&mut self, now: DateTime<Utc>) {
        self.processing_end_time = Some(now);
        self.processing_duration = self
            .processing_start_time
            .map(|start| (now - start).num_milliseconds().max(0) as f64 / 1000.0);
    }

    fn expect_status(&self, required: ProcessingStatus, to: ProcessingStatus) -> Result<()> {
        if self.processing_status == required {
            Ok(())
        } else {
            Err(self.transition_error(to))
        }
    }

    fn transition_error(&self, to: ProcessingStatus) -> AppError {
        AppError::InvalidTransition {
            id: self.id,
            from: self.processing_status.to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn completion() -> CompletionReport {
        CompletionReport {
            method: ExtractionMethod::Text,
            chunk_count: 3,
            text_length: 1200,
            content_preview: "preview".into(),
            key_topics: vec!["Rust".into()],
        }
    }

    #[test]
    fn test_happy_path_sets_end_exactly_once() {
        let mut doc = Document::new("a.pdf", "/tmp/a.pdf");
        let start = Utc::now();
        doc.begin_processing(start, Some(10), Some(2)).unwrap();
        assert_eq!(doc.processing_status, ProcessingStatus::Processing);

        let end = start + Duration::milliseconds(1500);
        doc.complete(completion(), end).unwrap();
        assert_eq!(doc.processing_status, ProcessingStatus::Completed);
        assert_eq!(doc.processing_end_time, Some(end));
        assert_eq!(doc.processing_duration, Some(1.5));
        assert_eq!(doc.extraction_method, Some(ExtractionMethod::Text));
        assert_eq!(doc.chunk_count, 3);

        // Terminal: a second terminal transition is rejected
        assert!(doc.fail(
            FailureReport { message: "late".into(), method: None, text_length: None },
            Utc::now()
        ).is_err());
        assert_eq!(doc.processing_end_time, Some(end));
    }

    #[test]
    fn test_failure_retains_probe_results() {
        let mut doc = Document::new("b.pdf", "/tmp/b.pdf");
        doc.begin_processing(Utc::now(), Some(2048), Some(4)).unwrap();
        doc.fail(
            FailureReport {
                message: "storage down".into(),
                method: Some(ExtractionMethod::Ocr),
                text_length: Some(77),
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(doc.processing_status, ProcessingStatus::Failed);
        assert_eq!(doc.file_size, Some(2048));
        assert_eq!(doc.page_count, Some(4));
        assert_eq!(doc.text_length, Some(77));
        assert_eq!(doc.processing_error.as_deref(), Some("storage down"));
        assert_eq!(doc.chunk_count, 0);
    }

    #[test]
    fn test_cannot_skip_processing() {
        let mut doc = Document::new("c.pdf", "/tmp/c.pdf");
        let err = doc.complete(completion(), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(doc.processing_status, ProcessingStatus::Pending);
    }

    #[test]
    fn test_reprocessing_is_explicit() {
        let mut doc = Document::new("d.pdf", "/tmp/d.pdf");
        assert!(doc.reset_for_reprocessing().is_err());

        doc.begin_processing(Utc::now(), None, None).unwrap();
        assert!(doc.begin_processing(Utc::now(), None, None).is_err());
        doc.fail(
            FailureReport { message: "x".into(), method: None, text_length: None },
            Utc::now(),
        )
        .unwrap();

        doc.reset_for_reprocessing().unwrap();
        assert_eq!(doc.processing_status, ProcessingStatus::Pending);
        assert!(doc.processing_error.is_none());
        assert!(doc.processing_end_time.is_none());
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ProcessingStatus>().unwrap(), status);
        }
        assert!("done".parse::<ProcessingStatus>().is_err());
        assert_eq!("mixed".parse::<ExtractionMethod>().unwrap(), ExtractionMethod::Mixed);
    }
}
