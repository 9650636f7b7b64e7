//! Ragnarok Ingestion
//!
//! Turns uploaded PDFs into indexed chunks:
//! 1. Extraction selector picks the text layer, page recognition or both
//! 2. Chunker splits text into overlapping word windows
//! 3. Pipeline replaces the document's chunks in the vector store and
//!    records the outcome on the document
//! 4. Worker pool runs pipelines in the background

pub mod analysis;
pub mod chunker;
pub mod errors;
pub mod extract;
pub mod processor;
pub mod queue;

#[cfg(test)]
mod test_support;

pub use errors::IngestionError;
pub use extract::{ExtractionOutcome, ExtractionSelector};
pub use processor::IngestionPipeline;
pub use queue::{IngestionJob, WorkerPool};
