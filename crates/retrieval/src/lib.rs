//! Ragnarok Retrieval
//!
//! Similarity search over indexed chunks and assembly of a bounded context
//! for prompt augmentation.

pub mod context;
pub mod prompt;

pub use context::{ContextAssembler, RetrievalParams, RetrievedContext};
pub use prompt::{build_prompt, enhance_prompt, AugmentedPrompt};
