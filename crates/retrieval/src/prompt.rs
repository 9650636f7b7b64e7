//! Prompt augmentation

use crate::context::{ContextAssembler, RetrievalParams};
use ragnarok_common::errors::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedPrompt {
    /// The user's prompt wrapped with document context, or unchanged when
    /// nothing relevant was found
    pub prompt: String,
    pub context_found: bool,
    pub context_length: usize,
    pub sources: Vec<String>,
}

/// Wrap `user_prompt` with the most relevant document context
pub async fn enhance_prompt(
    assembler: &ContextAssembler,
    user_prompt: &str,
    params: &RetrievalParams,
) -> Result<AugmentedPrompt> {
    let retrieved = assembler.retrieve_context(user_prompt, params).await?;

    if !retrieved.found {
        return Ok(AugmentedPrompt {
            prompt: user_prompt.to_string(),
            context_found: false,
            context_length: 0,
            sources: Vec::new(),
        });
    }

    info!(
        sources = retrieved.sources.len(),
        context_length = retrieved.context_length,
        "Prompt enhanced with document context"
    );

    Ok(AugmentedPrompt {
        prompt: build_prompt(&retrieved.context, user_prompt),
        context_found: true,
        context_length: retrieved.context_length,
        sources: retrieved.sources,
    })
}

pub fn build_prompt(context: &str, user_prompt: &str) -> String {
    format!(
        "You are an AI assistant with access to document knowledge. Use the following context to answer \
         the user's question. If the context doesn't contain relevant information, you can provide a \
         general response but mention that you don't have specific information from the documents.\n\n\
         CONTEXT FROM DOCUMENTS:\n{context}\n\n\
         USER QUESTION: {user_prompt}\n\n\
         Please provide a helpful and accurate response based on the context above."
    )
}
