use dqa_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::llm::Generator;
use crate::store::ScoredChunk;

mod prompts;

pub use prompts::{join_context, qa_prompt};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub text: String,
    pub model: String,
    /// Provider response payload, for diagnostics.
    pub raw: serde_json::Value,
}

/// Single model call over all retrieved context. Failures are reported, never retried: a silent
/// retry would hide cost and quota problems.
pub fn answer_question(
    generator: &dyn Generator,
    model: &str,
    temperature: f32,
    hits: &[ScoredChunk],
    question: &str,
) -> Result<Answer, AppError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AppError::new(codes::GENERATION_FAILED, "Question must not be empty"));
    }

    let context = join_context(hits.iter().map(|h| h.text.as_str()));
    let prompt = qa_prompt(&context, question);

    let generation = generator
        .generate(model, &prompt, temperature)
        .map_err(|e| {
            AppError::new(codes::GENERATION_FAILED, "Language model call failed")
                .with_details(e.describe())
                .with_retryable(e.retryable)
        })?;
    if generation.text.trim().is_empty() {
        return Err(AppError::new(codes::GENERATION_FAILED, "Model response was empty"));
    }

    info!(model, context_chunks = hits.len(), "answer generated");
    Ok(Answer {
        text: generation.text.trim().to_string(),
        model: model.to_string(),
        raw: generation.raw,
    })
}
