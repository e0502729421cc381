use dqa_core::error::AppError;
use serde::{Deserialize, Serialize};

/// Model output plus the provider's raw response payload, kept for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Generation {
    pub text: String,
    pub raw: serde_json::Value,
}

pub trait Generator: Send + Sync {
    fn generate(&self, model: &str, prompt: &str, temperature: f32) -> Result<Generation, AppError>;
}

pub mod gemini_llm;
pub mod ollama_llm;

pub use gemini_llm::GeminiGenerator;
pub use ollama_llm::OllamaGenerator;
