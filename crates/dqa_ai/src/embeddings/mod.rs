use dqa_core::error::AppError;

/// Text → fixed-length vector. Build and query must use the same model identifier.
pub trait Embedder: Send + Sync {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError>;
}

pub mod gemini_embed;
pub mod ollama_embed;

pub use gemini_embed::GeminiEmbedder;
pub use ollama_embed::OllamaEmbedder;
