use std::time::Duration;

use dqa_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::http::post_json;
use crate::ollama::OllamaClient;

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    timeout: Duration,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let url = self.client.endpoint("/api/embeddings");
        let body = serde_json::to_value(EmbeddingsRequest { model, prompt: input }).map_err(|e| {
            AppError::new(codes::EMBEDDING_FAILED, "Failed to encode embeddings request")
                .with_details(e.to_string())
        })?;
        let raw = post_json(&url, &[], &body, self.timeout, codes::EMBEDDING_FAILED, "embeddings")?;
        let v: EmbeddingsResponse = serde_json::from_value(raw).map_err(|e| {
            AppError::new(codes::EMBEDDING_FAILED, "Failed to decode embeddings response")
                .with_details(e.to_string())
        })?;
        if v.embedding.is_empty() {
            return Err(AppError::new(codes::EMBEDDING_FAILED, "Embeddings response was empty"));
        }
        Ok(v.embedding)
    }
}
