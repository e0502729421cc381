use std::time::Duration;

use dqa_core::error::{codes, AppError};
use serde::Deserialize;
use serde_json::json;

use super::Embedder;
use crate::gemini::{model_path, GeminiClient};
use crate::http::post_json;

#[derive(Debug, Clone)]
pub struct GeminiEmbedder {
    client: GeminiClient,
    timeout: Duration,
}

impl GeminiEmbedder {
    pub fn new(client: GeminiClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl Embedder for GeminiEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let url = self.client.model_url(model, "embedContent");
        let body = json!({
            "model": model_path(model),
            "content": { "parts": [{ "text": input }] },
        });
        let raw = post_json(
            &url,
            &[self.client.auth_header()],
            &body,
            self.timeout,
            codes::EMBEDDING_FAILED,
            "embeddings",
        )?;
        let v: EmbedContentResponse = serde_json::from_value(raw).map_err(|e| {
            AppError::new(codes::EMBEDDING_FAILED, "Failed to decode embeddings response")
                .with_details(e.to_string())
        })?;
        if v.embedding.values.is_empty() {
            return Err(AppError::new(codes::EMBEDDING_FAILED, "Embeddings response was empty"));
        }
        Ok(v.embedding.values)
    }
}
