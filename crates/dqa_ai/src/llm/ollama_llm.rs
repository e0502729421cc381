use std::time::Duration;

use dqa_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};

use super::{Generation, Generator};
use crate::http::post_json;
use crate::ollama::OllamaClient;

#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
    timeout: Duration,
}

impl OllamaGenerator {
    pub fn new(client: OllamaClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl Generator for OllamaGenerator {
    fn generate(&self, model: &str, prompt: &str, temperature: f32) -> Result<Generation, AppError> {
        let url = self.client.endpoint("/api/generate");
        let req = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature },
        };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new(codes::GENERATION_FAILED, "Failed to encode generate request")
                .with_details(e.to_string())
        })?;

        let raw = post_json(&url, &[], &body, self.timeout, codes::GENERATION_FAILED, "generate")?;
        let v: GenerateResponse = serde_json::from_value(raw.clone()).map_err(|e| {
            AppError::new(codes::GENERATION_FAILED, "Failed to decode generate response")
                .with_details(e.to_string())
        })?;
        if v.response.trim().is_empty() {
            return Err(AppError::new(codes::GENERATION_FAILED, "Model response was empty"));
        }
        Ok(Generation {
            text: v.response,
            raw,
        })
    }
}
