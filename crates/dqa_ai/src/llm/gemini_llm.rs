use std::time::Duration;

use dqa_core::error::{codes, AppError};
use serde::Deserialize;
use serde_json::json;

use super::{Generation, Generator};
use crate::gemini::GeminiClient;
use crate::http::post_json;

#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: GeminiClient,
    timeout: Duration,
}

impl GeminiGenerator {
    pub fn new(client: GeminiClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Text of the first candidate, parts joined in order.
fn candidate_text(resp: &GenerateContentResponse) -> Result<String, AppError> {
    let cand = resp.candidates.first().ok_or_else(|| {
        AppError::new(codes::GENERATION_FAILED, "Model returned no candidates")
    })?;
    let text = cand
        .content
        .as_ref()
        .map(|c| {
            c.parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AppError::new(codes::GENERATION_FAILED, "Model response was empty")
            .with_details(format!(
                "finish_reason={}",
                cand.finish_reason.as_deref().unwrap_or("unknown")
            )));
    }
    Ok(text)
}

impl Generator for GeminiGenerator {
    fn generate(&self, model: &str, prompt: &str, temperature: f32) -> Result<Generation, AppError> {
        let url = self.client.model_url(model, "generateContent");
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": temperature },
        });
        let raw = post_json(
            &url,
            &[self.client.auth_header()],
            &body,
            self.timeout,
            codes::GENERATION_FAILED,
            "generate",
        )?;
        let resp: GenerateContentResponse = serde_json::from_value(raw.clone()).map_err(|e| {
            AppError::new(codes::GENERATION_FAILED, "Failed to decode generate response")
                .with_details(e.to_string())
        })?;
        let text = candidate_text(&resp)?;
        Ok(Generation { text, raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(v: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(v).expect("decode")
    }

    #[test]
    fn joins_parts_of_first_candidate() {
        let resp = parse(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "Paris" }, { "text": " is the capital." }] }, "finishReason": "STOP" },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }));
        assert_eq!(candidate_text(&resp).expect("text"), "Paris is the capital.");
    }

    #[test]
    fn blocked_or_empty_output_is_a_generation_error() {
        let resp = parse(json!({ "candidates": [{ "finishReason": "SAFETY" }] }));
        let err = candidate_text(&resp).expect_err("empty");
        assert_eq!(err.code, codes::GENERATION_FAILED);
        assert!(err.details.unwrap_or_default().contains("SAFETY"));

        let resp = parse(json!({ "promptFeedback": { "blockReason": "OTHER" } }));
        assert_eq!(candidate_text(&resp).expect_err("none").code, codes::GENERATION_FAILED);
    }
}
