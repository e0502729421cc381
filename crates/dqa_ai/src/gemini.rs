use dqa_core::error::{codes, AppError};

use crate::ollama::is_loopback_base_url;

/// Connection details for the hosted Gemini API.
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("https://") || is_loopback_base_url(&base_url)) {
            return Err(AppError::new(
                codes::CONFIG_INVALID,
                "Gemini base URL must use https",
            )
            .with_details(format!("base_url={base_url}")));
        }
        if api_key.trim().is_empty() {
            return Err(AppError::new(codes::CONFIG_INVALID, "Gemini API key is empty"));
        }
        Ok(Self {
            base_url,
            api_key: api_key.trim().to_string(),
        })
    }

    /// `models/embedding-001` and `embedding-001` both resolve to the same endpoint.
    pub(crate) fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/{}:{method}", self.base_url, model_path(model))
    }

    pub(crate) fn auth_header(&self) -> (&'static str, &str) {
        ("x-goog-api-key", self.api_key.as_str())
    }
}

pub(crate) fn model_path(model: &str) -> String {
    let m = model.trim().trim_start_matches('/');
    if m.starts_with("models/") {
        m.to_string()
    } else {
        format!("models/{m}")
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
