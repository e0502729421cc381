use std::time::Duration;

use dqa_core::config::{PipelineConfig, Provider};
use dqa_core::error::{codes, AppError};

use crate::embeddings::{Embedder, GeminiEmbedder, OllamaEmbedder};
use crate::gemini::GeminiClient;
use crate::llm::{GeminiGenerator, Generator, OllamaGenerator};
use crate::ollama::OllamaClient;

fn gemini_client(cfg: &PipelineConfig) -> Result<GeminiClient, AppError> {
    let key = cfg.gemini.api_key.as_deref().ok_or_else(|| {
        AppError::new(codes::CONFIG_INVALID, "Gemini provider selected but no API key configured")
            .with_details("set GOOGLE_API_KEY")
    })?;
    GeminiClient::new(&cfg.gemini.base_url, key)
}

pub fn embedder_from_config(cfg: &PipelineConfig) -> Result<Box<dyn Embedder>, AppError> {
    let timeout = Duration::from_secs(cfg.http.embed_timeout_secs);
    Ok(match cfg.embedding.provider {
        Provider::Ollama => Box::new(OllamaEmbedder::new(OllamaClient::new(&cfg.ollama.base_url)?, timeout)),
        Provider::Gemini => Box::new(GeminiEmbedder::new(gemini_client(cfg)?, timeout)),
    })
}

pub fn generator_from_config(cfg: &PipelineConfig) -> Result<Box<dyn Generator>, AppError> {
    let timeout = Duration::from_secs(cfg.http.generate_timeout_secs);
    Ok(match cfg.generation.provider {
        Provider::Ollama => Box::new(OllamaGenerator::new(OllamaClient::new(&cfg.ollama.base_url)?, timeout)),
        Provider::Gemini => Box::new(GeminiGenerator::new(gemini_client(cfg)?, timeout)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_requires_a_key() {
        let cfg = PipelineConfig::default();
        let err = embedder_from_config(&cfg).err().expect("no key");
        assert_eq!(err.code, codes::CONFIG_INVALID);
    }

    #[test]
    fn ollama_rejects_remote_hosts() {
        let mut cfg = PipelineConfig::default();
        cfg.generation.provider = Provider::Ollama;
        cfg.ollama.base_url = "http://10.0.0.5:11434".to_string();
        let err = generator_from_config(&cfg).err().expect("remote");
        assert_eq!(err.code, codes::AI_REMOTE_NOT_ALLOWED);

        cfg.ollama.base_url = "http://127.0.0.1:11434".to_string();
        assert!(generator_from_config(&cfg).is_ok());
    }
}
