//! Pipeline configuration.
//!
//! Loaded once by the surface (TOML file, then environment overrides) and passed explicitly to
//! every component that needs it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkConfig;
use crate::error::{codes, AppError};
use crate::extract::ExtractLimits;

pub const DEFAULT_ARTIFACT: &str = "faiss_index";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub chunking: ChunkConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub limits: ExtractLimits,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Ollama,
    Gemini,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

fn default_top_k() -> u32 {
    4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory holding artifacts.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default = "default_artifact")]
    pub artifact: String,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from(".docqa")
}

fn default_artifact() -> String {
    DEFAULT_ARTIFACT.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            artifact: default_artifact(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: Provider,
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

fn default_embedding_provider() -> Provider {
    Provider::Gemini
}

fn default_embedding_model() -> String {
    "models/embedding-001".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: Provider,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
}

fn default_generation_provider() -> Provider {
    Provider::Gemini
}

fn default_generation_model() -> String {
    "models/gemini-1.5-flash".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
}

fn default_ollama_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    /// Usually supplied through `GOOGLE_API_KEY` rather than the file.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpConfig {
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,
    #[serde(default = "default_generate_timeout_secs")]
    pub generate_timeout_secs: u64,
}

fn default_embed_timeout_secs() -> u64 {
    10
}

fn default_generate_timeout_secs() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            embed_timeout_secs: default_embed_timeout_secs(),
            generate_timeout_secs: default_generate_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    250
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document. Missing sections fall back to defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, AppError> {
        toml::from_str(raw).map_err(|e| {
            AppError::new(codes::CONFIG_INVALID, "Failed to parse configuration")
                .with_details(e.to_string())
        })
    }

    /// Read the config file if it exists, otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new(codes::CONFIG_INVALID, "Failed to read configuration file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Overlay environment variables: `GOOGLE_API_KEY`, `DOCQA_STORAGE_ROOT`,
    /// `DOCQA_ARTIFACT`, `OLLAMA_BASE_URL`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty("GOOGLE_API_KEY") {
            self.gemini.api_key = Some(v);
        }
        if let Some(v) = non_empty("DOCQA_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(v);
        }
        if let Some(v) = non_empty("DOCQA_ARTIFACT") {
            self.storage.artifact = v;
        }
        if let Some(v) = non_empty("OLLAMA_BASE_URL") {
            self.ollama.base_url = v;
        }
    }

    /// Full check, including credentials for the selected providers.
    pub fn validate(&self) -> Result<(), AppError> {
        self.validate_local()?;
        let uses_gemini =
            self.embedding.provider == Provider::Gemini || self.generation.provider == Provider::Gemini;
        if uses_gemini && self.gemini.api_key.as_deref().unwrap_or("").trim().is_empty() {
            return Err(AppError::new(
                codes::CONFIG_INVALID,
                "Gemini provider selected but no API key configured",
            )
            .with_details("set GOOGLE_API_KEY"));
        }
        Ok(())
    }

    /// Everything that does not need a provider: enough for reading the index on disk.
    pub fn validate_local(&self) -> Result<(), AppError> {
        self.chunking.validate()?;
        validate_artifact_name(&self.storage.artifact)?;
        if self.retrieval.top_k == 0 {
            return Err(AppError::new(codes::CONFIG_INVALID, "top_k must be positive"));
        }
        if self.embedding.model.trim().is_empty() || self.generation.model.trim().is_empty() {
            return Err(AppError::new(codes::CONFIG_INVALID, "Model identifiers must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(AppError::new(codes::CONFIG_INVALID, "Temperature must be within 0..=2")
                .with_details(format!("temperature={}", self.generation.temperature)));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::new(codes::CONFIG_INVALID, "retry.max_attempts must be at least 1"));
        }
        Ok(())
    }
}

/// Artifact names become directory names; keep them to a safe alphabet.
pub fn validate_artifact_name(name: &str) -> Result<(), AppError> {
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !ok {
        return Err(AppError::new(codes::CONFIG_INVALID, "Invalid artifact name")
            .with_details(format!("artifact={name}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_reference_pipeline() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.chunking.chunk_size, 1000);
        assert_eq!(cfg.chunking.chunk_overlap, 200);
        assert_eq!(cfg.retrieval.top_k, 4);
        assert_eq!(cfg.storage.artifact, "faiss_index");
        assert_eq!(cfg.embedding.model, "models/embedding-001");
        assert_eq!(cfg.generation.temperature, 0.0);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
[chunking]
chunk_size = 500

[embedding]
provider = "ollama"
model = "nomic-embed-text"
"#,
        )
        .expect("parse");
        assert_eq!(cfg.chunking.chunk_size, 500);
        assert_eq!(cfg.chunking.chunk_overlap, 200);
        assert_eq!(cfg.embedding.provider, Provider::Ollama);
        assert_eq!(cfg.generation.provider, Provider::Gemini);
    }

    #[test]
    fn env_overrides_and_validation() {
        let mut cfg = PipelineConfig::default();
        assert_eq!(cfg.validate().expect_err("no key").code, codes::CONFIG_INVALID);
        cfg.validate_local().expect("index can be inspected without a key");

        cfg.apply_env(|k| match k {
            "GOOGLE_API_KEY" => Some("secret".to_string()),
            "DOCQA_ARTIFACT" => Some("papers".to_string()),
            "OLLAMA_BASE_URL" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(cfg.gemini.api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.storage.artifact, "papers");
        assert_eq!(cfg.ollama.base_url, "http://127.0.0.1:11434");
        cfg.validate().expect("valid");
        assert!(!format!("{:?}", cfg.gemini).contains("secret"));
    }

    #[test]
    fn local_validation_still_checks_settings() {
        let mut cfg = PipelineConfig::default();
        cfg.storage.artifact = "../elsewhere".to_string();
        assert_eq!(cfg.validate_local().expect_err("artifact").code, codes::CONFIG_INVALID);

        let mut cfg = PipelineConfig::default();
        cfg.retry.max_attempts = 0;
        assert_eq!(cfg.validate_local().expect_err("retry").code, codes::CONFIG_INVALID);
    }

    #[test]
    fn rejects_bad_artifact_names() {
        assert!(validate_artifact_name("faiss_index").is_ok());
        assert!(validate_artifact_name("v1.2-docs").is_ok());
        assert!(validate_artifact_name("").is_err());
        assert!(validate_artifact_name("../etc").is_err());
        assert!(validate_artifact_name(".hidden").is_err());
        assert!(validate_artifact_name("a/b").is_err());
    }

    #[test]
    fn example_config_parses_to_defaults() {
        let cfg = PipelineConfig::from_toml_str(include_str!("../../../../docqa.example.toml")).expect("parse");
        assert_eq!(cfg, PipelineConfig::default());
    }
}
