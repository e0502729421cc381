use serde::{Deserialize, Serialize};
use std::fmt;

/// Single structured error shape used across pipeline layers and rendered by the surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

/// Error codes shared between the pipeline crates.
pub mod codes {
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
    pub const EXTRACTION_FAILED: &str = "EXTRACTION_FAILED";
    pub const EMBEDDING_FAILED: &str = "EMBEDDING_FAILED";
    pub const INDEX_BUILD_FAILED: &str = "INDEX_BUILD_FAILED";
    pub const INDEX_PERSIST_FAILED: &str = "INDEX_PERSIST_FAILED";
    pub const INDEX_CORRUPT: &str = "INDEX_CORRUPT";
    pub const INDEX_NOT_FOUND: &str = "INDEX_NOT_FOUND";
    pub const INDEX_MODEL_MISMATCH: &str = "INDEX_MODEL_MISMATCH";
    pub const RETRIEVAL_FAILED: &str = "RETRIEVAL_FAILED";
    pub const GENERATION_FAILED: &str = "GENERATION_FAILED";
    pub const AI_REMOTE_NOT_ALLOWED: &str = "AI_REMOTE_NOT_ALLOWED";
    pub const AI_UNREACHABLE: &str = "AI_UNREACHABLE";
}

/// Coarse classification of an [`AppError`] code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Extraction,
    Embedding,
    Persistence,
    NotFound,
    Generation,
    Retrieval,
    Other,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self.code.as_str() {
            codes::CONFIG_INVALID | codes::AI_REMOTE_NOT_ALLOWED => ErrorKind::Config,
            codes::EXTRACTION_FAILED => ErrorKind::Extraction,
            codes::EMBEDDING_FAILED | codes::AI_UNREACHABLE => ErrorKind::Embedding,
            codes::INDEX_PERSIST_FAILED | codes::INDEX_CORRUPT => ErrorKind::Persistence,
            codes::INDEX_NOT_FOUND => ErrorKind::NotFound,
            codes::GENERATION_FAILED => ErrorKind::Generation,
            codes::RETRIEVAL_FAILED | codes::INDEX_MODEL_MISMATCH => ErrorKind::Retrieval,
            _ => ErrorKind::Other,
        }
    }

    /// `[CODE] message; details`, for nesting one error inside another's details.
    pub fn describe(&self) -> String {
        match self.details.as_deref() {
            Some(d) if !d.is_empty() => format!("{self}; {d}"),
            _ => self.to_string(),
        }
    }

    /// Human-readable line for the user-facing surface.
    pub fn render(&self) -> String {
        match self.details.as_deref() {
            Some(d) if !d.is_empty() => format!("error[{}]: {} ({d})", self.code, self.message),
            _ => format!("error[{}]: {}", self.code, self.message),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
