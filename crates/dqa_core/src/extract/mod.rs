use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{codes, AppError};

/// An uploaded document. Discarded once its text has been extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    PlainText,
}

impl DocumentFormat {
    /// PDF magic wins over the name; otherwise the extension decides.
    pub fn detect(doc: &Document) -> Option<Self> {
        if doc.bytes.starts_with(b"%PDF-") {
            return Some(Self::Pdf);
        }
        let ext = doc
            .name
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "md" | "markdown" | "text" => Some(Self::PlainText),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractLimits {
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,
}

fn default_max_documents() -> usize {
    64
}

fn default_max_document_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_documents: default_max_documents(),
            max_document_bytes: default_max_document_bytes(),
        }
    }
}

pub trait DocumentParser {
    /// Text of every page, in page order.
    fn pages(&self, bytes: &[u8]) -> Result<Vec<String>, String>;
}

pub struct PdfParser;

impl DocumentParser for PdfParser {
    fn pages(&self, bytes: &[u8]) -> Result<Vec<String>, String> {
        // pdf-extract panics on some malformed inputs instead of returning an error.
        let text = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)))
            .map_err(|_| "PDF parser aborted on malformed input".to_string())?
            .map_err(|e| e.to_string())?;
        // pdf-extract separates pages with form feeds.
        Ok(text.split('\x0C').map(|p| p.to_string()).collect())
    }
}

pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn pages(&self, bytes: &[u8]) -> Result<Vec<String>, String> {
        let text = std::str::from_utf8(bytes).map_err(|e| format!("not valid UTF-8: {e}"))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Ok(vec![text.replace("\r\n", "\n")])
    }
}

fn parser_for(format: DocumentFormat) -> &'static dyn DocumentParser {
    match format {
        DocumentFormat::Pdf => &PdfParser,
        DocumentFormat::PlainText => &PlainTextParser,
    }
}

/// Concatenate the text of every page of every document, in input order, with no separator.
///
/// The batch is aborted on the first unreadable document: a partial corpus would
/// silently produce a partial index.
pub fn extract_text(docs: &[Document], limits: &ExtractLimits) -> Result<String, AppError> {
    if docs.is_empty() {
        return Err(AppError::new(codes::EXTRACTION_FAILED, "No documents supplied"));
    }
    if docs.len() > limits.max_documents {
        return Err(AppError::new(codes::EXTRACTION_FAILED, "Too many documents")
            .with_details(format!("count={}; max={}", docs.len(), limits.max_documents)));
    }

    let mut out = String::new();
    for doc in docs {
        if doc.bytes.len() > limits.max_document_bytes {
            return Err(AppError::new(codes::EXTRACTION_FAILED, "Document exceeds size limit")
                .with_details(format!(
                    "name={}; bytes={}; max={}",
                    doc.name,
                    doc.bytes.len(),
                    limits.max_document_bytes
                )));
        }
        let format = DocumentFormat::detect(doc).ok_or_else(|| {
            AppError::new(codes::EXTRACTION_FAILED, "Unsupported document format")
                .with_details(format!("name={}", doc.name))
        })?;
        let pages = parser_for(format).pages(&doc.bytes).map_err(|e| {
            AppError::new(codes::EXTRACTION_FAILED, "Failed to read document")
                .with_details(format!("name={}; err={e}", doc.name))
        })?;
        debug!(name = %doc.name, ?format, pages = pages.len(), "extracted document");
        for p in pages {
            out.push_str(&p);
        }
    }

    info!(documents = docs.len(), chars = out.chars().count(), "extraction finished");
    Ok(out)
}
