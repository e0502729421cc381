use dqa_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embeddings::Embedder;
use crate::retry::RetryPolicy;
use crate::store::{ScoredChunk, VectorStore};

pub const MAX_TOP_K: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveInput {
    pub artifact: String,
    /// Must match the model the artifact was built with.
    pub model: String,
    pub query: String,
    pub top_k: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub hits: Vec<ScoredChunk>,
}

impl QueryResult {
    pub fn texts(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.text.as_str()).collect()
    }
}

pub fn retrieve(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    retry: &RetryPolicy,
    input: &RetrieveInput,
) -> Result<QueryResult, AppError> {
    let q = input.query.trim();
    if q.is_empty() {
        return Err(AppError::new(codes::RETRIEVAL_FAILED, "Query must not be empty"));
    }
    let top_k = input.top_k.clamp(1, MAX_TOP_K);

    let index = store.load(&input.artifact)?;
    if index.manifest.model != input.model {
        return Err(AppError::new(
            codes::INDEX_MODEL_MISMATCH,
            "Index was built with a different embedding model; rebuild it",
        )
        .with_details(format!(
            "index_model={}; query_model={}",
            index.manifest.model, input.model
        )));
    }

    let qv = retry
        .run("embed query", || embedder.embed(&input.model, q))
        .map_err(|e| {
            AppError::new(codes::EMBEDDING_FAILED, "Failed to embed query")
                .with_details(e.describe())
                .with_retryable(e.retryable)
        })?;

    let hits = index.similarity_search(&qv, top_k as usize)?;
    debug!(scores = ?hits.iter().map(|h| h.score).collect::<Vec<_>>(), "retrieval scores");
    info!(artifact = %input.artifact, hits = hits.len(), "retrieved context");
    Ok(QueryResult { hits })
}
