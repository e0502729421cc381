use dqa_core::chunk::{ChunkConfig, TextChunk};
use dqa_core::digest::sha256_hex;
use dqa_core::error::{codes, AppError};
use dqa_core::timestamps::now_rfc3339_utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embeddings::Embedder;
use crate::retry::RetryPolicy;
use crate::store::{IndexEntry, IndexManifest, VectorIndex, VectorStore, FORMAT_VERSION};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub ready: bool,
    pub artifact: String,
    pub model: Option<String>,
    pub dims: Option<u32>,
    pub chunk_count: u32,
    #[serde(default)]
    pub content_sha256: Option<String>,
    pub built_at: Option<String>,
}

impl IndexStatus {
    fn not_ready(artifact: &str) -> Self {
        Self {
            ready: false,
            artifact: artifact.to_string(),
            model: None,
            dims: None,
            chunk_count: 0,
            content_sha256: None,
            built_at: None,
        }
    }

    fn from_manifest(m: &IndexManifest) -> Self {
        Self {
            ready: true,
            artifact: m.artifact.clone(),
            model: Some(m.model.clone()),
            dims: Some(m.dims),
            chunk_count: m.chunk_count,
            content_sha256: Some(m.content_sha256.clone()),
            built_at: Some(m.built_at.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexBuildInput {
    pub artifact: String,
    pub model: String,
    pub chunking: ChunkConfig,
}

pub fn index_status(store: &dyn VectorStore, artifact: &str) -> Result<IndexStatus, AppError> {
    match store.manifest(artifact) {
        Ok(m) => Ok(IndexStatus::from_manifest(&m)),
        Err(e) if e.code == codes::INDEX_NOT_FOUND => Ok(IndexStatus::not_ready(artifact)),
        Err(e) => Err(e),
    }
}

/// Embed every chunk and replace the named artifact with the result.
///
/// Nothing is written unless every chunk embeds successfully with a consistent dimensionality.
pub fn build_index<I>(
    chunks: I,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    retry: &RetryPolicy,
    input: &IndexBuildInput,
) -> Result<IndexStatus, AppError>
where
    I: IntoIterator<Item = TextChunk>,
{
    let mut entries: Vec<IndexEntry> = Vec::new();
    let mut dims: Option<u32> = None;

    for chunk in chunks {
        let v = retry
            .run("embed chunk", || embedder.embed(&input.model, &chunk.text))
            .map_err(|e| {
                AppError::new(codes::EMBEDDING_FAILED, "Failed to compute embeddings")
                    .with_details(format!("ordinal={}; err={}", chunk.ordinal, e.describe()))
                    .with_retryable(e.retryable)
            })?;

        if let Some(pos) = v.iter().position(|x| !x.is_finite()) {
            return Err(AppError::new(codes::EMBEDDING_FAILED, "Embedding contains non-finite values")
                .with_details(format!("ordinal={}; position={pos}; value={}", chunk.ordinal, v[pos])));
        }

        let this_dims = v.len() as u32;
        match dims {
            Some(d) if d != this_dims => {
                return Err(AppError::new(
                    codes::INDEX_BUILD_FAILED,
                    "Embedding dimension mismatch across chunks",
                )
                .with_details(format!("expected={d}; got={this_dims}; ordinal={}", chunk.ordinal)));
            }
            Some(_) => {}
            None => dims = Some(this_dims),
        }
        debug!(ordinal = chunk.ordinal, chars = chunk.text.len(), "embedded chunk");

        entries.push(IndexEntry {
            ordinal: chunk.ordinal,
            text_sha256: sha256_hex(chunk.text.as_bytes()),
            text: chunk.text,
            vector: v,
        });
    }

    let Some(dims) = dims else {
        return Err(AppError::new(
            codes::INDEX_BUILD_FAILED,
            "Document set produced no text to index",
        ));
    };

    let digests = entries
        .iter()
        .map(|e| e.text_sha256.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let manifest = IndexManifest {
        format_version: FORMAT_VERSION,
        artifact: input.artifact.clone(),
        model: input.model.clone(),
        dims,
        metric: "cosine".to_string(),
        chunk_count: entries.len() as u32,
        chunk_size: input.chunking.chunk_size,
        chunk_overlap: input.chunking.chunk_overlap,
        content_sha256: sha256_hex(digests.as_bytes()),
        built_at: now_rfc3339_utc()?,
    };
    let index = VectorIndex { manifest, entries };

    store.persist(&input.artifact, &index)?;
    info!(
        artifact = %input.artifact,
        model = %input.model,
        dims,
        chunks = index.entries.len(),
        "index built"
    );
    Ok(IndexStatus::from_manifest(&index.manifest))
}
