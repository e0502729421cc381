use dqa_core::error::{codes, AppError};
use dqa_core::timestamps::is_rfc3339;
use serde::{Deserialize, Serialize};

pub mod fs;
pub mod similarity;

pub use fs::FsVectorStore;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexManifest {
    pub format_version: u32,
    pub artifact: String,
    /// Embedding model identifier; queries must use the same one.
    pub model: String,
    pub dims: u32,
    pub metric: String,
    pub chunk_count: u32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// sha256 over the ordered chunk digests.
    pub content_sha256: String,
    pub built_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub ordinal: u32,
    pub text: String,
    pub text_sha256: String,
    pub vector: Vec<f32>,
}

/// Loaded artifact: chunk texts, their vectors, and the manifest they were built under.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    pub manifest: IndexManifest,
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub ordinal: u32,
    pub score: f32,
    pub text: String,
}

impl VectorIndex {
    /// Structural checks applied both before persisting and after loading.
    pub fn validate(&self) -> Result<(), AppError> {
        let m = &self.manifest;
        if m.format_version != FORMAT_VERSION {
            return Err(AppError::new(codes::INDEX_CORRUPT, "Unsupported index format version")
                .with_details(format!("found={}; supported={FORMAT_VERSION}", m.format_version)));
        }
        if m.chunk_count as usize != self.entries.len() {
            return Err(AppError::new(codes::INDEX_CORRUPT, "Index entry count does not match manifest")
                .with_details(format!("manifest={}; entries={}", m.chunk_count, self.entries.len())));
        }
        if !is_rfc3339(&m.built_at) {
            return Err(AppError::new(codes::INDEX_CORRUPT, "Index manifest has an invalid build time")
                .with_details(format!("built_at={}", m.built_at)));
        }
        for e in &self.entries {
            if e.vector.len() as u32 != m.dims {
                return Err(AppError::new(codes::INDEX_CORRUPT, "Index vector dims mismatch")
                    .with_details(format!("ordinal={}; expected={}; got={}", e.ordinal, m.dims, e.vector.len())));
            }
            if e.vector.iter().any(|x| !x.is_finite()) {
                return Err(AppError::new(codes::INDEX_CORRUPT, "Index vector has non-finite values")
                    .with_details(format!("ordinal={}", e.ordinal)));
            }
        }
        Ok(())
    }

    /// Top-`k` entries by cosine similarity; ties go to the lower ordinal.
    pub fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, AppError> {
        let dims = self.manifest.dims;
        if query.len() as u32 != dims {
            return Err(AppError::new(
                codes::INDEX_MODEL_MISMATCH,
                "Query embedding dims do not match index dims",
            )
            .with_details(format!("index_dims={dims}; query_dims={}", query.len())));
        }

        if query.iter().any(|x| !x.is_finite()) {
            return Err(AppError::new(codes::RETRIEVAL_FAILED, "Query embedding has non-finite values"));
        }
        let qnorm = similarity::l2_norm(query);
        if qnorm == 0.0 {
            return Err(AppError::new(codes::RETRIEVAL_FAILED, "Query embedding norm is zero"));
        }

        let mut hits: Vec<(usize, f32)> = Vec::with_capacity(self.entries.len());
        for (i, e) in self.entries.iter().enumerate() {
            let vnorm = similarity::l2_norm(&e.vector);
            if vnorm == 0.0 {
                continue;
            }
            hits.push((i, similarity::cosine_similarity(query, &e.vector, qnorm, vnorm)));
        }

        hits.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then(self.entries[a.0].ordinal.cmp(&self.entries[b.0].ordinal))
        });
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                ordinal: self.entries[i].ordinal,
                score,
                text: self.entries[i].text.clone(),
            })
            .collect())
    }
}

/// Persistence capability for vector indexes, keyed by artifact name.
pub trait VectorStore: Send + Sync {
    /// Replace the named artifact wholesale. Readers see either the old or the new index.
    fn persist(&self, name: &str, index: &VectorIndex) -> Result<(), AppError>;

    /// Fails with `INDEX_NOT_FOUND` when nothing was ever persisted under `name`.
    fn load(&self, name: &str) -> Result<VectorIndex, AppError>;

    fn manifest(&self, name: &str) -> Result<IndexManifest, AppError> {
        Ok(self.load(name)?.manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(vectors: Vec<Vec<f32>>) -> VectorIndex {
        let dims = vectors.first().map(|v| v.len()).unwrap_or(0) as u32;
        let entries: Vec<IndexEntry> = vectors
            .into_iter()
            .enumerate()
            .map(|(i, vector)| IndexEntry {
                ordinal: i as u32,
                text: format!("chunk {i}"),
                text_sha256: String::new(),
                vector,
            })
            .collect();
        VectorIndex {
            manifest: IndexManifest {
                format_version: FORMAT_VERSION,
                artifact: "t".to_string(),
                model: "mock".to_string(),
                dims,
                metric: "cosine".to_string(),
                chunk_count: entries.len() as u32,
                chunk_size: 1000,
                chunk_overlap: 200,
                content_sha256: String::new(),
                built_at: "2026-01-01T00:00:00Z".to_string(),
            },
            entries,
        }
    }

    #[test]
    fn ranks_by_score_then_ordinal() {
        let idx = index(vec![
            vec![0.0, 1.0],
            vec![1.0, 1.0],
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![0.0, 0.0],
        ]);
        let hits = idx.similarity_search(&[1.0, 0.0], 3).expect("search");
        let ordinals: Vec<u32> = hits.iter().map(|h| h.ordinal).collect();
        assert_eq!(ordinals, vec![2, 3, 1]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_dimension_mismatch_and_zero_query() {
        let idx = index(vec![vec![1.0, 0.0]]);
        assert_eq!(
            idx.similarity_search(&[1.0, 0.0, 0.0], 1).expect_err("dims").code,
            codes::INDEX_MODEL_MISMATCH
        );
        assert_eq!(
            idx.similarity_search(&[0.0, 0.0], 1).expect_err("zero").code,
            codes::RETRIEVAL_FAILED
        );
        assert_eq!(
            idx.similarity_search(&[f32::NAN, 1.0], 1).expect_err("nan").code,
            codes::RETRIEVAL_FAILED
        );
    }

    #[test]
    fn validate_catches_inconsistent_artifacts() {
        let mut idx = index(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        idx.validate().expect("valid");
        idx.entries[1].vector.push(3.0);
        assert_eq!(idx.validate().expect_err("dims").code, codes::INDEX_CORRUPT);
        idx.entries.pop();
        assert_eq!(idx.validate().expect_err("count").code, codes::INDEX_CORRUPT);

        let mut idx = index(vec![vec![1.0, 0.0], vec![f32::NAN, 1.0]]);
        assert_eq!(idx.validate().expect_err("nan").code, codes::INDEX_CORRUPT);
        idx.entries[1].vector[0] = f32::INFINITY;
        assert_eq!(idx.validate().expect_err("inf").code, codes::INDEX_CORRUPT);

        let mut idx = index(vec![vec![1.0, 0.0]]);
        idx.manifest.built_at = "last tuesday".to_string();
        assert_eq!(idx.validate().expect_err("time").code, codes::INDEX_CORRUPT);
    }
}
