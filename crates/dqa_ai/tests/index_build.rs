use std::sync::atomic::{AtomicUsize, Ordering};

use dqa_ai::embeddings::Embedder;
use dqa_ai::index::{build_index, index_status, IndexBuildInput};
use dqa_ai::retrieve::{retrieve, RetrieveInput};
use dqa_ai::retry::RetryPolicy;
use dqa_ai::store::{FsVectorStore, VectorStore};
use dqa_core::chunk::{chunk_text, ChunkConfig, TextChunk};
use dqa_core::error::{codes, AppError};
use pretty_assertions::assert_eq;

struct CountingEmbedder {
    calls: AtomicUsize,
}

impl CountingEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Deterministic embedding: [len, first_byte, last_byte]
        let bytes = input.as_bytes();
        let first = bytes.first().copied().unwrap_or(0) as f32;
        let last = bytes.last().copied().unwrap_or(0) as f32;
        Ok(vec![bytes.len() as f32, first, last])
    }
}

/// Fails on the n-th call (1-based), with a fatal error.
struct FailingEmbedder {
    fail_on: usize,
    calls: AtomicUsize,
}

impl Embedder for FailingEmbedder {
    fn embed(&self, _model: &str, _input: &str) -> Result<Vec<f32>, AppError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on {
            return Err(AppError::new(codes::EMBEDDING_FAILED, "quota exceeded"));
        }
        Ok(vec![1.0, 0.0, 0.0])
    }
}

/// Transient failure on the first attempt of every chunk.
struct FlakyEmbedder {
    calls: AtomicUsize,
}

impl Embedder for FlakyEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n % 2 == 0 {
            return Err(AppError::new(codes::EMBEDDING_FAILED, "connection reset").with_retryable(true));
        }
        Ok(vec![input.len() as f32, 1.0])
    }
}

struct ShiftingDimsEmbedder {
    calls: AtomicUsize,
}

impl Embedder for ShiftingDimsEmbedder {
    fn embed(&self, _model: &str, _input: &str) -> Result<Vec<f32>, AppError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![1.0; 2 + n])
    }
}

fn no_wait() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        backoff: std::time::Duration::ZERO,
    }
}

fn input() -> IndexBuildInput {
    IndexBuildInput {
        artifact: "faiss_index".to_string(),
        model: "mock".to_string(),
        chunking: ChunkConfig::default(),
    }
}

fn chunks_of(text: &str) -> Vec<TextChunk> {
    chunk_text(text, &ChunkConfig::default()).expect("chunk").collect()
}

#[test]
fn builds_and_reports_status() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsVectorStore::open(dir.path().to_path_buf());
    let embedder = CountingEmbedder::new();

    let before = index_status(&store, "faiss_index").expect("status");
    assert!(!before.ready);

    let text = "a".repeat(2500);
    let st = build_index(chunks_of(&text), &embedder, &store, &no_wait(), &input()).expect("build");
    assert!(st.ready);
    assert_eq!(st.chunk_count, 3);
    assert_eq!(st.dims, Some(3));
    assert_eq!(st.model.as_deref(), Some("mock"));
    assert_eq!(embedder.call_count(), 3);

    let after = index_status(&store, "faiss_index").expect("status");
    assert!(after.ready);
    assert_eq!(after.content_sha256, st.content_sha256);

    let loaded = store.load("faiss_index").expect("load");
    let ordinals: Vec<u32> = loaded.entries.iter().map(|e| e.ordinal).collect();
    assert_eq!(ordinals, vec![0, 1, 2]);
    assert_eq!(loaded.manifest.chunk_size, 1000);
    assert_eq!(loaded.manifest.chunk_overlap, 200);
}

#[test]
fn rebuilding_the_same_documents_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsVectorStore::open(dir.path().to_path_buf());
    let embedder = CountingEmbedder::new();
    let text = format!("{}{}", "b".repeat(1500), "cd".repeat(600));

    let query = RetrieveInput {
        artifact: "faiss_index".to_string(),
        model: "mock".to_string(),
        query: "bbbb".to_string(),
        top_k: 4,
    };

    let first = build_index(chunks_of(&text), &embedder, &store, &no_wait(), &input()).expect("build 1");
    let hits_1 = retrieve(&store, &embedder, &no_wait(), &query).expect("query 1");
    let second = build_index(chunks_of(&text), &embedder, &store, &no_wait(), &input()).expect("build 2");
    let hits_2 = retrieve(&store, &embedder, &no_wait(), &query).expect("query 2");

    assert_eq!(first.content_sha256, second.content_sha256);
    assert_eq!(hits_1.texts(), hits_2.texts());
}

#[test]
fn failed_build_keeps_previous_artifact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsVectorStore::open(dir.path().to_path_buf());

    let old = build_index(chunks_of("first corpus"), &CountingEmbedder::new(), &store, &no_wait(), &input())
        .expect("build");

    let failing = FailingEmbedder {
        fail_on: 2,
        calls: AtomicUsize::new(0),
    };
    let err = build_index(chunks_of(&"z".repeat(3000)), &failing, &store, &no_wait(), &input())
        .expect_err("embedding fails");
    assert_eq!(err.code, codes::EMBEDDING_FAILED);
    assert!(err.details.unwrap_or_default().contains("ordinal=1"));
    // Fatal errors are not retried.
    assert_eq!(failing.calls.load(Ordering::SeqCst), 2);

    let loaded = store.load("faiss_index").expect("old index still readable");
    assert_eq!(loaded.entries.len(), 1);
    assert_eq!(loaded.entries[0].text, "first corpus");
    assert_eq!(Some(loaded.manifest.content_sha256), old.content_sha256);
}

/// Every embedding carries a NaN component.
struct NanEmbedder;

impl Embedder for NanEmbedder {
    fn embed(&self, _model: &str, _input: &str) -> Result<Vec<f32>, AppError> {
        Ok(vec![f32::NAN, 0.5])
    }
}

#[test]
fn non_finite_embeddings_fail_the_build_and_keep_previous_artifact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsVectorStore::open(dir.path().to_path_buf());

    let good = build_index(chunks_of("good"), &CountingEmbedder::new(), &store, &no_wait(), &input())
        .expect("build");

    let err = build_index(chunks_of("bad"), &NanEmbedder, &store, &no_wait(), &input())
        .expect_err("nan rejected");
    assert_eq!(err.code, codes::EMBEDDING_FAILED);
    assert!(err.details.unwrap_or_default().contains("ordinal=0"));

    let loaded = store.load("faiss_index").expect("old index still readable");
    assert_eq!(loaded.entries[0].text, "good");
    assert_eq!(Some(loaded.manifest.content_sha256), good.content_sha256);
}

#[test]
fn store_refuses_an_index_with_non_finite_vectors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsVectorStore::open(dir.path().to_path_buf());
    build_index(chunks_of("good"), &CountingEmbedder::new(), &store, &no_wait(), &input()).expect("build");

    let mut index = store.load("faiss_index").expect("load");
    index.entries[0].vector[1] = f32::INFINITY;
    let err = store.persist("faiss_index", &index).expect_err("refused");
    assert_eq!(err.code, codes::INDEX_CORRUPT);

    let loaded = store.load("faiss_index").expect("still readable");
    assert!(loaded.entries[0].vector.iter().all(|x| x.is_finite()));
}

#[test]
fn transient_embedding_errors_are_retried() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsVectorStore::open(dir.path().to_path_buf());
    let flaky = FlakyEmbedder {
        calls: AtomicUsize::new(0),
    };
    let st = build_index(chunks_of(&"q".repeat(1800)), &flaky, &store, &no_wait(), &input()).expect("build");
    assert_eq!(st.chunk_count, 2);
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 4);
}

#[test]
fn rejects_inconsistent_dims_and_empty_corpus() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsVectorStore::open(dir.path().to_path_buf());

    let shifting = ShiftingDimsEmbedder {
        calls: AtomicUsize::new(0),
    };
    let err = build_index(chunks_of(&"m".repeat(2000)), &shifting, &store, &no_wait(), &input())
        .expect_err("dims differ");
    assert_eq!(err.code, codes::INDEX_BUILD_FAILED);

    let err = build_index(chunks_of(""), &CountingEmbedder::new(), &store, &no_wait(), &input())
        .expect_err("empty");
    assert_eq!(err.code, codes::INDEX_BUILD_FAILED);

    assert_eq!(store.load("faiss_index").expect_err("nothing persisted").code, codes::INDEX_NOT_FOUND);
}
