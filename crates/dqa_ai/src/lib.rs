pub mod answer;
pub mod embeddings;
pub mod gemini;
mod http;
pub mod index;
pub mod llm;
pub mod ollama;
pub mod providers;
pub mod retrieve;
pub mod retry;
pub mod session;
pub mod store;

#[cfg(test)]
mod tests {
    use super::store::{FsVectorStore, VectorStore};
    use dqa_core::error::codes;

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsVectorStore::open(dir.path().to_path_buf());
        let err = store.load("faiss_index").expect_err("absent");
        assert_eq!(err.code, codes::INDEX_NOT_FOUND);
        let err = store.manifest("faiss_index").expect_err("absent");
        assert_eq!(err.code, codes::INDEX_NOT_FOUND);
    }

    #[test]
    fn artifact_names_are_validated_before_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsVectorStore::open(dir.path().to_path_buf());
        let err = store.load("../outside").expect_err("bad name");
        assert_eq!(err.code, codes::CONFIG_INVALID);
    }
}
