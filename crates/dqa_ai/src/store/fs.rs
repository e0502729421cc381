//! Directory-backed artifact store.
//!
//! Layout under `<root>/<artifact>/`:
//!
//! ```text
//! CURRENT              one line: the live generation id
//! gen-<id>/manifest.json
//! gen-<id>/entries.json
//! ```
//!
//! A build stages a complete generation in `.staging-<id>/`, renames it to `gen-<id>/`, then
//! swaps `CURRENT` through tmp→rename. Readers only ever follow `CURRENT`, so an interrupted build
//! leaves the previous generation live.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use dqa_core::config::validate_artifact_name;
use dqa_core::error::{codes, AppError};
use tracing::{debug, info, warn};

use super::{IndexEntry, IndexManifest, VectorIndex, VectorStore};
use crate::retry::RetryPolicy;

const CURRENT: &str = "CURRENT";
const MANIFEST: &str = "manifest.json";
const ENTRIES: &str = "entries.json";

#[derive(Debug, Clone)]
pub struct FsVectorStore {
    root: PathBuf,
    io_retry: RetryPolicy,
    // Builds of the same artifact are serialized across all clones of this store.
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    seq: Arc<AtomicU64>,
}

impl FsVectorStore {
    pub fn open(root: PathBuf) -> Self {
        Self {
            root,
            io_retry: RetryPolicy::default(),
            locks: Arc::new(Mutex::new(HashMap::new())),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_io_retry(mut self, policy: RetryPolicy) -> Self {
        self.io_retry = policy;
        self
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn artifact_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(name.to_string()).or_default().clone()
    }

    fn next_generation_id(&self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{nanos:x}-{:x}-{seq}", std::process::id())
    }

    /// Generation id named by `CURRENT`, if the artifact has ever been persisted.
    fn current_generation(&self, name: &str) -> Result<Option<String>, AppError> {
        let path = self.artifact_dir(name).join(CURRENT);
        let raw = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::new(codes::INDEX_PERSIST_FAILED, "Failed to read index pointer")
                    .with_details(format!("path={}; err={}", path.display(), e))
                    .with_retryable(is_transient(&e)))
            }
        };
        let id = raw.trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(AppError::new(codes::INDEX_CORRUPT, "Index pointer is malformed")
                .with_details(format!("path={}", path.display())));
        }
        Ok(Some(id.to_string()))
    }

    fn write_generation(&self, staging: &Path, index: &VectorIndex) -> Result<(), AppError> {
        fs::create_dir_all(staging).map_err(|e| persist_err("Failed to create index directory", staging, &e))?;

        let manifest = serde_json::to_vec_pretty(&index.manifest).map_err(|e| {
            AppError::new(codes::INDEX_PERSIST_FAILED, "Failed to encode index manifest")
                .with_details(e.to_string())
        })?;
        let entries = serde_json::to_vec(&index.entries).map_err(|e| {
            AppError::new(codes::INDEX_PERSIST_FAILED, "Failed to encode index entries")
                .with_details(e.to_string())
        })?;

        write_synced(&staging.join(ENTRIES), &entries)?;
        write_synced(&staging.join(MANIFEST), &manifest)?;
        Ok(())
    }

    fn swap_current(&self, dir: &Path, gen_id: &str) -> Result<(), AppError> {
        let path = dir.join(CURRENT);
        let tmp = dir.join(format!("{CURRENT}.{gen_id}.tmp"));
        write_synced(&tmp, format!("{gen_id}\n").as_bytes())?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            AppError::new(codes::INDEX_PERSIST_FAILED, "Failed to finalize index pointer write")
                .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
                .with_retryable(is_transient(&e))
        })
    }
}

impl VectorStore for FsVectorStore {
    fn persist(&self, name: &str, index: &VectorIndex) -> Result<(), AppError> {
        validate_artifact_name(name)?;
        index.validate()?;

        let lock = self.lock_for(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let dir = self.artifact_dir(name);
        fs::create_dir_all(&dir).map_err(|e| persist_err("Failed to create artifact directory", &dir, &e))?;

        // An unreadable pointer does not block the rebuild; the old generation is left in place.
        let previous = match self.current_generation(name) {
            Ok(prev) => prev,
            Err(e) => {
                warn!(artifact = name, err = %e.describe(), "index pointer unreadable; previous generation will not be pruned");
                None
            }
        };
        let gen_id = self.next_generation_id();
        let staging = dir.join(format!(".staging-{gen_id}"));
        let live = dir.join(format!("gen-{gen_id}"));

        let staged = self.io_retry.run("persist index generation", || {
            self.write_generation(&staging, index)?;
            fs::rename(&staging, &live).map_err(|e| persist_err("Failed to publish index generation", &live, &e))
        });
        if let Err(e) = staged {
            let _ = fs::remove_dir_all(&staging);
            let _ = fs::remove_dir_all(&live);
            return Err(e);
        }

        if let Err(e) = self.io_retry.run("swap index pointer", || self.swap_current(&dir, &gen_id)) {
            let _ = fs::remove_dir_all(&live);
            return Err(e);
        }
        info!(artifact = name, generation = %gen_id, chunks = index.entries.len(), "index persisted");

        if let Some(prev) = previous.filter(|p| p != &gen_id) {
            let old = dir.join(format!("gen-{prev}"));
            if let Err(e) = fs::remove_dir_all(&old) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %old.display(), err = %e, "failed to prune previous index generation");
                }
            }
        }
        Ok(())
    }

    fn load(&self, name: &str) -> Result<VectorIndex, AppError> {
        validate_artifact_name(name)?;
        let (gen_id, gen_dir) = self.generation_dir(name)?;
        match read_generation(&gen_dir) {
            Ok(index) => {
                debug!(artifact = name, generation = %gen_id, chunks = index.entries.len(), "index loaded");
                Ok(index)
            }
            // A concurrent build may have swapped and pruned the generation mid-read.
            Err(e) if self.current_generation(name)?.as_deref() != Some(gen_id.as_str()) => {
                debug!(artifact = name, err = %e, "index generation replaced during load; retrying");
                let (_, gen_dir) = self.generation_dir(name)?;
                read_generation(&gen_dir)
            }
            Err(e) => Err(e),
        }
    }

    fn manifest(&self, name: &str) -> Result<IndexManifest, AppError> {
        validate_artifact_name(name)?;
        let (_, gen_dir) = self.generation_dir(name)?;
        read_json(&gen_dir.join(MANIFEST))
    }
}

impl FsVectorStore {
    fn generation_dir(&self, name: &str) -> Result<(String, PathBuf), AppError> {
        let id = self.current_generation(name)?.ok_or_else(|| {
            AppError::new(codes::INDEX_NOT_FOUND, "No index found; process documents first")
                .with_details(format!("artifact={name}"))
        })?;
        let dir = self.artifact_dir(name).join(format!("gen-{id}"));
        Ok((id, dir))
    }
}

fn read_generation(dir: &Path) -> Result<VectorIndex, AppError> {
    let manifest: IndexManifest = read_json(&dir.join(MANIFEST))?;
    let entries: Vec<IndexEntry> = read_json(&dir.join(ENTRIES))?;
    let index = VectorIndex { manifest, entries };
    index.validate()?;
    Ok(index)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new(codes::INDEX_CORRUPT, "Failed to read index file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new(codes::INDEX_CORRUPT, "Failed to decode index file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let mut f = File::create(path).map_err(|e| persist_err("Failed to create index file", path, &e))?;
    f.write_all(bytes).map_err(|e| persist_err("Failed to write index file", path, &e))?;
    f.sync_all().map_err(|e| persist_err("Failed to sync index file", path, &e))
}

fn persist_err(message: &str, path: &Path, e: &io::Error) -> AppError {
    AppError::new(codes::INDEX_PERSIST_FAILED, message)
        .with_details(format!("path={}; err={}", path.display(), e))
        .with_retryable(is_transient(e))
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
