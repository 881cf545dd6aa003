use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use ragdoc_core::error::{AppError, INDEX_STORE_FAILED, INDEX_UPSERT_FAILED};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::retrieve::similarity::{cosine_similarity, l2_norm};

/// What the index keeps per chunk besides the vector. Entries are
/// created by the indexer and superseded on re-index, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub source_id: String,
    pub sequence_index: u32,
    pub text: String,
    pub text_sha256: String,
    pub metadata: BTreeMap<String, String>,
}

/// One nearest-neighbor hit, before any deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexHit {
    pub chunk_id: String,
    pub score: f32,
    pub source_id: String,
    pub sequence_index: u32,
}

/// Similarity index contract: idempotent upsert keyed by chunk_id,
/// cosine nearest-neighbor query.
pub trait VectorIndex: Send + Sync {
    fn upsert(&self, chunk: StoredChunk, vector: Vec<f32>) -> Result<(), AppError>;
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>, AppError>;
    fn get(&self, chunk_id: &str) -> Result<Option<StoredChunk>, AppError>;
    /// Content hash of the stored text, used to skip re-embedding
    /// unchanged chunks.
    fn content_hash(&self, chunk_id: &str) -> Result<Option<String>, AppError>;
    fn len(&self) -> Result<usize, AppError>;
    fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.len()? == 0)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileIndexState {
    vectors: BTreeMap<String, Vec<f32>>,
    chunks: BTreeMap<String, StoredChunk>,
}

/// File-backed index: two pretty-printed JSON maps under one root,
/// written atomically (tmp then rename) after every mutation. A mutex
/// makes each upsert a single atomic step for concurrent ingestion.
#[derive(Debug)]
pub struct FileIndex {
    root: PathBuf,
    inner: Mutex<FileIndexState>,
}

impl FileIndex {
    pub fn open(root: PathBuf) -> Result<Self, AppError> {
        fs::create_dir_all(&root).map_err(|e| {
            AppError::new(INDEX_STORE_FAILED, "Failed to create index directory")
                .with_details(format!("path={}; err={}", root.display(), e))
        })?;
        let vectors = read_json_map(&root.join("vectors.json"))?;
        let chunks = read_json_map(&root.join("chunks.json"))?;
        Ok(Self {
            root,
            inner: Mutex::new(FileIndexState { vectors, chunks }),
        })
    }

    fn persist(&self, state: &FileIndexState) -> Result<(), AppError> {
        write_json_atomic(&self.root.join("vectors.json"), &state.vectors)?;
        write_json_atomic(&self.root.join("chunks.json"), &state.chunks)?;
        Ok(())
    }
}

impl VectorIndex for FileIndex {
    fn upsert(&self, chunk: StoredChunk, vector: Vec<f32>) -> Result<(), AppError> {
        let mut state = self.inner.lock();
        if let Some(existing) = state.vectors.values().next() {
            if existing.len() != vector.len() {
                return Err(AppError::new(
                    INDEX_UPSERT_FAILED,
                    "Embedding dimension mismatch with existing index",
                )
                .with_details(format!(
                    "chunk_id={}; expected={}; got={}",
                    chunk.chunk_id,
                    existing.len(),
                    vector.len()
                )));
            }
        }
        state.vectors.insert(chunk.chunk_id.clone(), vector);
        state.chunks.insert(chunk.chunk_id.clone(), chunk);
        self.persist(&state)
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>, AppError> {
        let state = self.inner.lock();
        let qnorm = l2_norm(vector);
        if qnorm == 0.0 || state.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<IndexHit> = Vec::with_capacity(state.vectors.len());
        for (chunk_id, v) in state.vectors.iter() {
            if v.len() != vector.len() {
                return Err(AppError::new(
                    INDEX_STORE_FAILED,
                    "Query embedding dims do not match index dims",
                )
                .with_details(format!(
                    "chunk_id={chunk_id}; index={}; query={}",
                    v.len(),
                    vector.len()
                )));
            }
            let vnorm = l2_norm(v);
            if vnorm == 0.0 {
                continue;
            }
            let chunk = state.chunks.get(chunk_id).ok_or_else(|| {
                AppError::new(INDEX_STORE_FAILED, "Vector without a stored chunk")
                    .with_details(format!("chunk_id={chunk_id}"))
            })?;
            hits.push(IndexHit {
                chunk_id: chunk_id.clone(),
                score: cosine_similarity(vector, v, qnorm, vnorm),
                source_id: chunk.source_id.clone(),
                sequence_index: chunk.sequence_index,
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.sequence_index.cmp(&b.sequence_index))
                .then(a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    fn get(&self, chunk_id: &str) -> Result<Option<StoredChunk>, AppError> {
        Ok(self.inner.lock().chunks.get(chunk_id).cloned())
    }

    fn content_hash(&self, chunk_id: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .inner
            .lock()
            .chunks
            .get(chunk_id)
            .map(|c| c.text_sha256.clone()))
    }

    fn len(&self) -> Result<usize, AppError> {
        Ok(self.inner.lock().vectors.len())
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

fn read_json_map<T: serde::de::DeserializeOwned + Default>(path: &PathBuf) -> Result<T, AppError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let bytes = fs::read(path).map_err(|e| {
        AppError::new(INDEX_STORE_FAILED, "Failed to read index file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new(INDEX_STORE_FAILED, "Failed to decode index file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

fn write_json_atomic<T: Serialize>(path: &PathBuf, value: &T) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new(INDEX_STORE_FAILED, "Failed to encode index file").with_details(e.to_string())
    })?;
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new(INDEX_STORE_FAILED, "Failed to write index file")
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new(INDEX_STORE_FAILED, "Failed to finalize index file write")
            .with_details(format!(
                "tmp={}; dest={}; err={}",
                tmp.display(),
                path.display(),
                e
            ))
    })?;
    Ok(())
}
