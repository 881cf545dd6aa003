use ragdoc_core::chunk::Chunk;
use ragdoc_core::document::Document;
use ragdoc_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::embeddings::Embedder;

pub mod store;

use store::{sha256_hex, StoredChunk, VectorIndex};

/// Aggregate result of indexing one document's chunks. Per-chunk
/// failures are counted here instead of aborting the run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexOutcome {
    pub indexed: u32,
    pub skipped: u32,
}

/// Embeds chunks and upserts them into the similarity index.
///
/// Upserts are keyed by the deterministic chunk_id, so re-running
/// indexing over unchanged input replaces entries instead of
/// duplicating them. Chunks whose stored content hash already matches
/// are not re-embedded at all.
pub struct Indexer<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
}

impl<'a> Indexer<'a> {
    pub fn new(embedder: &'a dyn Embedder, index: &'a dyn VectorIndex) -> Self {
        Self { embedder, index }
    }

    pub fn index(&self, document: &Document, chunks: &[Chunk]) -> Result<IndexOutcome, AppError> {
        let mut outcome = IndexOutcome::default();

        for chunk in chunks {
            let text_sha256 = sha256_hex(chunk.text.as_bytes());
            if self.index.content_hash(&chunk.chunk_id)?.as_deref() == Some(&text_sha256) {
                tracing::debug!(chunk_id = %chunk.chunk_id, "chunk unchanged, skipping embed");
                outcome.indexed += 1;
                continue;
            }

            let vector = match self.embedder.embed(&chunk.text) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(
                        chunk_id = %chunk.chunk_id,
                        error = %e,
                        "embedding failed, chunk skipped"
                    );
                    outcome.skipped += 1;
                    continue;
                }
            };

            let stored = StoredChunk {
                chunk_id: chunk.chunk_id.clone(),
                source_id: chunk.source_id.clone(),
                sequence_index: chunk.sequence_index,
                text: chunk.text.clone(),
                text_sha256,
                metadata: document.metadata.clone(),
            };
            match self.index.upsert(stored, vector) {
                Ok(()) => outcome.indexed += 1,
                Err(e) => {
                    tracing::warn!(
                        chunk_id = %chunk.chunk_id,
                        error = %e,
                        "index upsert failed, chunk skipped"
                    );
                    outcome.skipped += 1;
                }
            }
        }

        Ok(outcome)
    }
}
