use rayon::prelude::*;
use ragdoc_core::chunk::{chunk_document, ChunkConfig};
use ragdoc_core::document::Document;
use ragdoc_core::error::{AppError, EMPTY_INPUT, INVALID_CONFIG};
use ragdoc_core::normalize::normalize;
use serde::{Deserialize, Serialize};

use crate::embeddings::Embedder;
use crate::index::store::VectorIndex;
use crate::index::Indexer;

/// Aggregate accounting for one batch run. Empty documents and
/// per-chunk failures are reported here, never raised.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchOutcome {
    pub documents_indexed: u32,
    pub documents_skipped: u32,
    pub chunks_indexed: u32,
    pub chunks_skipped: u32,
}

/// Runs the full ingestion pipeline (normalize, chunk, index) over
/// many documents on a bounded worker pool.
///
/// Documents are independent, so they run concurrently; within one
/// document chunks are produced and indexed in order. The shared index
/// serializes upserts, so a completed upsert is visible to subsequent
/// retrievals.
pub struct BatchIndexer<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
    chunk_cfg: ChunkConfig,
    workers: usize,
}

impl<'a> BatchIndexer<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        index: &'a dyn VectorIndex,
        chunk_cfg: ChunkConfig,
        workers: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            chunk_cfg,
            workers: workers.max(1),
        }
    }

    pub fn run(&self, documents: &[Document]) -> Result<BatchOutcome, AppError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| {
                AppError::new(INVALID_CONFIG, "Failed to build ingestion worker pool")
                    .with_details(e.to_string())
            })?;

        let per_doc: Vec<BatchOutcome> = pool.install(|| {
            documents
                .par_iter()
                .map(|doc| self.index_document(doc))
                .collect()
        });

        let mut total = BatchOutcome::default();
        for o in per_doc {
            total.documents_indexed += o.documents_indexed;
            total.documents_skipped += o.documents_skipped;
            total.chunks_indexed += o.chunks_indexed;
            total.chunks_skipped += o.chunks_skipped;
        }
        tracing::info!(
            documents_indexed = total.documents_indexed,
            documents_skipped = total.documents_skipped,
            chunks_indexed = total.chunks_indexed,
            chunks_skipped = total.chunks_skipped,
            "batch ingestion finished"
        );
        Ok(total)
    }

    fn index_document(&self, document: &Document) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        let text = match normalize(&document.raw_text) {
            Ok(t) => t,
            Err(e) if e.code == EMPTY_INPUT => {
                tracing::warn!(source_id = %document.source_id, "document empty, skipped");
                outcome.documents_skipped += 1;
                return outcome;
            }
            Err(e) => {
                tracing::warn!(source_id = %document.source_id, error = %e, "normalization failed, document skipped");
                outcome.documents_skipped += 1;
                return outcome;
            }
        };

        let chunks = chunk_document(&document.source_id, &text, self.chunk_cfg);
        match Indexer::new(self.embedder, self.index).index(document, &chunks) {
            Ok(o) => {
                outcome.documents_indexed += 1;
                outcome.chunks_indexed += o.indexed;
                outcome.chunks_skipped += o.skipped;
            }
            Err(e) => {
                tracing::warn!(source_id = %document.source_id, error = %e, "indexing failed, document skipped");
                outcome.documents_skipped += 1;
            }
        }
        outcome
    }
}
