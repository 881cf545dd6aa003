use std::collections::BTreeMap;

use ragdoc_core::error::{AppError, EMPTY_INPUT, RETRIEVAL_UNAVAILABLE};
use serde::{Deserialize, Serialize};

use crate::embeddings::Embedder;
use crate::index::store::VectorIndex;

pub mod similarity;

/// Knobs for deduplicated top-k retrieval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetrieveConfig {
    /// Over-fetch multiplier: `k * dedup_factor` neighbors are pulled
    /// from the index so deduplication still leaves `k` candidates.
    pub dedup_factor: usize,
    /// Best chunks kept per source document.
    pub max_per_source: usize,
    /// Results scoring below this are dropped, not returned.
    pub min_score: f32,
}

impl Default for RetrieveConfig {
    fn default() -> Self {
        Self {
            dedup_factor: 2,
            max_per_source: 2,
            min_score: 0.0,
        }
    }
}

/// One ranked candidate, ephemeral per query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub score: f32,
    pub source_id: String,
    pub sequence_index: u32,
}

/// Embeds the query and produces a deduplicated, ranked candidate
/// list. An empty index or a query nothing matches yields an empty
/// list, not an error.
pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
    cfg: RetrieveConfig,
}

impl<'a> Retriever<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        index: &'a dyn VectorIndex,
        cfg: RetrieveConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            cfg,
        }
    }

    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::new(EMPTY_INPUT, "Query must not be empty"));
        }
        let k = k.max(1);

        if self.index.is_empty()? {
            return Ok(Vec::new());
        }

        let qv = self.embedder.embed(query).map_err(|e| {
            AppError::new(RETRIEVAL_UNAVAILABLE, "Failed to embed query")
                .with_details(e.to_string())
                .with_retryable(e.retryable)
        })?;
        if similarity::l2_norm(&qv) == 0.0 {
            return Err(AppError::new(
                RETRIEVAL_UNAVAILABLE,
                "Query embedding norm is zero",
            ));
        }

        let overfetch = k.saturating_mul(self.cfg.dedup_factor.max(1));
        let mut hits = self.index.query(&qv, overfetch)?;

        // Deterministic rank: score desc, then earlier chunk wins,
        // then chunk_id as the final tie-breaker.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.sequence_index.cmp(&b.sequence_index))
                .then(a.chunk_id.cmp(&b.chunk_id))
        });

        let mut per_source: BTreeMap<String, usize> = BTreeMap::new();
        let mut out = Vec::with_capacity(k);
        for hit in hits {
            if hit.score < self.cfg.min_score {
                continue;
            }
            let seen = per_source.entry(hit.source_id.clone()).or_insert(0);
            if *seen >= self.cfg.max_per_source.max(1) {
                continue;
            }
            *seen += 1;
            out.push(RetrievalResult {
                chunk_id: hit.chunk_id,
                score: hit.score,
                source_id: hit.source_id,
                sequence_index: hit.sequence_index,
            });
            if out.len() == k {
                break;
            }
        }
        Ok(out)
    }
}
