use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use ragdoc_ai::embeddings::Embedder;
use ragdoc_ai::index::store::{sha256_hex, FileIndex, StoredChunk, VectorIndex};
use ragdoc_ai::retrieve::{RetrieveConfig, Retriever};
use ragdoc_core::error::{AppError, EMPTY_INPUT, RETRIEVAL_UNAVAILABLE};

/// Embeds every input to the same fixed vector. Retrieval ordering is
/// then fully determined by the vectors stored in the index.
struct FixedEmbedder(Vec<f32>);

impl Embedder for FixedEmbedder {
    fn embed(&self, _input: &str) -> Result<Vec<f32>, AppError> {
        Ok(self.0.clone())
    }
}

fn stored(source_id: &str, seq: u32) -> StoredChunk {
    let chunk_id = format!("{source_id}_chunk_{seq}");
    let text = format!("body of {chunk_id}");
    StoredChunk {
        chunk_id,
        source_id: source_id.to_string(),
        sequence_index: seq,
        text: text.clone(),
        text_sha256: sha256_hex(text.as_bytes()),
        metadata: BTreeMap::new(),
    }
}

/// Unit-direction vectors, so cosine against the query [1, 0] equals
/// the first component.
fn seeded_index(dir: &std::path::Path) -> FileIndex {
    let index = FileIndex::open(dir.to_path_buf()).expect("open");
    index.upsert(stored("srcA", 0), vec![1.0, 0.0]).unwrap(); // score 1.0
    index.upsert(stored("srcA", 1), vec![0.6, 0.8]).unwrap(); // score 0.6
    index.upsert(stored("srcA", 2), vec![0.8, 0.6]).unwrap(); // score 0.8
    index.upsert(stored("srcB", 0), vec![0.0, 1.0]).unwrap(); // score 0.0
    index.upsert(stored("srcB", 1), vec![0.6, 0.8]).unwrap(); // score 0.6
    index
}

#[test]
fn ranks_by_score_and_dedups_per_source() {
    let dir = tempfile::tempdir().unwrap();
    let index = seeded_index(dir.path());
    let embedder = FixedEmbedder(vec![1.0, 0.0]);
    let retriever = Retriever::new(&embedder, &index, RetrieveConfig::default());

    let got = retriever.retrieve("query", 3).expect("retrieve");
    let ids: Vec<&str> = got.iter().map(|r| r.chunk_id.as_str()).collect();
    // srcA_chunk_1 ties srcB_chunk_1 at 0.6 but srcA already holds two
    // slots, so the srcB chunk takes third place.
    assert_eq!(ids, vec!["srcA_chunk_0", "srcA_chunk_2", "srcB_chunk_1"]);
    assert!(got.windows(2).all(|p| p[0].score >= p[1].score));
}

#[test]
fn equal_scores_break_ties_by_sequence_then_id() {
    let dir = tempfile::tempdir().unwrap();
    let index = FileIndex::open(dir.path().to_path_buf()).unwrap();
    index.upsert(stored("srcB", 1), vec![1.0, 0.0]).unwrap();
    index.upsert(stored("srcA", 1), vec![1.0, 0.0]).unwrap();
    index.upsert(stored("srcC", 0), vec![1.0, 0.0]).unwrap();
    let embedder = FixedEmbedder(vec![1.0, 0.0]);
    let retriever = Retriever::new(&embedder, &index, RetrieveConfig::default());

    let got = retriever.retrieve("query", 3).expect("retrieve");
    let ids: Vec<&str> = got.iter().map(|r| r.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["srcC_chunk_0", "srcA_chunk_1", "srcB_chunk_1"]);
}

#[test]
fn min_score_drops_weak_matches() {
    let dir = tempfile::tempdir().unwrap();
    let index = seeded_index(dir.path());
    let embedder = FixedEmbedder(vec![1.0, 0.0]);
    let cfg = RetrieveConfig {
        min_score: 0.5,
        ..RetrieveConfig::default()
    };
    let retriever = Retriever::new(&embedder, &index, cfg);

    let got = retriever.retrieve("query", 10).expect("retrieve");
    assert!(got.iter().all(|r| r.score >= 0.5));
    assert!(!got.iter().any(|r| r.chunk_id == "srcB_chunk_0"));
}

#[test]
fn empty_index_yields_empty_results_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let index = FileIndex::open(dir.path().to_path_buf()).unwrap();
    let embedder = FixedEmbedder(vec![1.0, 0.0]);
    let retriever = Retriever::new(&embedder, &index, RetrieveConfig::default());

    assert_eq!(retriever.retrieve("anything", 5).expect("retrieve"), vec![]);
}

#[test]
fn empty_query_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let index = seeded_index(dir.path());
    let embedder = FixedEmbedder(vec![1.0, 0.0]);
    let retriever = Retriever::new(&embedder, &index, RetrieveConfig::default());

    let err = retriever.retrieve("   \n ", 5).unwrap_err();
    assert_eq!(err.code, EMPTY_INPUT);
}

#[test]
fn zero_norm_query_embedding_is_a_retrieval_failure() {
    let dir = tempfile::tempdir().unwrap();
    let index = seeded_index(dir.path());
    let embedder = FixedEmbedder(vec![0.0, 0.0]);
    let retriever = Retriever::new(&embedder, &index, RetrieveConfig::default());

    let err = retriever.retrieve("query", 5).unwrap_err();
    assert_eq!(err.code, RETRIEVAL_UNAVAILABLE);
}
