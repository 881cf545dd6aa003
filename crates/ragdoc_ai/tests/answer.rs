use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use ragdoc_ai::answer::{Answer, AnswerConfig, AnswerOrchestrator, RetryPolicy, NO_EVIDENCE_ANSWER};
use ragdoc_ai::embeddings::Embedder;
use ragdoc_ai::index::store::{sha256_hex, FileIndex, StoredChunk, VectorIndex};
use ragdoc_ai::llm::Llm;
use ragdoc_core::error::{AppError, GENERATION_FAILED, GENERATION_UNAVAILABLE};

struct FixedEmbedder(Vec<f32>);

impl Embedder for FixedEmbedder {
    fn embed(&self, _input: &str) -> Result<Vec<f32>, AppError> {
        Ok(self.0.clone())
    }
}

/// Fails the first `fail_first` calls, then answers with `reply`.
struct ScriptedLlm {
    calls: AtomicUsize,
    fail_first: usize,
    retryable: bool,
    reply: &'static str,
}

impl ScriptedLlm {
    fn always_ok(reply: &'static str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first: 0,
            retryable: false,
            reply,
        }
    }

    fn failing(fail_first: usize, retryable: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first,
            retryable,
            reply: "Recovered answer [src_chunk_0].",
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Llm for ScriptedLlm {
    fn generate(&self, _prompt: &str) -> Result<String, AppError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            let code = if self.retryable {
                GENERATION_UNAVAILABLE
            } else {
                GENERATION_FAILED
            };
            Err(AppError::new(code, "Generation backend error").with_retryable(self.retryable))
        } else {
            Ok(self.reply.to_string())
        }
    }
}

fn seeded_index(dir: &std::path::Path) -> FileIndex {
    let index = FileIndex::open(dir.to_path_buf()).unwrap();
    let text = "The method improves recall by four points.";
    index
        .upsert(
            StoredChunk {
                chunk_id: "src_chunk_0".to_string(),
                source_id: "src".to_string(),
                sequence_index: 0,
                text: text.to_string(),
                text_sha256: sha256_hex(text.as_bytes()),
                metadata: BTreeMap::new(),
            },
            vec![1.0, 0.0],
        )
        .unwrap();
    index
}

fn fast_config() -> AnswerConfig {
    AnswerConfig {
        retry: RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(0),
        },
        ..AnswerConfig::default()
    }
}

#[test]
fn no_evidence_short_circuits_before_generation() {
    let dir = tempfile::tempdir().unwrap();
    let index = FileIndex::open(dir.path().to_path_buf()).unwrap();
    let embedder = FixedEmbedder(vec![1.0, 0.0]);
    let llm = ScriptedLlm::always_ok("should never be produced");
    let orchestrator = AnswerOrchestrator::new(&embedder, &index, &llm, fast_config());

    let answer = orchestrator.answer("what does the method do?", 5).unwrap();
    assert_eq!(
        answer,
        Answer {
            text: NO_EVIDENCE_ANSWER.to_string(),
            citations: vec![],
            used_context: false,
        }
    );
    assert_eq!(llm.calls(), 0);
}

#[test]
fn grounded_answer_carries_context_citations() {
    let dir = tempfile::tempdir().unwrap();
    let index = seeded_index(dir.path());
    let embedder = FixedEmbedder(vec![1.0, 0.0]);
    let llm = ScriptedLlm::always_ok("Recall improves by four points [src_chunk_0].");
    let orchestrator = AnswerOrchestrator::new(&embedder, &index, &llm, fast_config());

    let answer = orchestrator.answer("what does the method do?", 5).unwrap();
    assert!(answer.used_context);
    assert_eq!(answer.citations, vec!["src_chunk_0"]);
    assert_eq!(answer.text, "Recall improves by four points [src_chunk_0].");
    assert_eq!(llm.calls(), 1);
}

#[test]
fn retryable_generation_failures_are_retried_until_success() {
    let dir = tempfile::tempdir().unwrap();
    let index = seeded_index(dir.path());
    let embedder = FixedEmbedder(vec![1.0, 0.0]);
    let llm = ScriptedLlm::failing(2, true);
    let orchestrator = AnswerOrchestrator::new(&embedder, &index, &llm, fast_config());

    let answer = orchestrator.answer("question", 5).unwrap();
    assert!(answer.used_context);
    assert_eq!(llm.calls(), 3);
}

#[test]
fn exhausted_retries_surface_generation_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let index = seeded_index(dir.path());
    let embedder = FixedEmbedder(vec![1.0, 0.0]);
    let llm = ScriptedLlm::failing(usize::MAX, true);
    let orchestrator = AnswerOrchestrator::new(&embedder, &index, &llm, fast_config());

    let err = orchestrator.answer("question", 5).unwrap_err();
    assert_eq!(err.code, GENERATION_UNAVAILABLE);
    assert!(err.retryable);
    assert_eq!(llm.calls(), 3);
}

#[test]
fn non_retryable_generation_errors_fail_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let index = seeded_index(dir.path());
    let embedder = FixedEmbedder(vec![1.0, 0.0]);
    let llm = ScriptedLlm::failing(usize::MAX, false);
    let orchestrator = AnswerOrchestrator::new(&embedder, &index, &llm, fast_config());

    let err = orchestrator.answer("question", 5).unwrap_err();
    assert_eq!(err.code, GENERATION_FAILED);
    assert_eq!(llm.calls(), 1);
}
