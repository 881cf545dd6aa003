use std::time::Duration;

use ragdoc_core::error::{AppError, GENERATION_UNAVAILABLE};
use serde::{Deserialize, Serialize};

use crate::context::assemble;
use crate::embeddings::Embedder;
use crate::index::store::VectorIndex;
use crate::llm::Llm;
use crate::retrieve::{RetrieveConfig, Retriever};

mod prompts;

/// Returned verbatim when retrieval produced no usable evidence.
pub const NO_EVIDENCE_ANSWER: &str =
    "No relevant context was found in the indexed documents, so this question cannot be answered from evidence.";

/// Explicit, caller-visible retry budget for the generation call.
/// Nothing inside the pipeline retries beyond this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerConfig {
    pub retrieve: RetrieveConfig,
    /// Maximum character length of the assembled context.
    pub char_budget: usize,
    pub retry: RetryPolicy,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            retrieve: RetrieveConfig::default(),
            char_budget: 6000,
            retry: RetryPolicy::default(),
        }
    }
}

/// The caller-facing result of one query.
///
/// `used_context = false` marks the no-evidence case: the generator
/// was never invoked and `text` is the fixed no-evidence message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<String>,
    pub used_context: bool,
}

/// Runs retrieval and assembly, then asks the generator for a grounded
/// answer. Short-circuits before generation when there is no evidence,
/// so an empty index can never produce a hallucinated answer.
pub struct AnswerOrchestrator<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
    llm: &'a dyn Llm,
    cfg: AnswerConfig,
}

impl<'a> AnswerOrchestrator<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        index: &'a dyn VectorIndex,
        llm: &'a dyn Llm,
        cfg: AnswerConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            llm,
            cfg,
        }
    }

    pub fn answer(&self, question: &str, k: usize) -> Result<Answer, AppError> {
        let retriever = Retriever::new(self.embedder, self.index, self.cfg.retrieve);
        let results = retriever.retrieve(question, k)?;
        let ctx = assemble(self.index, &results, self.cfg.char_budget)?;

        if ctx.text.is_empty() {
            return Ok(Answer {
                text: NO_EVIDENCE_ANSWER.to_string(),
                citations: Vec::new(),
                used_context: false,
            });
        }

        let prompt = prompts::grounded_answer_prompt(&ctx.text, question);
        let generated = self.generate_with_retry(&prompt)?;

        if !ctx
            .citations
            .iter()
            .any(|id| generated.contains(&format!("[{id}]")))
        {
            tracing::warn!("generated answer cites none of the provided chunks");
        }

        Ok(Answer {
            text: generated,
            citations: ctx.citations,
            used_context: true,
        })
    }

    fn generate_with_retry(&self, prompt: &str) -> Result<String, AppError> {
        let attempts = self.cfg.retry.attempts.max(1);
        let mut last_err: Option<AppError> = None;

        for attempt in 0..attempts {
            match self.llm.generate(prompt) {
                Ok(text) => return Ok(text),
                Err(e) if e.retryable => {
                    tracing::warn!(attempt, error = %e, "generation attempt failed");
                    if attempt + 1 < attempts {
                        std::thread::sleep(self.cfg.retry.backoff);
                    }
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let mut err = AppError::new(
            GENERATION_UNAVAILABLE,
            "Generation service unreachable after retry budget",
        )
        .with_retryable(true);
        if let Some(last) = last_err {
            err = err.with_details(format!("attempts={attempts}; last={last}"));
        }
        Err(err)
    }
}
