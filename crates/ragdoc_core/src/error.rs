use serde::{Deserialize, Serialize};
use std::fmt;

/// Single structured error shape used across all pipeline layers.
///
/// Codes travel unchanged between crates so callers can branch on them
/// without depending on concrete error enums.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

/// Non-fatal: the cleaned document has no content; callers skip it.
pub const EMPTY_INPUT: &str = "EMPTY_INPUT";
/// Bad chunking or retrieval parameters.
pub const INVALID_CONFIG: &str = "INVALID_CONFIG";
/// Per-chunk upsert failure, aggregated into the batch outcome.
pub const INDEX_UPSERT_FAILED: &str = "INDEX_UPSERT_FAILED";
/// Vector store I/O failure.
pub const INDEX_STORE_FAILED: &str = "INDEX_STORE_FAILED";
/// Embedding collaborator failure.
pub const EMBEDDINGS_FAILED: &str = "EMBEDDINGS_FAILED";
/// Fatal to the current query.
pub const RETRIEVAL_UNAVAILABLE: &str = "RETRIEVAL_UNAVAILABLE";
/// Generator unreachable after the caller-supplied retry budget.
pub const GENERATION_UNAVAILABLE: &str = "GENERATION_UNAVAILABLE";
/// Generator responded but the payload was unusable.
pub const GENERATION_FAILED: &str = "GENERATION_FAILED";
/// Embedding endpoint must stay on loopback.
pub const REMOTE_NOT_ALLOWED: &str = "REMOTE_NOT_ALLOWED";
