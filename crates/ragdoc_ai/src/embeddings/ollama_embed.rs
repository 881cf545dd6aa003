use std::time::Duration;

use ragdoc_core::error::{AppError, EMBEDDINGS_FAILED, REMOTE_NOT_ALLOWED};
use serde::{Deserialize, Serialize};

use super::Embedder;

/// Requests larger than this are truncated before hitting the model.
/// Chunking keeps inputs well under it; this is a transport guard.
const MAX_EMBED_INPUT_CHARS: usize = 12_000;

/// Embedder backed by a local Ollama server.
///
/// The base URL is strictly limited to `127.0.0.1`: document text must
/// never leave the machine through the embedding path.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, AppError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !is_loopback_base_url(&base_url) {
            return Err(AppError::new(
                REMOTE_NOT_ALLOWED,
                "Embedding base URL must be localhost (127.0.0.1)",
            )
            .with_details(format!("base_url={base_url}")));
        }
        Ok(Self {
            base_url,
            model: model.into(),
            timeout: Duration::from_secs(10),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn is_loopback_base_url(base_url: &str) -> bool {
    if base_url == "http://127.0.0.1" {
        return true;
    }
    let Some(rest) = base_url.strip_prefix("http://127.0.0.1:") else {
        return false;
    };
    match rest.parse::<u32>() {
        Ok(port) => (1..=65_535).contains(&port),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        let prompt: String = input.chars().take(MAX_EMBED_INPUT_CHARS).collect();

        let url = format!("{}/api/embeddings", self.base_url);
        let req = EmbeddingsRequest {
            model: &self.model,
            prompt: &prompt,
        };
        let resp = ureq::post(&url)
            .timeout(self.timeout)
            .send_json(serde_json::to_value(req).map_err(|e| {
                AppError::new(EMBEDDINGS_FAILED, "Failed to encode embeddings request")
                    .with_details(e.to_string())
            })?);

        match resp {
            Ok(r) if r.status() == 200 => {
                let v: EmbeddingsResponse = r.into_json().map_err(|e| {
                    AppError::new(EMBEDDINGS_FAILED, "Failed to decode embeddings response")
                        .with_details(e.to_string())
                })?;
                if v.embedding.is_empty() {
                    return Err(AppError::new(
                        EMBEDDINGS_FAILED,
                        "Embeddings response was empty",
                    ));
                }
                Ok(v.embedding)
            }
            Ok(r) => Err(
                AppError::new(EMBEDDINGS_FAILED, "Embeddings request failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(ureq::Error::Status(status, _)) => Err(
                AppError::new(EMBEDDINGS_FAILED, "Embeddings request failed")
                    .with_details(format!("status={status}")),
            ),
            Err(e) => Err(
                AppError::new(EMBEDDINGS_FAILED, "Failed to call embeddings endpoint")
                    .with_details(e.to_string())
                    .with_retryable(true),
            ),
        }
    }
}
