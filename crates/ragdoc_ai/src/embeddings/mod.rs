use ragdoc_core::error::AppError;

/// Embedding collaborator: text in, dense vector out.
///
/// Implementations are expected to be deterministic for a given input
/// and to return a fixed dimensionality for the lifetime of an index.
pub trait Embedder: Send + Sync {
    fn embed(&self, input: &str) -> Result<Vec<f32>, AppError>;
}

pub mod ollama_embed;
