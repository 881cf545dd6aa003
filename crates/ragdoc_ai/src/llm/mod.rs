use ragdoc_core::error::AppError;

/// Generation collaborator: prompt in, text out.
pub trait Llm: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, AppError>;
}

pub mod groq_llm;
