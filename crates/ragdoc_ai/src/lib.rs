pub mod answer;
pub mod batch;
pub mod context;
pub mod embeddings;
pub mod index;
pub mod llm;
pub mod retrieve;
