pub mod chunk;
pub mod document;
pub mod error;
pub mod normalize;
