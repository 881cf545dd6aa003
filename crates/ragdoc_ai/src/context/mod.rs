use ragdoc_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::index::store::VectorIndex;
use crate::retrieve::RetrievalResult;

/// Separator between context blocks.
const BLOCK_SEP: &str = "\n\n---\n\n";

/// Citation-tagged context for one query, ephemeral.
///
/// `citations` preserves inclusion order (reading order for the
/// generated answer), not retrieval score order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssembledContext {
    pub text: String,
    pub citations: Vec<String>,
}

/// Compose a context string within `char_budget` from ranked
/// candidates.
///
/// Chunks are appended whole, each prefixed with its `[chunk_id]`
/// marker; iteration stops at the first chunk that would exceed the
/// budget, so no chunk is ever truncated mid-sentence. An empty
/// candidate list yields an empty context.
pub fn assemble(
    index: &dyn VectorIndex,
    results: &[RetrievalResult],
    char_budget: usize,
) -> Result<AssembledContext, AppError> {
    let mut ctx = AssembledContext::default();
    let mut used_chars = 0usize;

    for result in results {
        let Some(stored) = index.get(&result.chunk_id)? else {
            // Superseded between retrieval and assembly; nothing to cite.
            tracing::warn!(chunk_id = %result.chunk_id, "retrieved chunk no longer in index");
            continue;
        };
        let block = format!("[{}]\n{}", stored.chunk_id, stored.text);
        let block_chars = block.chars().count();
        let added = if ctx.text.is_empty() {
            block_chars
        } else {
            BLOCK_SEP.len() + block_chars
        };
        if used_chars + added > char_budget {
            break;
        }
        if !ctx.text.is_empty() {
            ctx.text.push_str(BLOCK_SEP);
        }
        ctx.text.push_str(&block);
        ctx.citations.push(stored.chunk_id);
        used_chars += added;
    }

    Ok(ctx)
}
