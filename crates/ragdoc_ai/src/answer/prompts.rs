pub fn grounded_answer_prompt(context: &str, question: &str) -> String {
    // Keep the contract explicit:
    // - Use ONLY the provided context.
    // - Cite chunk ids in square brackets, e.g. [doc1_chunk_0].
    // - Say so when the context does not answer the question.
    format!(
        r#"You are a research assistant answering from retrieved document excerpts.

Rules (non-negotiable):
1) Use ONLY the context excerpts provided below. Do not invent facts.
2) After each fact, cite the supporting chunk id in square brackets exactly as it appears, e.g. [doc1_chunk_0].
3) If the context does not contain the answer, say so plainly instead of guessing.
4) Answer completely; do not cut a sentence short.

Context:
{context}

Question: {question}

Answer (concise, grounded, with citations):"#
    )
}
