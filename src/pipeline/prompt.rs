//! Prompt assembly for retrieval-augmented answering.

/// Assemble the completion prompt from a question and its retrieved context.
///
/// Pure string formatting: context strings are joined with a blank line, no truncation or
/// token budgeting is applied.
pub fn build_prompt(question: &str, contexts: &[String]) -> String {
    let context_block = contexts.join("\n\n");
    format!(
        "Use the following context to answer the question.\n\nContext:\n{context_block}\n\nQuestion: {question}\nAnswer:"
    )
}
