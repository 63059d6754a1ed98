//! Chunk-and-summarize pipeline for documents too large to send whole.

use crate::chunker;
use crate::client::Completion;
use crate::error::Result;
use crate::observability::SUMMARY_CHUNKS;
use crate::types::Conversation;

/// Synthetic user message carrying the condensed document.
pub const SUMMARY_PREAMBLE: &str = "The following is a condensed summary of a long document I provided:";

/// Fixed assistant reply that follows the summary in the history.
pub const SUMMARY_ACKNOWLEDGEMENT: &str =
    "I have read the summary of the document and will use it as context for your next questions.";

fn summarize_instruction(part: usize, total: usize) -> String {
    format!(
        "You condense documents. This is part {part} of {total} of a longer document. \
         Summarize it faithfully and concisely, keeping names, numbers and conclusions. \
         Reply with the summary only."
    )
}

/// Summarizes `document` chunk by chunk and joins the partial summaries in order.
///
/// Each chunk is sent in its own request built from `base`'s model and temperature with
/// an empty history.  Chunks are processed one at a time; the first failure aborts.
pub async fn summarize_document<C>(
    client: &C,
    base: &Conversation,
    document: &str,
    chunk_size: usize,
) -> Result<String>
where
    C: Completion + ?Sized,
{
    let chunks = chunker::split(document, chunk_size)?;
    let total = chunks.len();
    let mut summaries = Vec::with_capacity(total);
    for (index, chunk) in chunks.into_iter().enumerate() {
        let part = index + 1;
        tracing::info!(part, total, chars = chunk.chars().count(), "summarizing chunk");
        let mut request = base.empty_like();
        request.add_system_message(summarize_instruction(part, total));
        request.add_user_message(chunk);
        let summary = client.stream(&request, None).await?;
        SUMMARY_CHUNKS.click();
        summaries.push(summary.trim().to_string());
    }
    Ok(summaries.join("\n"))
}

/// The user message that introduces a summary into the conversation.
pub fn summary_message(summary: &str) -> String {
    format!("{SUMMARY_PREAMBLE}\n\n{summary}")
}
