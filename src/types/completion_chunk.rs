use serde::{Deserialize, Serialize};

/// One JSON record of a streamed chat completion.
///
/// Every field is optional: keep-alive records and role-only deltas are valid records
/// that simply carry no text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionChunk {
    /// Identifier shared by all records of one completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Candidate continuations; only the first is ever consumed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<ChunkChoice>>,
}

/// A single streamed choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// The incremental update.
    #[serde(default)]
    pub delta: ChunkDelta,
}

/// The incremental part of a streamed choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Role announcement, sent once at the start by most endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Newly generated text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl CompletionChunk {
    /// Returns the text carried by the first choice.
    ///
    /// `None` when the record has no choices at all; `Some("")` when the first choice
    /// exists but carries no content.
    pub fn first_delta(&self) -> Option<&str> {
        let choice = self.choices.as_ref()?.first()?;
        Some(choice.delta.content.as_deref().unwrap_or(""))
    }
}
