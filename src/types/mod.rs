// Public modules
pub mod completion_chunk;
pub mod conversation;
pub mod delta_event;
pub mod message;

// Re-exports
pub use completion_chunk::{ChunkChoice, ChunkDelta, CompletionChunk};
pub use conversation::{
    Conversation, DEFAULT_MODEL, DEFAULT_TEMPERATURE, TEMPERATURE_RANGE, validate_temperature,
};
pub use delta_event::DeltaEvent;
pub use message::{Message, Role};
