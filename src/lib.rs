// Public modules
pub mod chat;
pub mod chunker;
pub mod client;
pub mod error;
pub mod pretreatment;
pub mod render;
pub mod settings;
pub mod spinner;
pub mod sse;
pub mod types;

mod observability;

// Re-exports
pub use client::{ChatClient, Completion, DeltaCallback};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use types::*;
