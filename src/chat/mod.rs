//! Chat application module for conversations with a chat-completions endpoint.
//!
//! This module provides the session engine behind the `tgpt` binary. It supports:
//!
//! - Streaming responses with real-time token display
//! - Whole-reply and quiet output modes
//! - Summarizing piped documents too large to send in one message
//! - Conversation memory persisted after every reply
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Core chat session management and API interaction
//! - [`summarize`]: Chunk-and-summarize pipeline for large documents
//! - [`commands`]: Interactive command parsing and handling
//! - [`input`]: Choosing what a non-interactive run sends

pub mod commands;
pub mod config;
pub mod input;
pub mod session;
pub mod summarize;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, ResponseMode, resolve_system_rule};
pub use input::{PlannedInput, plan_input};
pub use session::{ChatSession, DEFAULT_DOCUMENT_PROMPT, SessionState, SessionStats};
pub use summarize::summarize_document;
