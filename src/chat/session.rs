//! Core chat session management.
//!
//! A [`ChatSession`] owns one conversation and drives it turn by turn: it folds user
//! input (summarizing oversized documents first) into the history, streams the reply to a
//! [`Renderer`], appends the reply, and persists the history when a memory file is set.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::chat::config::{ChatConfig, ResponseMode};
use crate::chat::summarize::{SUMMARY_ACKNOWLEDGEMENT, summarize_document, summary_message};
use crate::chunker;
use crate::client::{Completion, DeltaCallback};
use crate::error::Result;
use crate::observability::SESSION_TURNS;
use crate::pretreatment;
use crate::render::Renderer;
use crate::types::Conversation;

/// Question asked about a summarized document when the user gave none.
pub const DEFAULT_DOCUMENT_PROMPT: &str = "Give me an overview of this document.";

/// Where a session is in its turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingInput,
    /// Preparing the user message, including any summarization.
    Dispatching,
    Streaming,
    /// The last turn finished, successfully or not.
    Settled,
    Terminated,
}

/// Snapshot of a session for `/stats`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// The model used for the session.
    pub model: String,
    /// The number of messages in the conversation.
    pub message_count: usize,
    /// Completed and failed turns sent by this session.
    pub turns: u64,
    pub temperature: f32,
    /// The memory file, if any.
    pub memory_path: Option<PathBuf>,
}

/// A conversation plus the machinery to advance it.
pub struct ChatSession<C: Completion> {
    client: Arc<C>,
    config: ChatConfig,
    conversation: Conversation,
    state: SessionState,
    turns: u64,
}

impl<C: Completion> ChatSession<C> {
    /// Creates a new chat session with the given client and configuration.
    ///
    /// If the configuration names a memory file that exists, the conversation is loaded
    /// from it; otherwise a fresh one is built from the configuration.
    ///
    /// # Errors
    ///
    /// Returns a malformed-state error if the memory file cannot be parsed.
    pub fn new(client: C, config: ChatConfig) -> Result<Self> {
        Self::with_shared_client(Arc::new(client), config)
    }

    /// Like [`ChatSession::new`], for a client shared with other sessions.
    pub fn with_shared_client(client: Arc<C>, config: ChatConfig) -> Result<Self> {
        let conversation = match &config.memory_path {
            Some(path) if path.exists() => {
                let conversation = Conversation::load(path)?;
                tracing::debug!(
                    path = %path.display(),
                    messages = conversation.len(),
                    "loaded conversation memory"
                );
                conversation
            }
            _ => config.base_conversation()?,
        };
        Ok(Self::with_conversation(client, config, conversation))
    }

    /// Creates a session around an existing conversation.
    pub fn with_conversation(client: Arc<C>, config: ChatConfig, conversation: Conversation) -> Self {
        Self {
            client,
            config,
            conversation,
            state: SessionState::Idle,
            turns: 0,
        }
    }

    /// An independent copy of this session that never writes the memory file.
    pub fn fork(&self) -> Self {
        let config = self.config.clone().with_memory_path(None);
        Self::with_conversation(self.client.clone(), config, self.conversation.clone())
    }

    /// Sends one unit of user input and renders the reply.
    ///
    /// Input longer than the chunk size is treated as a document (see
    /// [`ChatSession::send_with_document`]).
    pub async fn send(&mut self, input: &str, renderer: &mut dyn Renderer) -> Result<String> {
        self.state = SessionState::Dispatching;
        if chunker::exceeds(input, self.config.chunk_size) {
            return self.send_with_document(None, input.as_bytes(), renderer).await;
        }
        self.conversation.add_user_message(input);
        self.complete(renderer).await
    }

    /// Asks `prompt` about `document` and renders the reply.
    ///
    /// The document is normalized first.  If it still exceeds the chunk size it is
    /// summarized, and the history gains the summary, a fixed acknowledgement, and then
    /// the prompt (or [`DEFAULT_DOCUMENT_PROMPT`]).  Otherwise the prompt and document
    /// are sent together as a single user message.
    pub async fn send_with_document(
        &mut self,
        prompt: Option<&str>,
        document: &[u8],
        renderer: &mut dyn Renderer,
    ) -> Result<String> {
        self.state = SessionState::Dispatching;
        let prompt = prompt.map(str::trim).filter(|p| !p.is_empty());
        let document = pretreatment::normalize(document)?;

        if chunker::exceeds(&document, self.config.chunk_size) {
            if self.config.mode == ResponseMode::Streamed {
                renderer.start_progress();
            }
            let summary = summarize_document(
                self.client.as_ref(),
                &self.conversation,
                &document,
                self.config.chunk_size,
            )
            .await;
            let summary = match summary {
                Ok(summary) => summary,
                Err(err) => {
                    renderer.stop_progress();
                    self.state = SessionState::Settled;
                    return Err(err);
                }
            };
            self.conversation.add_user_message(summary_message(&summary));
            self.conversation.add_assistant_message(SUMMARY_ACKNOWLEDGEMENT);
            self.conversation
                .add_user_message(prompt.unwrap_or(DEFAULT_DOCUMENT_PROMPT));
        } else {
            let message = match prompt {
                Some(prompt) => format!("{prompt}\n\n{document}"),
                None => document,
            };
            self.conversation.add_user_message(message);
        }
        self.complete(renderer).await
    }

    /// Streams a reply to the current history and settles the turn.
    async fn complete(&mut self, renderer: &mut dyn Renderer) -> Result<String> {
        self.state = SessionState::Streaming;
        self.turns += 1;
        SESSION_TURNS.click();

        let result = match self.config.mode {
            ResponseMode::Whole => self.client.stream(&self.conversation, None).await,
            ResponseMode::Quiet => {
                let sink: DeltaCallback<'_> =
                    &mut |text: &str| renderer.print_text(text);
                self.client.stream(&self.conversation, Some(sink)).await
            }
            ResponseMode::Streamed => {
                renderer.start_progress();
                let mut waiting = true;
                let result = {
                    let sink: DeltaCallback<'_> = &mut |text: &str| {
                        if waiting {
                            renderer.stop_progress();
                            waiting = false;
                        }
                        renderer.print_text(text);
                    };
                    self.client.stream(&self.conversation, Some(sink)).await
                };
                if waiting {
                    renderer.stop_progress();
                }
                result
            }
        };
        self.state = SessionState::Settled;

        let reply = result?;
        if self.config.mode == ResponseMode::Whole {
            renderer.print_text(reply.trim());
        }
        renderer.finish_response();
        self.conversation.add_assistant_message(reply.clone());
        self.persist()?;
        Ok(reply)
    }

    fn persist(&self) -> Result<()> {
        match &self.config.memory_path {
            Some(path) => self.conversation.save(path),
            None => Ok(()),
        }
    }

    /// Saves the conversation to the specified path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.conversation.save(path)
    }

    /// Marks the session as waiting for the next input.
    pub fn await_input(&mut self) {
        self.state = SessionState::AwaitingInput;
    }

    /// Ends the session.
    pub fn terminate(&mut self) {
        self.state = SessionState::Terminated;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the current number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.conversation.model().to_string(),
            message_count: self.message_count(),
            turns: self.turns,
            temperature: self.conversation.temperature(),
            memory_path: self.config.memory_path.clone(),
        }
    }
}
