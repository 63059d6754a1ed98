//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved configuration
//! that drives a session.  Command-line values win over the settings file, which wins
//! over built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use arrrg_derive::CommandLine;

use crate::chunker::DEFAULT_CHUNK_SIZE;
use crate::client::DEFAULT_ENDPOINT;
use crate::error::{Error, Result};
use crate::settings::{Settings, accept_proxy};
use crate::types::{Conversation, DEFAULT_MODEL, DEFAULT_TEMPERATURE, validate_temperature};

const DEFAULT_USER_LABEL: &str = "YOU:";
const DEFAULT_AI_LABEL: &str = "AI:";

/// Command-line arguments for the tgpt tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Print only the final reply.
    #[arrrg(flag, "Print the whole reply at once instead of streaming it")]
    pub whole: bool,

    /// Stream without the progress indicator.
    #[arrrg(flag, "Stream the reply without a progress indicator")]
    pub quiet: bool,

    #[arrrg(flag, "Start an interactive conversation")]
    pub interactive: bool,

    #[arrrg(flag, "Print the version and exit")]
    pub version: bool,

    /// Read all of stdin as a single document.
    #[arrrg(flag, "Treat piped input as one document instead of one prompt per line")]
    pub block: bool,

    #[arrrg(optional, "System role text, or a file containing it", "TEXT|PATH")]
    pub system_rule: Option<String>,

    #[arrrg(optional, "Load and save the conversation in this file", "PATH")]
    pub memory: Option<String>,

    #[arrrg(optional, "Name of the assistant", "NAME")]
    pub name: Option<String>,

    #[arrrg(optional, "Name of the user", "NAME")]
    pub user_name: Option<String>,

    #[arrrg(optional, "Model to use (default: gpt-3.5-turbo)", "MODEL")]
    pub model: Option<String>,

    /// Parsed as `f32` during resolution.
    #[arrrg(optional, "Sampling temperature between 0.0 and 2.0", "TEMP")]
    pub temperature: Option<String>,

    #[arrrg(optional, "Summarize piped documents longer than this many characters", "CHARS")]
    pub chunk_size: Option<usize>,

    #[arrrg(optional, "Proxy address (http://, https:// or socks5://)", "URL")]
    pub proxy: Option<String>,

    #[arrrg(optional, "Chat completions endpoint", "URL")]
    pub endpoint: Option<String>,

    #[arrrg(optional, "Settings file (default: <config dir>/tgpt/config.json)", "PATH")]
    pub config: Option<String>,

    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// How replies are written to the terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// Print only the final trimmed reply.
    Whole,
    /// Print each delta as it arrives, without a progress indicator.
    Quiet,
    /// Show a progress indicator until the first delta, then print deltas.
    #[default]
    Streamed,
}

/// Configuration for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    pub model: String,
    pub temperature: f32,
    pub endpoint: String,
    pub proxy: Option<String>,
    /// System role text, already read from disk if a path was given.
    pub system_prompt: Option<String>,
    pub ai_name: Option<String>,
    pub user_name: Option<String>,
    pub mode: ResponseMode,
    pub memory_path: Option<PathBuf>,
    pub chunk_size: usize,
    pub block: bool,
    pub interactive: bool,
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            proxy: None,
            system_prompt: None,
            ai_name: None,
            user_name: None,
            mode: ResponseMode::Streamed,
            memory_path: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            block: false,
            interactive: false,
            use_color: true,
        }
    }

    /// Starts from the values in the settings file.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            model: settings.model.clone(),
            temperature: settings.temperature,
            endpoint: settings.endpoint.clone(),
            proxy: settings.proxy.as_deref().and_then(accept_proxy),
            chunk_size: settings.chunk_size,
            ..Self::new()
        }
    }

    /// Resolves command-line arguments on top of `settings`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unparsable or out-of-range temperature or a
    /// zero chunk size.
    pub fn resolve(args: ChatArgs, settings: &Settings) -> Result<Self> {
        let mut config = Self::from_settings(settings);
        if let Some(model) = args.model {
            config.model = model;
        }
        if let Some(temperature) = args.temperature {
            config.temperature = temperature.trim().parse().map_err(|_| {
                Error::configuration(
                    format!("temperature must be a number, got {temperature:?}"),
                    Some("temperature".to_string()),
                )
            })?;
        }
        if let Some(chunk_size) = args.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(endpoint) = args.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(proxy) = args.proxy.as_deref().and_then(accept_proxy) {
            config.proxy = Some(proxy);
        }
        config.system_prompt = args
            .system_rule
            .as_deref()
            .map(resolve_system_rule)
            .filter(|rule| !rule.is_empty());
        config.ai_name = args.name.filter(|n| !n.trim().is_empty());
        config.user_name = args.user_name.filter(|n| !n.trim().is_empty());
        config.mode = if args.whole {
            ResponseMode::Whole
        } else if args.quiet {
            ResponseMode::Quiet
        } else {
            ResponseMode::Streamed
        };
        config.memory_path = args.memory.map(PathBuf::from);
        config.block = args.block;
        config.interactive = args.interactive;
        config.use_color = !args.no_color;

        validate_temperature(config.temperature)?;
        if config.chunk_size == 0 {
            return Err(Error::configuration(
                "chunk size must be at least 1",
                Some("chunk_size".to_string()),
            ));
        }
        Ok(config)
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_ai_name(mut self, name: impl Into<String>) -> Self {
        self.ai_name = Some(name.into());
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the memory file that is loaded at start and saved after every reply.
    pub fn with_memory_path(mut self, path: Option<PathBuf>) -> Self {
        self.memory_path = path;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Text of the system message: name lines followed by the system prompt.
    pub fn system_text(&self) -> String {
        let mut lines = Vec::new();
        if let Some(name) = &self.ai_name {
            lines.push(format!("Your name is {name}"));
        }
        if let Some(name) = &self.user_name {
            lines.push(format!("User name is {name}"));
        }
        if let Some(prompt) = &self.system_prompt {
            lines.push(prompt.clone());
        }
        lines.join("\n").trim().to_string()
    }

    /// A fresh conversation carrying this configuration's parameters and system text.
    pub fn base_conversation(&self) -> Result<Conversation> {
        let mut conversation = Conversation::new()
            .with_model(self.model.clone())
            .with_temperature(self.temperature)?;
        let system = self.system_text();
        if !system.is_empty() {
            conversation.add_system_message(system);
        }
        Ok(conversation)
    }

    /// Label shown before the user's input.
    pub fn user_label(&self) -> String {
        label_for(self.user_name.as_deref(), DEFAULT_USER_LABEL)
    }

    /// Label shown before each reply.
    pub fn ai_label(&self) -> String {
        label_for(self.ai_name.as_deref(), DEFAULT_AI_LABEL)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Interprets a `--system-rule` value.
///
/// A path to an existing regular file yields that file's contents, or empty text if it
/// cannot be read.  Anything else is taken literally.
pub fn resolve_system_rule(value: &str) -> String {
    let path = Path::new(value);
    if path.is_file() {
        match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "unreadable system rule file");
                String::new()
            }
        }
    } else {
        value.to_string()
    }
}

fn label_for(name: Option<&str>, default: &str) -> String {
    match name {
        Some(name) => format!("{name}:"),
        None => default.to_string(),
    }
}
