use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Message, Role};

/// Model requested when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Sampling temperature used when none is configured.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Inclusive bounds accepted for the sampling temperature.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

/// An ordered, append-only message history plus the request parameters sent with it.
///
/// The serialized form is both the body of a chat-completion request and the on-disk
/// memory format, so field order is fixed: `model`, `messages`, `stream`, `temperature`.
/// `Clone` is a deep copy; a clone shares nothing with its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Conversation {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    temperature: f32,
}

impl Conversation {
    /// Creates an empty conversation with default parameters.
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            messages: Vec::new(),
            stream: true,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Sets the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets whether the endpoint should stream its answer.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Sets the sampling temperature.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `temperature` is outside `0.0..=2.0`.
    pub fn with_temperature(mut self, temperature: f32) -> Result<Self> {
        validate_temperature(temperature)?;
        self.temperature = temperature;
        Ok(self)
    }

    /// Returns an empty conversation that shares this one's request parameters.
    pub fn empty_like(&self) -> Self {
        Self {
            model: self.model.clone(),
            messages: Vec::new(),
            stream: self.stream,
            temperature: self.temperature,
        }
    }

    /// Appends a message.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    /// Appends a system message.
    pub fn add_system_message(&mut self, content: impl Into<String>) {
        self.add_message(Role::System, content);
    }

    /// Appends a user message.
    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.add_message(Role::User, content);
    }

    /// Appends an assistant message.
    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.add_message(Role::Assistant, content);
    }

    /// The messages in conversation order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The number of messages in the conversation.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if no message has been added.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The requested model.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the request asks for a streamed answer.
    pub fn stream_enabled(&self) -> bool {
        self.stream
    }

    /// The sampling temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Serializes to the canonical JSON form.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|err| {
            Error::serialization("failed to serialize conversation", Some(Box::new(err)))
        })
    }

    /// Parses the canonical JSON form.
    ///
    /// Unknown fields, missing fields, unknown roles, and out-of-range temperatures are
    /// all rejected; nothing is silently dropped.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let conversation: Conversation = serde_json::from_slice(bytes).map_err(|err| {
            Error::malformed_state(
                format!("conversation does not match the expected schema: {err}"),
                Some(Box::new(err)),
            )
        })?;
        check_temperature(conversation.temperature)
            .map_err(|message| Error::malformed_state(message, None))?;
        Ok(conversation)
    }

    /// Writes the conversation to `path`.
    ///
    /// The bytes go to a sibling temporary file which is synced and then renamed over
    /// `path`, so a concurrent reader sees either the old or the new content.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let data = self.serialize()?;
        let tmp_path = temp_path_for(path);
        let written = (|| -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
            fs::rename(&tmp_path, path)
        })();
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::io(
                format!("failed to save conversation to {}", path.display()),
                err,
            ));
        }
        Ok(())
    }

    /// Reads a conversation previously written by [`Conversation::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|err| {
            Error::io(
                format!("failed to read conversation from {}", path.display()),
                err,
            )
        })?;
        Self::deserialize(&data)
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Rejects a sampling temperature outside [`TEMPERATURE_RANGE`] with a configuration error.
pub fn validate_temperature(temperature: f32) -> Result<()> {
    check_temperature(temperature)
        .map_err(|message| Error::configuration(message, Some("temperature".to_string())))
}

fn check_temperature(temperature: f32) -> std::result::Result<(), String> {
    if TEMPERATURE_RANGE.contains(&temperature) {
        Ok(())
    } else {
        Err(format!(
            "temperature {temperature} is outside {}..={}",
            TEMPERATURE_RANGE.start(),
            TEMPERATURE_RANGE.end()
        ))
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "conversation".to_string());
    path.with_file_name(format!(".{file_name}.tmp-{}", std::process::id()))
}
