//! Command parsing for interactive mode.
//!
//! Lines starting with `/` (and the bare word `exit`) control the session instead of
//! being sent to the model.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Exit the chat.
    Quit,

    /// Display help information.
    Help,

    /// Save the conversation to a file immediately.
    Save(String),

    /// Display message count and model.
    Stats,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it should be sent
/// as a regular message.
///
/// # Examples
///
/// ```
/// # use tgpt::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("exit"), Some(ChatCommand::Quit));
/// assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
/// assert!(parse_command("Hello there").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    if input == "exit" {
        return Some(ChatCommand::Quit);
    }
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "help" | "?" => ChatCommand::Help,
        "stats" | "status" => ChatCommand::Stats,
        "save" => match argument {
            Some(path) => ChatCommand::Save(path.to_string()),
            None => ChatCommand::Invalid("/save requires a file path".to_string()),
        },
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };
    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /save <file>           Save the conversation to a file now
  /stats                 Show message count and model
  /help                  Show this help message
  /quit, /exit, exit     Exit the chat (Ctrl-D also works)"#
}
