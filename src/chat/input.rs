//! Choosing what a non-interactive run sends.

use crate::error::Result;

/// The unit of work a non-interactive run dispatches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedInput {
    /// Send the command-line prompt as a single turn.
    Prompt(String),
    /// Send the piped bytes as one document, optionally with a prompt.
    Document {
        prompt: Option<String>,
        document: Vec<u8>,
    },
    /// Send each non-empty piped line as its own independent turn.
    Lines(Vec<String>),
    /// Nothing to send.
    Usage,
}

/// Decides what to send from the positional `prompt` and whatever was read from stdin.
///
/// `piped` is `None` when stdin is a terminal.  Piped input with no content (a closed pipe
/// or `/dev/null`) falls back to the prompt.
///
/// # Errors
///
/// Returns an encoding error when line-mode input is not UTF-8.
pub fn plan_input(
    prompt: Option<String>,
    block: bool,
    piped: Option<Vec<u8>>,
) -> Result<PlannedInput> {
    let Some(input) = piped else {
        return Ok(prompt.map_or(PlannedInput::Usage, PlannedInput::Prompt));
    };

    if block {
        if input.iter().all(u8::is_ascii_whitespace) {
            return Ok(prompt.map_or(PlannedInput::Usage, PlannedInput::Prompt));
        }
        return Ok(PlannedInput::Document {
            prompt,
            document: input,
        });
    }

    let text = std::str::from_utf8(&input)?;
    let lines: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match &prompt {
            Some(prompt) => format!("{prompt}\n{line}"),
            None => line.to_string(),
        })
        .collect();
    if lines.is_empty() {
        return Ok(prompt.map_or(PlannedInput::Usage, PlannedInput::Prompt));
    }
    Ok(PlannedInput::Lines(lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello() -> Option<String> {
        Some("hello".to_string())
    }

    #[test]
    fn terminal_stdin_uses_the_prompt() {
        assert_eq!(
            plan_input(hello(), false, None).unwrap(),
            PlannedInput::Prompt("hello".to_string())
        );
        assert_eq!(plan_input(None, false, None).unwrap(), PlannedInput::Usage);
    }

    #[test]
    fn empty_pipe_falls_back_to_the_prompt() {
        for input in [Vec::new(), b"\n  \n".to_vec()] {
            assert_eq!(
                plan_input(hello(), false, Some(input.clone())).unwrap(),
                PlannedInput::Prompt("hello".to_string())
            );
            assert_eq!(
                plan_input(hello(), true, Some(input.clone())).unwrap(),
                PlannedInput::Prompt("hello".to_string())
            );
            assert_eq!(plan_input(None, false, Some(input)).unwrap(), PlannedInput::Usage);
        }
    }

    #[test]
    fn piped_lines_are_prefixed_with_the_prompt() {
        let planned = plan_input(hello(), false, Some(b"one\n\n  two  \n".to_vec())).unwrap();
        assert_eq!(
            planned,
            PlannedInput::Lines(vec!["hello\none".to_string(), "hello\ntwo".to_string()])
        );
        let planned = plan_input(None, false, Some(b"one\n".to_vec())).unwrap();
        assert_eq!(planned, PlannedInput::Lines(vec!["one".to_string()]));
    }

    #[test]
    fn block_mode_keeps_the_document_whole() {
        let planned = plan_input(None, true, Some(b"<p>\xff</p>".to_vec())).unwrap();
        assert_eq!(
            planned,
            PlannedInput::Document {
                prompt: None,
                document: b"<p>\xff</p>".to_vec(),
            }
        );
    }

    #[test]
    fn line_mode_requires_utf8() {
        let err = plan_input(None, false, Some(b"\xff\n".to_vec())).unwrap_err();
        assert!(matches!(err, crate::Error::Encoding { .. }));
    }
}
