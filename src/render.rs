//! Output rendering for chat replies.
//!
//! The session writes through the [`Renderer`] trait so that tests can capture output and
//! the binary can choose between colored and plain terminal text.

use std::io::{self, IsTerminal, Stdout, Write};

use crate::spinner::Spinner;

/// ANSI escape code for bold text (used for reply labels).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for blue text (used for the user's prompt label).
const ANSI_BLUE: &str = "\x1b[34m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

const PROGRESS_LABEL: &str = "Loading";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print a chunk of response text.
    ///
    /// This is called once per delta while streaming, or once with the whole reply.
    fn print_text(&mut self, text: &str);

    /// Print the label that introduces a reply, such as `AI:`.
    fn print_label(&mut self, label: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Show a progress indicator until [`Renderer::stop_progress`] is called.
    fn start_progress(&mut self);

    /// Remove the progress indicator, if one is showing.
    fn stop_progress(&mut self);

    /// Called when a response is complete.
    fn finish_response(&mut self);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    show_progress: bool,
    spinner: Option<Spinner>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    ///
    /// The progress indicator is shown only when stdout is a terminal.
    pub fn with_color(use_color: bool) -> Self {
        let stdout = io::stdout();
        let show_progress = stdout.is_terminal();
        Self {
            stdout,
            use_color,
            show_progress,
            spinner: None,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Formats the interactive prompt label for the user.
    pub fn prompt_label(&self, label: &str) -> String {
        if self.use_color {
            format!("{ANSI_BOLD}{ANSI_BLUE}{label}{ANSI_RESET} ")
        } else {
            format!("{label} ")
        }
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        print!("{text}");
        self.flush();
    }

    fn print_label(&mut self, label: &str) {
        if self.use_color {
            print!("{ANSI_BOLD}{label}{ANSI_RESET} ");
        } else {
            print!("{label} ");
        }
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.stop_progress();
        if self.use_color {
            eprintln!("\n{ANSI_RED}Error:{ANSI_RESET} {error}");
        } else {
            eprintln!("\nError: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        println!("{info}");
    }

    fn start_progress(&mut self) {
        self.stop_progress();
        if !self.show_progress {
            return;
        }
        self.spinner = Some(Spinner::start(PROGRESS_LABEL));
    }

    fn stop_progress(&mut self) {
        if let Some(mut spinner) = self.spinner.take() {
            spinner.stop();
        }
    }

    fn finish_response(&mut self) {
        self.stop_progress();
        println!();
        self.flush();
    }
}
