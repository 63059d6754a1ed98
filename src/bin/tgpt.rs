//! Terminal client for chat-completions endpoints.
//!
//! # Usage
//!
//! ```bash
//! # One question, streamed
//! tgpt "What is the capital of France?"
//!
//! # Whole reply at once, without the progress indicator
//! tgpt --whole "Write a haiku about rust"
//!
//! # One independent question per piped line
//! cat questions.txt | tgpt
//!
//! # Ask about a whole document; long documents are summarized first
//! curl -s https://example.com | tgpt --block "What is this page about?"
//!
//! # Interactive conversation remembered across runs
//! tgpt --interactive --memory chat.json
//! ```
//!
//! # Commands
//!
//! While chatting interactively:
//! - `/help` - Show available commands
//! - `/save <file>` - Save the conversation now
//! - `/stats` - Show session statistics
//! - `/quit`, `/exit` or `exit` - Exit the application

use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::Path;
use std::process;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use tgpt::ChatClient;
use tgpt::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, PlannedInput, Renderer,
    help_text, parse_command, plan_input,
};
use tgpt::settings::{AUTH_KEY_ENV, PROXY_FILE, SettingsStore, read_proxy_file};

const USAGE: &str = "tgpt [OPTIONS] [PROMPT]";

/// Exit status after an interrupt, as a shell would report SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Main entry point for the tgpt application.
#[tokio::main]
async fn main() {
    init_tracing();
    let (args, free) = ChatArgs::from_command_line_relaxed(USAGE);
    if args.version {
        println!("tgpt {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    if let Err(err) = ctrlc::set_handler(|| process::exit(INTERRUPTED_EXIT_CODE)) {
        tracing::warn!(error = %err, "could not install interrupt handler");
    }

    if let Err(err) = run(args, free).await {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tgpt=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: ChatArgs, free: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    if free.len() > 1 {
        print_usage();
        return Err(format!("expected at most one prompt, got {}", free.len()).into());
    }
    let prompt = free
        .into_iter()
        .next()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    let store = match &args.config {
        Some(path) => SettingsStore::new(path),
        None => SettingsStore::new(SettingsStore::default_path()?),
    };
    let settings = store.read_or_create()?;
    let credential = settings.credential(env::var(AUTH_KEY_ENV).ok().as_deref())?;

    let mut config = ChatConfig::resolve(args, &settings)?;
    if config.proxy.is_none() {
        config.proxy = read_proxy_file(Path::new(PROXY_FILE))?;
    }
    let client = ChatClient::with_options(
        &credential,
        Some(&config.endpoint),
        config.proxy.as_deref(),
        None,
    )?;
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let piped = !io::stdin().is_terminal();
    let interactive = config.interactive;
    let block = config.block;
    let mut session = ChatSession::new(client, config)?;

    if interactive {
        if piped {
            print_usage();
            return Err("interactive mode needs a terminal on stdin".into());
        }
        return interactive_loop(&mut session, &mut renderer).await;
    }

    let piped_input = if piped {
        let mut input = Vec::new();
        io::stdin().read_to_end(&mut input)?;
        Some(input)
    } else {
        None
    };
    match plan_input(prompt, block, piped_input)? {
        PlannedInput::Prompt(prompt) => {
            session.await_input();
            session.send(&prompt, &mut renderer).await?;
        }
        PlannedInput::Document { prompt, document } => {
            session.await_input();
            session
                .send_with_document(prompt.as_deref(), &document, &mut renderer)
                .await?;
        }
        PlannedInput::Lines(lines) => {
            for line in lines {
                let mut fork = session.fork();
                fork.await_input();
                fork.send(&line, &mut renderer).await?;
            }
        }
        PlannedInput::Usage => print_usage(),
    }
    session.terminate();
    Ok(())
}

async fn interactive_loop(
    session: &mut ChatSession<ChatClient>,
    renderer: &mut PlainTextRenderer,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rl = DefaultEditor::new()?;
    let user_label = renderer.prompt_label(&session.config().user_label());
    let ai_label = session.config().ai_label();

    renderer.print_info(&format!(
        "Interactive mode started (model: {}). Type /help for commands, exit to quit.\n",
        session.conversation().model()
    ));

    loop {
        session.await_input();
        match rl.readline(&user_label) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            renderer.print_info("Exiting...");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Save(path) => match session.save_to(&path) {
                            Ok(()) => renderer.print_info(&format!("Conversation saved to {path}")),
                            Err(err) => renderer
                                .print_error(&format!("Failed to save conversation: {err}")),
                        },
                        ChatCommand::Stats => print_stats(session),
                        ChatCommand::Invalid(message) => renderer.print_error(&message),
                    }
                    continue;
                }

                renderer.print_label(&ai_label);
                if let Err(e) = session.send(line, renderer).await {
                    renderer.print_error(&e.to_string());
                }
                println!();
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }
    session.terminate();
    Ok(())
}

fn print_stats(session: &ChatSession<ChatClient>) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Model: {}", stats.model);
    println!("      Temperature: {:.2}", stats.temperature);
    println!("      Messages: {}", stats.message_count);
    println!("      Turns: {}", stats.turns);
    match stats.memory_path {
        Some(ref path) => println!("      Memory file: {}", path.display()),
        None => println!("      Memory file: (disabled)"),
    }
}

fn print_usage() {
    eprintln!("Usage: {USAGE}");
    eprintln!("Pass a prompt, pipe text on stdin, or use --interactive. See --help for options.");
}
