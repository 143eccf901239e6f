//! tally - terminal chat with per-turn token and cost tracking
//!
//! ## Usage
//!
//! ```bash
//! # Chat with the model from ~/.tally/config.yaml (gpt-3.5-turbo by default)
//! OPENAI_API_KEY=sk-... tally
//!
//! # Pick a model and pass the key explicitly
//! tally --model gpt-4 --api-key sk-...
//!
//! # Offline, with canned responses
//! tally --mock
//!
//! # With verbose logging
//! tally -v --log-dir /tmp/tally-logs
//! ```

mod command;
mod input;
mod render;
mod repl;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use crossterm::style::Stylize;
use tally_chat::{ChatBackend, ChatConfig, ChatError, MockConfig, ProviderConfig};
use tally_core::{LogGuard, init_logging};
use tally_cost::TiktokenTokenizer;
use tracing::{error, info, warn};

use crate::repl::Repl;

/// Chat with an OpenAI model while tracking tokens, cost and context usage
/// for every message.
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.tally/logs/)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Config file (defaults to ~/.tally/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model to chat with, overriding the config file and TALLY_MODEL
    #[arg(short, long)]
    model: Option<String>,

    /// OpenAI API key, overriding the environment variable
    #[arg(long)]
    api_key: Option<String>,

    /// Use the offline mock provider
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    info!("Starting tally");

    let backend = match build_backend(&cli) {
        Ok(backend) => backend,
        Err(e) => {
            error!("startup failed: {:#}", e);
            print_startup_error(&e);
            return ExitCode::from(1);
        }
    };

    let lines = match input::spawn_line_reader(std::io::BufReader::new(std::io::stdin())) {
        Ok(lines) => lines,
        Err(e) => {
            error!("failed to start input reader: {}", e);
            eprintln!("Error: {}", e);
            return ExitCode::from(1);
        }
    };

    let mut repl = Repl::new(backend, std::io::stdout());
    match repl.run(lines).await {
        Ok(()) => {
            info!("tally exited normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("tally error: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

/// Set up logging based on CLI arguments.
fn setup_logging(cli: &Cli) -> tally_core::Result<LogGuard> {
    init_logging(cli.log_dir.clone(), cli.verbose > 0)
}

/// Load configuration, apply CLI overrides and create the backend.
fn build_backend(cli: &Cli) -> anyhow::Result<ChatBackend> {
    let mut config = ChatConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }
    if cli.mock {
        config = config.with_provider(ProviderConfig::Mock(MockConfig::default()));
    }
    config.validate().context("validating configuration")?;

    let tokenizer = TiktokenTokenizer::new();
    if let Err(e) = tokenizer.preload(&config.model) {
        warn!(model = %config.model, error = %e, "tokenizer not available");
        eprintln!("{}", e.friendly_message().yellow());
    }

    let backend = ChatBackend::new(config, Arc::new(tokenizer), cli.api_key.as_deref())?;
    Ok(backend)
}

fn print_startup_error(err: &anyhow::Error) {
    match err.downcast_ref::<ChatError>() {
        Some(chat_err) => {
            eprintln!("{}", chat_err.friendly_message().red());
            eprintln!("{}", chat_err.suggested_action());
        }
        None => eprintln!("{} {:#}", "Error:".red(), err),
    }
}
