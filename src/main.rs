// MateTutor - Socratic math tutor for the ICFES exam
// Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use matetutor::cli::{run_once, Repl};
use matetutor::config::load_config;
use matetutor::logging;
use matetutor::providers::create_provider_from_entry;
use matetutor::tutor::{TutorOptions, TutorSession};

#[derive(Parser, Debug)]
#[command(name = "matetutor", version, about = "Tu tutor de matemáticas para el ICFES")]
struct Cli {
    /// Path to the config file (default: ~/.matetutor/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Provider to use: gemini, groq or openai
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model override for the selected provider
    #[arg(long, global = true)]
    model: Option<String>,

    /// Wait for the whole reply instead of streaming it
    #[arg(long, global = true)]
    no_stream: bool,

    /// Debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start an interactive tutoring session (default)
    Chat,
    /// Ask a single question and print the reply
    Ask {
        /// The question
        #[arg(default_value = "")]
        text: String,
        /// Photo of the problem (PNG or JPEG)
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(provider) = &cli.provider {
        config.select_provider(provider)?;
    }
    if let Some(model) = &cli.model {
        if let Some(entry) = config.active_entry_mut() {
            entry.set_model(model.clone());
        }
    }
    if cli.no_stream {
        config.streaming_enabled = false;
    }
    config.validate().context("Configuration validation failed")?;

    let entry = config
        .active_entry()
        .context("No provider configured")?;
    let provider = create_provider_from_entry(entry)?;
    let session = TutorSession::new(provider, TutorOptions::from_config(&config));

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let mut repl = Repl::new(config, session);
            repl.run().await?;
        }
        Commands::Ask { text, image } => {
            let mut session = session;
            let answered = run_once(&mut session, &text, image.as_deref()).await?;
            if !answered {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
