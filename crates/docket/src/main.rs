//! Docket CLI - Document AI pipeline for OCR, classification, field
//! extraction, and LLM review.
//!
//! Docket takes a document image as input and walks it through
//! OCR → classify → confirm fields → extract → review, producing a
//! single JSON session result.
//!
//! # Usage
//!
//! ```bash
//! # Run the linear pipeline with interactive field confirmation
//! docket process invoice.png
//!
//! # Non-interactive: accept the classifier's suggestions
//! docket process invoice.png --yes --output session.json
//!
//! # Let an LLM drive the extract/review ordering
//! docket agent invoice.png --fields invoice_number,date,total
//!
//! # View configuration
//! docket config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Docket - Document AI pipeline for classification, extraction, and review.
#[derive(Parser, Debug)]
#[command(name = "docket")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the linear pipeline over a document image
    Process(cli::process::ProcessArgs),

    /// Run the agentic pipeline (LLM decides the tool order)
    Agent(cli::agent::AgentArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging from config, with CLI overrides.
    // Note: logging isn't initialized yet, so use eprintln for config warnings.
    let config = match docket_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `docket config path`."
            );
            docket_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Docket v{}", docket_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Process(args) => cli::process::execute(args, config).await,
        Commands::Agent(args) => cli::agent::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
