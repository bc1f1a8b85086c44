//! CLI application for purchase-order extraction and audit.

mod commands;
mod llm;
mod recognizer;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{ask, batch, config, tools};

/// Purchase-order audit - extract line items and check their arithmetic
#[derive(Parser)]
#[command(name = "poaudit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and audit a batch of documents
    Batch(batch::BatchArgs),

    /// List or call ledger tools against a saved ledger
    Tools(tools::ToolsArgs),

    /// Ask a question about a saved ledger
    Ask(ask::AskArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Batch(args) => batch::run(args, cli.config.as_deref()).await,
        Commands::Tools(args) => tools::run(args, cli.config.as_deref()).await,
        Commands::Ask(args) => ask::run(args, cli.config.as_deref(), cli.verbose > 0).await,
        Commands::Config(args) => config::run(args, cli.config.as_deref()).await,
    }
}
