//! # Recall Node CLI
//!
//! Command-line interface for Recall, a memory-augmented assistant.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use tracing::info;

mod app;
mod commands;

/// CLI structure
#[derive(Parser, Debug)]
#[command(name = "recall")]
#[command(about = "Recall - conversational assistant with long-term memory")]
#[command(version)]
struct Cli {
    /// Output JSON format
    #[arg(long, global = true, help = "Output in JSON format")]
    json: bool,

    /// Configuration file (defaults to RECALL_CONFIG or recall.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Main commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive chat session
    Chat {
        /// User identifier
        #[arg(long, short)]
        user: String,
        /// Print the memories used for each response
        #[arg(long)]
        show_memories: bool,
    },

    /// Ask a single question
    Ask {
        /// User identifier
        #[arg(long, short)]
        user: String,
        /// The message to send
        #[arg(required = true)]
        message: Vec<String>,
    },

    /// Delete all memories of a user
    Clear {
        /// User identifier
        #[arg(long, short)]
        user: String,
    },

    /// Compare retrieval latency with and without the cache
    Bench {
        /// User identifier
        #[arg(long, short)]
        user: String,
        /// Number of distinct base queries
        #[arg(long, default_value_t = 10)]
        num_queries: usize,
        /// Repetition factor used to simulate cache hits
        #[arg(long, default_value_t = 2)]
        repeat_factor: usize,
        /// Cache size for the cached run
        #[arg(long, default_value_t = 200)]
        cache_size: usize,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    info!("Running command: {:?}", cli.command);

    if let Err(e) = run_command(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = app::load_config(cli.config.as_deref())?;
    let components = app::Components::build(config)?;

    match cli.command {
        Commands::Chat {
            user,
            show_memories,
        } => commands::chat::run(&components, &user, show_memories, cli.json).await,
        Commands::Ask { user, message } => {
            commands::ask::run(&components, &user, &message.join(" "), cli.json).await
        }
        Commands::Clear { user } => commands::clear::run(&components, &user, cli.json).await,
        Commands::Bench {
            user,
            num_queries,
            repeat_factor,
            cache_size,
        } => {
            let options = commands::bench::BenchOptions {
                num_queries,
                repeat_factor,
                cache_size,
            };
            commands::bench::run(&components, &user, options, cli.json).await
        }
    }
}
