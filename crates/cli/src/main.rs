//! careerchat CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Create the config file and profile directory
//! - `chat`     — Interactive chat or single-message mode
//! - `serve`    — Start the HTTP chat API
//! - `context`  — Load the professional context and show what was read

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "careerchat",
    about = "careerchat — a grounded, quality-gated career chatbot",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config file and profile directory
    Onboard,

    /// Chat with the persona from the terminal
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Start the HTTP chat API
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Load the professional context and print a summary
    Context,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Context => commands::context::run().await?,
    }

    Ok(())
}
