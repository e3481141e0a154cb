//! Main entry point for the Careline translation proxy

#![forbid(unsafe_code)]

use clap::Parser;
use dotenvy::dotenv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use careline_translator::cli::commands::{self, Commands};

/// Careline - rate-limited healthcare translation proxy
#[derive(Parser, Debug)]
#[command(name = "careline-translator", version, about, long_about = None)]
struct Args {
    /// API key for the upstream service (optional, defaults to OPENAI_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    let crate_target = env!("CARGO_PKG_NAME").replace('-', "_");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}={},tower_http={}", crate_target, log_level, log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Override config with CLI args if provided
    if let Some(api_key) = args.api_key {
        std::env::set_var(careline_translator::core::config::API_KEY_VAR, api_key);
    }

    // Execute command
    match args.command {
        Some(Commands::Server {
            host,
            port,
            rate_limit,
            window_ms,
        }) => {
            commands::handle_server(host, port, rate_limit, window_ms).await?;
        }
        Some(Commands::Translate { text, from, to }) => {
            commands::handle_translate(text, from, to).await?;
        }
        Some(Commands::Languages) => {
            commands::handle_languages();
        }
        None => {
            println!("Please specify a command. Use --help for more information.");
        }
    }

    Ok(())
}
