//! CLI command definitions and handlers

use clap::Subcommand;

use crate::core::config::ProxyConfig;

/// Commands for the translation proxy
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP translation proxy
    Server {
        /// Bind address (default: 0.0.0.0)
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Listen port (default: 3000)
        #[arg(short, long, default_value_t = 3000)]
        port: u16,

        /// Requests allowed per client per window
        #[arg(long)]
        rate_limit: Option<u32>,

        /// Rate limit window in milliseconds
        #[arg(long)]
        window_ms: Option<u64>,
    },

    /// Translate a single piece of text and print the result
    Translate {
        /// Text to translate
        #[arg(short, long)]
        text: String,

        /// Source language (e.g. en)
        #[arg(short, long)]
        from: String,

        /// Target language (e.g. es)
        #[arg(long)]
        to: String,
    },

    /// List the languages offered to browser clients
    Languages,
}

/// Handle server command
pub async fn handle_server(
    host: String,
    port: u16,
    rate_limit: Option<u32>,
    window_ms: Option<u64>,
) -> anyhow::Result<()> {
    use crate::server::api::run_server;
    use tracing::info;

    let mut config = ProxyConfig::from_env()?;
    if let Some(limit) = rate_limit {
        config.rate_limit.max_requests = limit;
    }
    if let Some(window) = window_ms {
        config.rate_limit.window_ms = window;
    }
    config.validate()?;

    info!(
        "Rate limit: {} requests per {} ms, model {}",
        config.rate_limit.max_requests, config.rate_limit.window_ms, config.model
    );
    println!("🚀 Server starting on http://{}:{}", host, port);
    println!("🌐 Translate endpoint: POST http://{}:{}/translate", host, port);

    run_server(host, port, config).await?;

    Ok(())
}

/// Handle one-shot translate command
pub async fn handle_translate(text: String, from: String, to: String) -> anyhow::Result<()> {
    use crate::core::client::AsyncTranslator;
    use crate::core::models::TranslationRequest;

    let request = TranslationRequest::new(text, from, to).validate()?;
    let translator = AsyncTranslator::from_env()?;
    let result = translator.translate(&request).await?;

    println!("{}", result.translated);

    Ok(())
}

/// Handle languages command
pub fn handle_languages() {
    use crate::core::models::{INPUT_LANGUAGES, OUTPUT_LANGUAGES};

    println!("Input languages (speech recognition):");
    for lang in INPUT_LANGUAGES {
        println!("   {:<6} {}", lang.code, lang.name);
    }

    println!("\nOutput languages:");
    for lang in OUTPUT_LANGUAGES {
        println!("   {:<6} {}", lang.code, lang.name);
    }
}
