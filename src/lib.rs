//! Careline - rate-limited healthcare translation proxy
//!
//! Browser voice clients send transcribed text here; the proxy validates it,
//! applies a per-client fixed-window rate limit, asks a chat-completion API for
//! the translation and relays the result.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod core;
pub mod server;

// Re-export key types for convenience
pub use crate::core::{
    client::{AsyncTranslator, CompletionBackend, HttpCompletionBackend},
    config::ProxyConfig,
    errors::ProxyError,
    models::{TranslationRequest, TranslationResult},
    rate_limiter::{InMemoryRateLimiter, RateLimitStore},
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
