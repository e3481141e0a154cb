//! HTTP API server implementation

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::core::client::AsyncTranslator;
use crate::core::config::{ProxyConfig, RateLimitConfig};
use crate::core::errors::{ProxyError, Result};
use crate::core::models::{Language, TranslationRequest, TranslationResult, INPUT_LANGUAGES, OUTPUT_LANGUAGES};
use crate::core::rate_limiter::{InMemoryRateLimiter, RateLimitStore, UNKNOWN_CLIENT};

/// Application state
#[derive(Clone)]
pub struct AppState {
    translator: AsyncTranslator,
    limiter: Arc<dyn RateLimitStore>,
    rate_limit: RateLimitConfig,
}

impl AppState {
    /// State over a translator and an injected rate limit store
    pub fn new(translator: AsyncTranslator, limiter: Arc<dyn RateLimitStore>) -> Self {
        let rate_limit = translator.config().rate_limit;
        Self {
            translator,
            limiter,
            rate_limit,
        }
    }
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

/// Language catalogue response
#[derive(Serialize)]
struct LanguagesResponse {
    input: &'static [Language],
    output: &'static [Language],
}

/// Rate limit key for a request: forwarded-for, then real-ip, then the shared bucket
pub fn client_identifier(headers: &HeaderMap) -> String {
    ["x-forwarded-for", "x-real-ip"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .find(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Health check handler
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Language catalogue handler
async fn languages() -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        input: INPUT_LANGUAGES,
        output: OUTPUT_LANGUAGES,
    })
}

/// Translation handler
async fn translate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<TranslationRequest>, JsonRejection>,
) -> Response {
    match handle_translate(&state, &headers, payload).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            if let ProxyError::InternalError(_) | ProxyError::HttpError(_) = &e {
                warn!("Translation error: {}", e);
            }
            e.into_response()
        }
    }
}

async fn handle_translate(
    state: &AppState,
    headers: &HeaderMap,
    payload: std::result::Result<Json<TranslationRequest>, JsonRejection>,
) -> Result<TranslationResult> {
    let Json(payload) = payload.map_err(|rejection| {
        debug!("Rejected translation body: {}", rejection);
        ProxyError::missing_fields()
    })?;
    let request = payload.validate()?;

    let client = client_identifier(headers);
    let now = Utc::now();
    let decision = state
        .limiter
        .check_at(
            &client,
            state.rate_limit.max_requests,
            state.rate_limit.window(),
            now,
        )
        .await;

    if !decision.allowed {
        warn!("Rate limit exceeded for client {}", client);
        return Err(ProxyError::RateLimitExceeded {
            retry_after_secs: Some(decision.retry_after_secs(now)),
        });
    }

    state.translator.translate(&request).await
}

fn panic_response(_: Box<dyn std::any::Any + Send + 'static>) -> Response {
    ProxyError::InternalError("handler panicked".to_string()).into_response()
}

/// Build the router over the given state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/languages", get(languages))
        .route("/translate", post(translate))
        .route("/api/Translate", post(translate))
        .with_state(Arc::new(state))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Periodically drop expired rate limit records
pub fn spawn_sweeper(limiter: Arc<dyn RateLimitStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.sweep_expired(Utc::now()).await;
            if removed > 0 {
                debug!("Rate limit sweep removed {} records", removed);
            }
        }
    })
}

/// Run the HTTP server
pub async fn run_server(host: String, port: u16, config: ProxyConfig) -> anyhow::Result<()> {
    let sweep_every = Duration::from_secs(config.rate_limit.sweep_interval_secs.max(1));

    // Create translator
    let translator = AsyncTranslator::from_config(config)?;
    let limiter: Arc<dyn RateLimitStore> = Arc::new(InMemoryRateLimiter::new());

    if ProxyConfig::api_key().is_none() {
        warn!("OPENAI_API_KEY is not set; translation requests will fail until it is configured");
    }

    let sweeper = spawn_sweeper(limiter.clone(), sweep_every);
    let app = build_router(AppState::new(translator, limiter));

    // Bind address
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("Starting server on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app).await;
    sweeper.abort();
    served?;

    Ok(())
}
