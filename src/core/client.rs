//! Async translation client for the upstream chat-completion API

use async_trait::async_trait;
use axum::http::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::core::config::ProxyConfig;
use crate::core::errors::{ProxyError, Result};
use crate::core::models::{
    ChatCompletionRequest, ChatCompletionResponse, TranslationResult, ValidatedRequest,
};
use crate::core::prompt::build_messages;

/// Transport for a single chat completion call
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send one completion request. Non-2xx answers map to upstream errors.
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
        api_key: &str,
    ) -> Result<ChatCompletionResponse>;
}

/// HTTP backend speaking the OpenAI chat completions format
#[derive(Debug, Clone)]
pub struct HttpCompletionBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCompletionBackend {
    /// Create a backend with the configured timeout
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.api_endpoint.clone(),
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
        api_key: &str,
    ) -> Result<ChatCompletionResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            let body = response.json::<ChatCompletionResponse>().await?;
            return Ok(body);
        }

        // Clone status before consuming response
        let status_code = status.as_u16();
        let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
        let details = response
            .json::<serde_json::Value>()
            .await
            .unwrap_or_else(|_| serde_json::json!({}))
            .to_string();

        error!("Upstream API error: status {}, details {}", status_code, details);

        Err(upstream_error(status_code, reason, details))
    }
}

/// Map a non-2xx upstream answer onto the proxy error taxonomy
pub fn upstream_error(status: u16, reason: String, details: String) -> ProxyError {
    if status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
        ProxyError::UpstreamRateLimitExceeded { details }
    } else {
        ProxyError::UpstreamError {
            status,
            reason,
            details,
        }
    }
}

/// Where the upstream credential comes from
#[derive(Debug, Clone)]
pub enum ApiKeySource {
    /// Read `OPENAI_API_KEY` on every call
    Environment,
    /// Fixed value, `None` meaning unconfigured
    Fixed(Option<String>),
}

impl ApiKeySource {
    fn resolve(&self) -> Option<String> {
        match self {
            ApiKeySource::Environment => ProxyConfig::api_key(),
            ApiKeySource::Fixed(key) => key.clone().filter(|k| !k.is_empty()),
        }
    }
}

/// Builds the completion request and normalizes the upstream answer
#[derive(Clone)]
pub struct AsyncTranslator {
    backend: Arc<dyn CompletionBackend>,
    config: Arc<ProxyConfig>,
    api_key: ApiKeySource,
}

impl std::fmt::Debug for AsyncTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTranslator")
            .field("model", &self.config.model)
            .field("api_key", &self.api_key.resolve().map(|_| "<set>"))
            .finish()
    }
}

impl AsyncTranslator {
    /// Create a translator over an arbitrary backend
    pub fn new(
        config: ProxyConfig,
        backend: Arc<dyn CompletionBackend>,
        api_key: ApiKeySource,
    ) -> Self {
        Self {
            backend,
            config: Arc::new(config),
            api_key,
        }
    }

    /// Create an HTTP-backed translator that reads the key from the environment
    pub fn from_config(config: ProxyConfig) -> Result<Self> {
        config.validate()?;
        let backend = Arc::new(HttpCompletionBackend::new(&config)?);
        Ok(Self::new(config, backend, ApiKeySource::Environment))
    }

    /// Create from environment
    pub fn from_env() -> Result<Self> {
        let config = ProxyConfig::from_env()?;
        Self::from_config(config)
    }

    /// Configuration in use
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Completion request for a validated translation request
    pub fn build_request(&self, request: &ValidatedRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: build_messages(request),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Translate one request. Never retries.
    pub async fn translate(&self, request: &ValidatedRequest) -> Result<TranslationResult> {
        let api_key = self.api_key.resolve().ok_or_else(|| {
            error!("Upstream API key is missing");
            ProxyError::ConfigurationError {
                message: "API key is not configured. Please set OPENAI_API_KEY in your environment or .env file."
                    .to_string(),
            }
        })?;

        info!(
            "Translating from {} to {}: {}...",
            request.source_lang,
            request.target_lang,
            request.preview()
        );

        let completion = self.build_request(request);
        let response = self.backend.complete(&completion, &api_key).await?;

        let translated = response
            .first_content()
            .ok_or(ProxyError::EmptyTranslationError)?
            .to_string();

        debug!("Received {} characters of translation", translated.chars().count());

        Ok(TranslationResult { translated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::INTERNAL_ERROR_MESSAGE;
    use crate::core::models::{ChatChoice, ChoiceMessage, TranslationRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Backend returning a canned answer and recording what it was sent
    struct ScriptedBackend {
        answer: Box<dyn Fn() -> Result<ChatCompletionResponse> + Send + Sync>,
        calls: AtomicUsize,
        last_request: Mutex<Option<(ChatCompletionRequest, String)>>,
    }

    impl ScriptedBackend {
        fn new(answer: impl Fn() -> Result<ChatCompletionResponse> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                answer: Box::new(answer),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(
            &self,
            request: &ChatCompletionRequest,
            api_key: &str,
        ) -> Result<ChatCompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().await = Some((request.clone(), api_key.to_string()));
            (self.answer)()
        }
    }

    fn content(text: Option<&str>) -> ChatCompletionResponse {
        ChatCompletionResponse {
            choices: vec![ChatChoice {
                message: Some(ChoiceMessage {
                    content: text.map(str::to_string),
                }),
            }],
        }
    }

    fn request() -> ValidatedRequest {
        TranslationRequest::new("Hello, how are you?", "en", "es")
            .validate()
            .unwrap()
    }

    fn translator(backend: Arc<ScriptedBackend>, key: Option<&str>) -> AsyncTranslator {
        AsyncTranslator::new(
            ProxyConfig::default(),
            backend,
            ApiKeySource::Fixed(key.map(str::to_string)),
        )
    }

    #[tokio::test]
    async fn test_translate_trims_content() {
        let backend = ScriptedBackend::new(|| Ok(content(Some("  Hola, ¿cómo está?  "))));
        let result = translator(backend.clone(), Some("sk-test"))
            .translate(&request())
            .await
            .unwrap();

        assert_eq!(result.translated, "Hola, ¿cómo está?");

        let (sent, key) = backend.last_request.lock().await.clone().unwrap();
        assert_eq!(key, "sk-test");
        assert_eq!(sent.model, "gpt-3.5-turbo");
        assert_eq!(sent.max_tokens, 1000);
        assert_eq!(sent.messages[1].content, "Hello, how are you?");
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let backend = ScriptedBackend::new(|| Ok(content(Some("Hola"))));
        let err = translator(backend.clone(), None)
            .translate(&request())
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::ConfigurationError { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_content_is_empty_translation_error() {
        let backend = ScriptedBackend::new(|| Ok(content(None)));
        let err = translator(backend, Some("sk-test"))
            .translate(&request())
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::EmptyTranslationError));
    }

    #[tokio::test]
    async fn test_upstream_rate_limit_is_not_retried() {
        let backend = ScriptedBackend::new(|| {
            Err(upstream_error(
                429,
                "Too Many Requests".to_string(),
                r#"{"error":{"message":"quota"}}"#.to_string(),
            ))
        });
        let err = translator(backend.clone(), Some("sk-test"))
            .translate(&request())
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::UpstreamRateLimitExceeded { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    /// Serve `router` on an ephemeral port and return a backend pointed at it
    async fn local_upstream(router: axum::Router, timeout_ms: u64) -> HttpCompletionBackend {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let config = ProxyConfig {
            api_endpoint: format!("http://{}/v1/chat/completions", addr),
            timeout_ms,
            ..Default::default()
        };
        HttpCompletionBackend::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_http_backend_sends_bearer_and_parses_choices() {
        use axum::http::HeaderMap;
        use axum::routing::post;
        use axum::Json;

        let router = axum::Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<ChatCompletionRequest>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(serde_json::json!({
                    "choices": [{
                        "message": {
                            "role": "assistant",
                            "content": format!("{}|{}|{}", auth, body.messages.len(), body.temperature)
                        }
                    }]
                }))
            }),
        );

        let backend = local_upstream(router, 5_000).await;
        let translator = AsyncTranslator::new(
            ProxyConfig::default(),
            Arc::new(backend),
            ApiKeySource::Fixed(Some("sk-live".to_string())),
        );

        let result = translator.translate(&request()).await.unwrap();
        assert_eq!(result.translated, "Bearer sk-live|2|0.3");
    }

    #[tokio::test]
    async fn test_http_backend_maps_upstream_429() {
        use axum::routing::post;

        let router = axum::Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    axum::Json(serde_json::json!({"error": {"code": "rate_limit_exceeded"}})),
                )
            }),
        );

        let backend = local_upstream(router, 5_000).await;
        let completion = translator(ScriptedBackend::new(|| Ok(content(None))), Some("k"))
            .build_request(&request());
        let err = backend.complete(&completion, "k").await.unwrap_err();

        match err {
            ProxyError::UpstreamRateLimitExceeded { details } => {
                assert!(details.contains("rate_limit_exceeded"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_backend_mirrors_other_status() {
        use axum::routing::post;

        let router = axum::Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );

        let backend = local_upstream(router, 5_000).await;
        let completion = translator(ScriptedBackend::new(|| Ok(content(None))), Some("k"))
            .build_request(&request());
        let err = backend.complete(&completion, "k").await.unwrap_err();

        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("503 Service Unavailable. Details: {}"));
    }

    fn http_translator(backend: HttpCompletionBackend) -> AsyncTranslator {
        AsyncTranslator::new(
            ProxyConfig::default(),
            Arc::new(backend),
            ApiKeySource::Fixed(Some("sk-live".to_string())),
        )
    }

    #[tokio::test]
    async fn test_stalled_upstream_times_out_as_internal_error() {
        use axum::routing::post;

        let router = axum::Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                "{}"
            }),
        );

        let backend = local_upstream(router, 50).await;
        let err = http_translator(backend)
            .translate(&request())
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::HttpError(ref e) if e.is_timeout()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), INTERNAL_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_internal_error() {
        use axum::routing::post;

        let router = axum::Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::OK, "not json") }),
        );

        let backend = local_upstream(router, 5_000).await;
        let err = http_translator(backend)
            .translate(&request())
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::HttpError(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn test_upstream_error_mapping() {
        let err = upstream_error(401, "Unauthorized".to_string(), "{}".to_string());
        assert!(matches!(err, ProxyError::UpstreamError { status: 401, .. }));
    }
}
