//! Custom error types for the translation proxy

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Message returned for requests missing one of the required fields
pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields: inputText, inputLang, outputLang";

/// Message returned when the local rate limit denies a request
pub const RATE_LIMITED_MESSAGE: &str =
    "Rate limit exceeded. Please wait before making another request.";

/// Message returned for any failure not covered by a dedicated variant
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error during translation";

/// Proxy errors, each mapped to one HTTP status
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Missing or empty request field, or an undecodable body
    #[error("{message}")]
    ValidationError {
        /// Client-facing explanation
        message: String,
    },

    /// Local fixed-window limit hit
    #[error("{}", RATE_LIMITED_MESSAGE)]
    RateLimitExceeded {
        /// Seconds until the client's window resets
        retry_after_secs: Option<u64>,
    },

    /// Upstream answered 429
    #[error("Upstream rate limit exceeded. Details: {details}")]
    UpstreamRateLimitExceeded {
        /// Upstream error body
        details: String,
    },

    /// No credential, or an unusable configuration
    #[error("{message}")]
    ConfigurationError {
        /// What the operator needs to fix
        message: String,
    },

    /// Upstream answered with any other non-2xx status
    #[error("Upstream API error: {status} {reason}. Details: {details}")]
    UpstreamError {
        /// Upstream HTTP status, mirrored to the client
        status: u16,
        /// Canonical reason phrase
        reason: String,
        /// Upstream error body
        details: String,
    },

    /// Upstream succeeded but carried no translated text
    #[error("No translation received from upstream")]
    EmptyTranslationError,

    /// Catch-all
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<anyhow::Error> for ProxyError {
    fn from(err: anyhow::Error) -> Self {
        ProxyError::InternalError(err.to_string())
    }
}

impl ProxyError {
    /// Validation failure for a request missing required fields
    pub fn missing_fields() -> Self {
        ProxyError::ValidationError {
            message: MISSING_FIELDS_MESSAGE.to_string(),
        }
    }

    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ProxyError::RateLimitExceeded { .. } | ProxyError::UpstreamRateLimitExceeded { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ProxyError::UpstreamError { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::ConfigurationError { .. }
            | ProxyError::EmptyTranslationError
            | ProxyError::InternalError(_)
            | ProxyError::HttpError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Transport and decoding details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ProxyError::InternalError(_) | ProxyError::HttpError(_) => {
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Error body sent to the client
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            error: self.public_message(),
        });

        let mut response = (status, body).into_response();
        if let ProxyError::RateLimitExceeded {
            retry_after_secs: Some(secs),
        } = self
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Result type for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;
