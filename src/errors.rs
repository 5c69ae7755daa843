use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
///
/// Upstream failures are split into transient (retried by the Gemini client)
/// and fatal (surfaced to the immediate caller) so the retry loop can decide
/// from the error alone whether another attempt is worthwhile.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Rate-limited or temporarily unavailable upstream service (429/503,
    /// or a transport failure expected to resolve itself).
    TransientApi {
        /// HTTP status if one was received.
        status: Option<u16>,
        /// Human-readable description.
        message: String,
    },
    /// Any other upstream failure: non-retryable status, malformed envelope,
    /// or an empty response after retries.
    FatalApi {
        /// HTTP status if one was received.
        status: Option<u16>,
        /// Human-readable description.
        message: String,
    },
    /// Response text could not be recovered as JSON by either parse strategy.
    Parse {
        /// Underlying parser message.
        message: String,
        /// First 200 characters of the offending text, for diagnostics.
        excerpt: String,
    },
    /// Missing credential/ID for an optional integration. Callers treat this
    /// as "integration disabled", not as a failure.
    Configuration(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Resource not found error.
    NotFound(String),
    /// Internal server error.
    Internal(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Whether the retry loop should attempt this call again.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::TransientApi { .. } => true,
            AppError::WithContext { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::TransientApi { status, message } => match status {
                Some(code) => write!(f, "Transient upstream error (HTTP {}): {}", code, message),
                None => write!(f, "Transient upstream error: {}", message),
            },
            AppError::FatalApi { status, message } => match status {
                Some(code) => write!(f, "Upstream error (HTTP {}): {}", code, message),
                None => write!(f, "Upstream error: {}", message),
            },
            AppError::Parse { message, excerpt } => {
                write!(f, "JSON parse error: {} (text: {})", message, excerpt)
            }
            AppError::Configuration(msg) => write!(f, "Configuration missing: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::TransientApi { .. } => {
                tracing::error!("Transient upstream error surfaced: {}", self);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Upstream service unavailable".to_string(),
                )
            }
            AppError::FatalApi { .. } => {
                tracing::error!("Upstream error: {}", self);
                (StatusCode::BAD_GATEWAY, "External service error".to_string())
            }
            AppError::Parse { .. } => {
                tracing::error!("Unrecoverable upstream response: {}", self);
                (
                    StatusCode::BAD_GATEWAY,
                    "External service returned malformed data".to_string(),
                )
            }
            AppError::Configuration(msg) => {
                tracing::warn!("Configuration missing: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Integration not configured".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                // Delegate to underlying error's response
                return source.clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    ///
    /// Timeouts and connection failures are classified as transient so the
    /// client retries them with the same backoff as rate-limit responses.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            AppError::TransientApi {
                status: None,
                message: err.to_string(),
            }
        } else {
            AppError::FatalApi {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification_follows_context_chain() {
        let inner = AppError::TransientApi {
            status: Some(429),
            message: "rate limited".to_string(),
        };
        assert!(inner.is_transient());

        let wrapped = Err::<(), _>(inner).context("calling Gemini").unwrap_err();
        assert!(wrapped.is_transient());

        let fatal = AppError::FatalApi {
            status: Some(400),
            message: "bad request".to_string(),
        };
        assert!(!fatal.is_transient());
    }

    #[test]
    fn display_includes_status_and_context() {
        let err = Err::<(), _>(AppError::FatalApi {
            status: Some(400),
            message: "invalid payload".to_string(),
        })
        .context("industry analysis")
        .unwrap_err();

        let text = err.to_string();
        assert!(text.contains("industry analysis"));
        assert!(text.contains("400"));
    }
}
