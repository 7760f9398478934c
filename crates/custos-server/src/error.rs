//! Error types for the admin server.

use std::fmt;

use custos_authz::AuthzError;
use thiserror::Error;

/// Admin server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// The request carries no caller identity.
    #[error("Missing caller identity")]
    Unauthenticated,

    /// The caller may not perform the operation.
    #[error("Forbidden")]
    Forbidden,

    /// The attribute store could not be reached.
    #[error("Service unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },

    /// The request is malformed.
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message.
        message: String,
    },

    /// The request body exceeds the configured limit.
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// Limit in bytes.
        limit: usize,
    },

    /// No such route.
    #[error("Not found: {path}")]
    NotFound {
        /// Requested path.
        path: String,
    },

    /// The route exists but not for this method.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Server startup error.
    #[error("Server error: {message}")]
    Server {
        /// Error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Authorization core error.
    #[error(transparent)]
    Authz(#[from] AuthzError),
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    #[allow(clippy::match_same_arms)]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config { .. } => 500,
            Self::Unauthenticated => 401,
            Self::Forbidden => 403,
            Self::Unavailable { .. } => 503,
            Self::BadRequest { .. } => 400,
            Self::PayloadTooLarge { .. } => 413,
            Self::NotFound { .. } => 404,
            Self::MethodNotAllowed => 405,
            Self::Server { .. } => 500,
            Self::Io(_) => 500,
            Self::Json(_) => 400,
            Self::Authz(e) if e.is_retryable() => 503,
            Self::Authz(e) if e.is_invalid_input() => 400,
            Self::Authz(_) => 500,
        }
    }

    /// Get the error category, used as the `error` field of responses.
    pub fn category(&self) -> &'static str {
        match self.status_code() {
            400 => "bad_request",
            401 => "unauthenticated",
            403 => "forbidden",
            404 => "not_found",
            405 => "method_not_allowed",
            413 => "payload_too_large",
            503 => "service_unavailable",
            _ => "internal",
        }
    }

    /// Whether the message may be shown to the caller.
    ///
    /// Denials and outages are reported by category only.
    pub fn is_public(&self) -> bool {
        matches!(self.status_code(), 400 | 404 | 405 | 413)
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Error category.
    pub error: String,
    /// Human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with only a category.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            request_id: None,
        }
    }

    /// Set the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl From<&ServerError> for ErrorResponse {
    fn from(err: &ServerError) -> Self {
        let response = Self::new(err.category());
        if err.is_public() {
            response.with_message(err.to_string())
        } else {
            response
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "[{}] {}", self.error, message),
            None => write!(f, "[{}]", self.error),
        }
    }
}
