use serde_json::Value;
use thiserror::Error;

/// HTTP statuses that signal a transient upstream condition worth retrying.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Aggregates every failure mode exposed by the gateway client.
///
/// Each variant maps to a stable machine-readable code (see
/// [`OpenRouterError::code`]) so route handlers can translate failures into
/// HTTP responses without matching on message text. Whether a failure is
/// eligible for automatic retry is derived solely from the HTTP status or a
/// transport timeout, never from message content.
#[derive(Debug, Error)]
pub enum OpenRouterError {
    /// The API key was blank at construction time.
    #[error("OpenRouter API key is required")]
    MissingApiKey,
    /// The default model identifier was blank at construction time.
    #[error("default model is required")]
    MissingDefaultModel,
    /// The caller-supplied input failed validation before any network call.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    /// No model could be resolved for the request.
    #[error("model is required for OpenRouter request")]
    MissingModel,
    /// The per-attempt timeout elapsed before the gateway responded.
    #[error("OpenRouter request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// The gateway answered with a non-2xx status.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        retryable: bool,
        /// Raw upstream payload and request-id metadata, kept inspectable.
        details: Vec<Value>,
    },
    /// The response carried an empty choice list.
    #[error("OpenRouter response contained no choices")]
    EmptyResponse,
    /// The first choice carried no message content.
    #[error("OpenRouter response contained no message content")]
    EmptyMessage,
    /// A structured completion returned text that is not valid JSON.
    #[error("OpenRouter response is not valid JSON: {message}")]
    InvalidJson { message: String },
    /// A structured completion did not match the caller-supplied schema.
    #[error("OpenRouter response does not match JSON schema")]
    SchemaValidation { violations: Vec<String> },
    /// Transport-level failure below the HTTP layer.
    #[error("request error: {message}")]
    Request { message: String },
    /// Opaque failure that could not be classified.
    #[error("unknown OpenRouter error: {message}")]
    Unknown { message: String },
    /// Terminal fallback after the retry budget is exhausted.
    #[error("OpenRouter request failed after retries")]
    RequestFailed,
}

impl OpenRouterError {
    /// Creates an [`OpenRouterError::InvalidInput`] from a textual description.
    pub fn invalid_input<T: Into<String>>(message: T) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an [`OpenRouterError::Request`] for transport-level failures.
    pub fn request<T: Into<String>>(message: T) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Builds an [`OpenRouterError::Http`] with the retryable flag derived
    /// from the status code.
    pub fn http(status: u16, message: impl Into<String>, details: Vec<Value>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            retryable: is_retryable_status(status),
            details,
        }
    }

    /// Stable machine-readable code identifying the failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use openrouter_gateway::OpenRouterError;
    ///
    /// assert_eq!(OpenRouterError::MissingApiKey.code(), "MISSING_API_KEY");
    /// assert_eq!(OpenRouterError::http(503, "busy", Vec::new()).code(), "HTTP_ERROR");
    /// ```
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "MISSING_API_KEY",
            Self::MissingDefaultModel => "MISSING_DEFAULT_MODEL",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::MissingModel => "MISSING_MODEL",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Http { .. } => "HTTP_ERROR",
            Self::EmptyResponse => "EMPTY_RESPONSE",
            Self::EmptyMessage => "EMPTY_MESSAGE",
            Self::InvalidJson { .. } => "INVALID_JSON",
            Self::SchemaValidation { .. } => "SCHEMA_VALIDATION_FAILED",
            Self::Request { .. } => "REQUEST_ERROR",
            Self::Unknown { .. } => "UNKNOWN_ERROR",
            Self::RequestFailed => "REQUEST_FAILED",
        }
    }

    /// HTTP status reported by the gateway, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure is transient and eligible for automatic retry.
    pub fn retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Structured context attached to the failure, as open JSON values.
    pub fn details(&self) -> Vec<Value> {
        match self {
            Self::Http { details, .. } => details.clone(),
            Self::InvalidJson { message } => vec![Value::String(message.clone())],
            Self::SchemaValidation { violations } => violations
                .iter()
                .map(|violation| Value::String(violation.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Returns `true` when a status code marks a transient upstream condition.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}
