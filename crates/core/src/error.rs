//! Error types for the careerchat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all careerchat operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Context load error: {0}")]
    ContextLoad(#[from] ContextLoadError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failure to assemble the professional context at startup. Always fatal.
#[derive(Debug, Error)]
pub enum ContextLoadError {
    #[error("Required document '{label}' not found at {path}")]
    Missing { label: String, path: PathBuf },

    #[error("Failed to read '{label}' at {path}: {reason}")]
    Unreadable {
        label: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Document '{label}' at {path} has no usable text")]
    Empty { label: String, path: PathBuf },

    #[error("PDF support is not compiled in; cannot read {0}")]
    PdfUnsupported(PathBuf),

    #[error("Professional context was already loaded for this process")]
    AlreadyLoaded,

    #[error("Template override {path} could not be read: {reason}")]
    Template { path: PathBuf, reason: String },
}

/// Failures talking to the generation/evaluation backend.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether this failure is a timeout rather than an outright error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout(_))
    }
}

/// Tool failures. None of these escape the registry; they become failed
/// [`crate::ToolResult`]s handed back to the responder.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool disabled: {0}")]
    Disabled(String),

    #[error("Invalid tool arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

/// The evaluator could not produce a usable verdict.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Evaluator returned malformed output: {0}")]
    MalformedOutput(String),

    #[error("Evaluator backend failed: {0}")]
    Backend(#[from] ProviderError),
}
