use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Error categories surfaced to clients, on both the SSE stream and the
/// synchronous HTTP paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    VaultMissing,
    EmbedderUnavailable,
    LlmUnavailable,
    GenerationStreamBroken,
    IndexingFileFailed,
    MalformedRequest,
    ClientCancelled,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::VaultMissing => "vault_missing",
            ErrorCategory::EmbedderUnavailable => "embedder_unavailable",
            ErrorCategory::LlmUnavailable => "llm_unavailable",
            ErrorCategory::GenerationStreamBroken => "generation_stream_broken",
            ErrorCategory::IndexingFileFailed => "indexing_file_failed",
            ErrorCategory::MalformedRequest => "malformed_request",
            ErrorCategory::ClientCancelled => "client_cancelled",
        }
    }

    /// HTTP status used when the error surfaces on a synchronous endpoint.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCategory::LlmUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::MalformedRequest => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal question-answering failure with a client-facing category.
#[derive(Debug, Clone, Error)]
#[error("{category}: {message}")]
pub struct QaError {
    pub category: ErrorCategory,
    pub message: String,
}

impl QaError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}
