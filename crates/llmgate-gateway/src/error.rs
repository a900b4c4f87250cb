//! Request-level errors and their per-dialect wire shapes.

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use llmgate_core::{ConversationError, EngineError};

use crate::models::ErrorResponse;
use crate::ollama_models::OllamaError;
use crate::wire::RequestParseError;

/// The API family a request belongs to, which decides its error shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `/v1/*`: `{"error":{"message":...,"type":...}}`.
    OpenAi,
    /// `/api/*`: `{"error":"..."}`.
    Ollama,
    /// Everything else: `{"error":"..."}`.
    Plain,
}

impl Dialect {
    /// Classify a request path.
    pub fn for_path(path: &str) -> Self {
        if path.starts_with("/v1/") {
            Self::OpenAi
        } else if path.starts_with("/api/") {
            Self::Ollama
        } else {
            Self::Plain
        }
    }
}

/// Errors that end a request before or during generation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The body is not valid JSON.
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The request bytes could not be parsed as HTTP.
    #[error("malformed request: {0}")]
    MalformedRequest(#[from] RequestParseError),

    /// A required field is absent or has the wrong type.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// The message array has no generation input.
    #[error(transparent)]
    Conversation(#[from] ConversationError),

    /// No engine is loaded.
    #[error("no model loaded")]
    NoModel,

    /// Another generation holds the slot.
    #[error("server busy: a generation is already in progress")]
    Busy,

    /// The engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// No route matches the path.
    #[error("not found: {0}")]
    NotFound(String),
}

impl GatewayError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidJson(_)
            | Self::MalformedRequest(_)
            | Self::MissingField(_)
            | Self::Conversation(_) => StatusCode::BAD_REQUEST,
            Self::NoModel | Self::Busy => StatusCode::SERVICE_UNAVAILABLE,
            Self::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// OpenAI error `type` for this error.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidJson(_)
            | Self::MalformedRequest(_)
            | Self::MissingField(_)
            | Self::Conversation(_) => "invalid_request_error",
            Self::NoModel | Self::Busy => "service_unavailable",
            Self::Engine(_) => "server_error",
            Self::NotFound(_) => "not_found_error",
        }
    }

    /// Response body in the shape `dialect` expects.
    #[must_use]
    pub fn to_body(&self, dialect: Dialect) -> ErrorBody {
        let message = self.to_string();
        match dialect {
            Dialect::OpenAi => ErrorBody::OpenAi(ErrorResponse::new(message, self.error_type())),
            Dialect::Ollama | Dialect::Plain => ErrorBody::Bare(OllamaError { error: message }),
        }
    }
}

/// Serialized error body.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ErrorBody {
    OpenAi(ErrorResponse),
    Bare(OllamaError),
}
