//! Endpoint handlers, one module per API dialect.
//!
//! Handlers write their whole response to the connection themselves and
//! only return I/O errors; request-level failures are answered in the
//! dialect's error shape before returning.

pub mod llamacpp;
pub mod ollama;
pub mod openai;

use std::io;

use serde_json::Value;
use tokio::io::AsyncWrite;
use tracing::{debug, error, warn};

use crate::error::{Dialect, GatewayError};
use crate::routes::Route;
use crate::state::{GatewayState, GenerationSlot, SharedEngine};
use crate::wire::{self, HttpRequest};

/// Route `request` and write its response to `out`.
pub async fn dispatch<W>(state: &GatewayState, request: &HttpRequest<'_>, out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let path = request.route_path();
    let route = Route::resolve(request.method, path);
    debug!(method = request.method, path, ?route, "Dispatching request");

    match route {
        Route::Preflight => wire::write_preflight(out).await,
        Route::Health => llamacpp::health(state, out).await,
        Route::Props => llamacpp::props(state, out).await,
        Route::Slots => llamacpp::slots(state, out).await,
        Route::Models => openai::models(state, out).await,
        Route::ChatCompletions => openai::chat_completions(state, request.body, out).await,
        Route::Embeddings => openai::embeddings(state, request.body, out).await,
        Route::OllamaRoot => ollama::root(out).await,
        Route::Tags => ollama::tags(state, out).await,
        Route::Version => ollama::version(out).await,
        Route::Chat => ollama::chat(state, request.body, out).await,
        Route::Generate => ollama::generate(state, request.body, out).await,
        Route::Ps => ollama::ps(state, out).await,
        Route::NotFound => {
            let err = GatewayError::NotFound(path.to_string());
            respond_error(out, Dialect::for_path(path), &err).await
        }
    }
}

/// A request admitted to the engine.
///
/// Holds the generation slot until dropped, so it must outlive the
/// generation it starts.
pub(crate) struct Admission<'s> {
    pub body: Value,
    pub engine: SharedEngine,
    _slot: GenerationSlot<'s>,
}

/// Check the preconditions of an engine-bound request, in order: the body
/// is JSON, a model is loaded, the generation slot is free.
pub(crate) fn admit<'s>(state: &'s GatewayState, body: &[u8]) -> Result<Admission<'s>, GatewayError> {
    let body: Value = serde_json::from_slice(body)?;
    let engine = state.engine().ok_or(GatewayError::NoModel)?.clone();
    let slot = state.try_begin_generation().ok_or(GatewayError::Busy)?;
    Ok(Admission {
        body,
        engine,
        _slot: slot,
    })
}

/// Answer with `err` in the shape `dialect` expects.
pub(crate) async fn respond_error<W>(out: &mut W, dialect: Dialect, err: &GatewayError) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let status = err.status();
    if status.is_server_error() && !matches!(err, GatewayError::Busy | GatewayError::NoModel) {
        error!(status = status.as_u16(), error = %err, "Request failed");
    } else {
        warn!(status = status.as_u16(), error = %err, "Request rejected");
    }
    wire::write_json(out, status, &err.to_body(dialect)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LoadedModel;
    use llmgate_core::testing::RecordingEngine;
    use std::path::Path;

    fn loaded() -> GatewayState {
        GatewayState::with_engine(
            LoadedModel::from_path(Path::new("tiny.gguf")),
            Box::new(RecordingEngine::new()),
            512,
        )
    }

    #[test]
    fn test_admit_checks_json_first() {
        let state = GatewayState::default();
        assert!(matches!(admit(&state, b"{nope"), Err(GatewayError::InvalidJson(_))));
    }

    #[test]
    fn test_admit_requires_model() {
        let state = GatewayState::default();
        assert!(matches!(admit(&state, b"{}"), Err(GatewayError::NoModel)));
    }

    #[test]
    fn test_admit_holds_slot_until_dropped() {
        let state = loaded();

        let admission = admit(&state, b"{}").unwrap();
        assert!(matches!(admit(&state, b"{}"), Err(GatewayError::Busy)));

        drop(admission);
        assert!(admit(&state, b"{}").is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_path_uses_dialect() {
        let state = GatewayState::default();
        let mut out = Vec::new();
        let request = HttpRequest {
            method: "GET",
            path: "/v1/unknown",
            body: b"",
        };

        dispatch(&state, &request, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.ends_with(r#"{"error":{"message":"not found: /v1/unknown","type":"not_found_error"}}"#));
    }
}
