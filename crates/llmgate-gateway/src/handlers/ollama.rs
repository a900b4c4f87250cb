//! Ollama-native endpoints (`/`, `/api/*`).
//!
//! Ollama clients stream by default; records are NDJSON and the last one
//! carries `done: true` with timing statistics.

use std::io;
use std::time::Instant;

use http::StatusCode;
use serde_json::Value;
use tokio::io::AsyncWrite;
use tracing::{info, warn};

use llmgate_core::ResolvedConversation;
use llmgate_core::utils::json;

use super::{admit, respond_error};
use crate::error::{Dialect, GatewayError};
use crate::generation::{Generation, GenerationRequest, StreamAccumulator};
use crate::ollama_models::{
    OLLAMA_ROOT_RESPONSE, OLLAMA_VERSION, OllamaChatChunk, OllamaGenerateChunk, OllamaModelEntry,
    OllamaPsEntry, OllamaPsResponse, OllamaStats, OllamaTagsResponse, OllamaVersionResponse,
};
use crate::state::{GatewayState, SharedEngine};
use crate::stream::{StreamFormat, StreamWriter};
use crate::wire;

/// `GET /`: the probe Ollama clients use to detect a server.
pub async fn root<W>(out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    wire::write_response(out, StatusCode::OK, "text/plain; charset=utf-8", OLLAMA_ROOT_RESPONSE.as_bytes()).await
}

/// `GET /api/version`
pub async fn version<W>(out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response = OllamaVersionResponse {
        version: OLLAMA_VERSION,
    };
    wire::write_json(out, StatusCode::OK, &response).await
}

/// `GET /api/tags`
pub async fn tags<W>(state: &GatewayState, out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response = OllamaTagsResponse {
        models: state.model().map(OllamaModelEntry::from).into_iter().collect(),
    };
    wire::write_json(out, StatusCode::OK, &response).await
}

/// `GET /api/ps`
pub async fn ps<W>(state: &GatewayState, out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response = OllamaPsResponse {
        models: state.model().map(OllamaPsEntry::from).into_iter().collect(),
    };
    wire::write_json(out, StatusCode::OK, &response).await
}

/// Which Ollama record shape a generation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Chat,
    Generate,
}

/// `options.num_predict`, the Ollama name for the token limit.
fn num_predict(body: &Value) -> i64 {
    json::get_object(body, "options").map_or(0, |options| json::get_int(options, "num_predict", 0))
}

fn chat_request(body: &Value, show_statistics: bool) -> Result<(GenerationRequest, bool), GatewayError> {
    let messages = json::get_array(body, "messages").ok_or(GatewayError::MissingField("messages"))?;
    let conversation = ResolvedConversation::from_messages(messages)?;
    let request = GenerationRequest::new(conversation)
        .with_max_tokens(num_predict(body))
        .with_statistics(show_statistics);
    Ok((request, json::get_bool(body, "stream", true)))
}

fn generate_request(body: &Value, show_statistics: bool) -> Result<(GenerationRequest, bool), GatewayError> {
    let prompt = json::get_string(body, "prompt").ok_or(GatewayError::MissingField("prompt"))?;
    let conversation = ResolvedConversation::from_prompt(json::get_string(body, "system"), prompt);
    let request = GenerationRequest::new(conversation)
        .with_max_tokens(num_predict(body))
        .with_statistics(show_statistics);
    Ok((request, json::get_bool(body, "stream", true)))
}

/// `POST /api/chat`
pub async fn chat<W>(state: &GatewayState, body: &[u8], out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    serve_generation(state, body, out, StreamKind::Chat).await
}

/// `POST /api/generate`
pub async fn generate<W>(state: &GatewayState, body: &[u8], out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    serve_generation(state, body, out, StreamKind::Generate).await
}

async fn serve_generation<W>(state: &GatewayState, body: &[u8], out: &mut W, kind: StreamKind) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let admission = match admit(state, body) {
        Ok(admission) => admission,
        Err(e) => return respond_error(out, Dialect::Ollama, &e).await,
    };
    let parsed = match kind {
        StreamKind::Chat => chat_request(&admission.body, state.show_statistics()),
        StreamKind::Generate => generate_request(&admission.body, state.show_statistics()),
    };
    let (request, stream) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => return respond_error(out, Dialect::Ollama, &e).await,
    };

    let model = state.model_name();
    let start = Instant::now();

    if stream {
        return stream_records(out, admission.engine.clone(), request, model, kind, start).await;
    }

    match Generation::spawn(admission.engine.clone(), request).collect().await {
        Ok(acc) => {
            log_generation(model, kind, &acc, false, start);
            let stats = OllamaStats::since(start, acc.fragments);
            match kind {
                StreamKind::Chat => {
                    wire::write_json(out, StatusCode::OK, &OllamaChatChunk::done(model, &acc.text, stats)).await
                }
                StreamKind::Generate => {
                    wire::write_json(out, StatusCode::OK, &OllamaGenerateChunk::done(model, &acc.text, stats))
                        .await
                }
            }
        }
        Err(e) => respond_error(out, Dialect::Ollama, &GatewayError::from(e)).await,
    }
}

async fn send_record<W>(
    writer: &mut StreamWriter<'_, W>,
    kind: StreamKind,
    model: &str,
    text: &str,
    stats: Option<OllamaStats>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match (kind, stats) {
        (StreamKind::Chat, None) => writer.send(&OllamaChatChunk::fragment(model, text)).await,
        (StreamKind::Chat, Some(stats)) => writer.send(&OllamaChatChunk::done(model, text, stats)).await,
        (StreamKind::Generate, None) => writer.send(&OllamaGenerateChunk::fragment(model, text)).await,
        (StreamKind::Generate, Some(stats)) => {
            writer.send(&OllamaGenerateChunk::done(model, text, stats)).await
        }
    }
}

async fn stream_records<W>(
    out: &mut W,
    engine: SharedEngine,
    request: GenerationRequest,
    model: &str,
    kind: StreamKind,
    start: Instant,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = StreamWriter::start(out, StreamFormat::Ndjson).await?;
    let mut generation = Generation::spawn(engine, request);
    let mut acc = StreamAccumulator::default();

    let relayed = async {
        while let Some(fragment) = generation.next_fragment().await {
            acc.push(&fragment);
            send_record(&mut writer, kind, model, &fragment, None).await?;
        }
        Ok::<_, io::Error>(())
    }
    .await;

    // The slot stays claimed until the engine has returned.
    let outcome = generation.finish().await;

    if let Err(e) = relayed {
        warn!(error = %e, fragments = acc.fragments, "Client went away mid-stream");
        return Err(e);
    }

    match outcome {
        Ok(()) => {
            log_generation(model, kind, &acc, true, start);
            let stats = OllamaStats::since(start, acc.fragments);
            send_record(&mut writer, kind, model, "", Some(stats)).await?;
        }
        Err(e) => {
            let err = GatewayError::from(e);
            writer.send(&err.to_body(Dialect::Ollama)).await?;
        }
    }
    writer.finish().await
}

fn log_generation(model: &str, kind: StreamKind, acc: &StreamAccumulator, stream: bool, start: Instant) {
    info!(
        model,
        ?kind,
        stream,
        fragments = acc.fragments,
        elapsed_ms = start.elapsed().as_millis(),
        "Ollama generation finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmgate_core::ConversationOp;
    use serde_json::json;

    #[test]
    fn test_chat_streams_by_default() {
        let body = json!({"messages": [{"role": "user", "content": "hi"}]});

        let (_, stream) = chat_request(&body, false).unwrap();

        assert!(stream);
    }

    #[test]
    fn test_num_predict_maps_to_max_tokens() {
        let body = json!({
            "messages": [{"role": "user", "content": "hi"}],
            "options": {"num_predict": 12}
        });

        let (request, _) = chat_request(&body, false).unwrap();

        assert_eq!(request.max_tokens, Some(12));
    }

    #[test]
    fn test_unlimited_num_predict_is_ignored() {
        let body = json!({"prompt": "p", "options": {"num_predict": -1}});

        let (request, _) = generate_request(&body, false).unwrap();

        assert_eq!(request.max_tokens, None);
    }

    #[test]
    fn test_generate_with_system_restarts() {
        let body = json!({"prompt": "Why?", "system": "Be brief", "stream": false});

        let (request, stream) = generate_request(&body, false).unwrap();

        assert!(!stream);
        assert_eq!(
            request.conversation.ops(),
            &[ConversationOp::Restart("Be brief".to_string())]
        );
        assert_eq!(request.conversation.pending_user(), "Why?");
    }

    #[test]
    fn test_generate_requires_prompt() {
        assert!(matches!(
            generate_request(&json!({"system": "S"}), false),
            Err(GatewayError::MissingField("prompt"))
        ));
    }
}
