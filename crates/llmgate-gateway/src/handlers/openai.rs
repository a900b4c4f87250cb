//! OpenAI-compatible endpoints (`/v1/*`).

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
use crate::generation::{Generation, GenerationRequest, StreamAccumulator, embed_all};
use crate::models::{ChatCompletionResponse, ChunkStream, EmbeddingsResponse, ModelInfo, ModelsResponse, completion_id};
use crate::state::{GatewayState, SharedEngine};
use crate::stream::{StreamFormat, StreamWriter};
use crate::wire;

/// `GET /v1/models`
pub async fn models<W>(state: &GatewayState, out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let now = chrono::Utc::now().timestamp();
    let data = state
        .model()
        .map(|model| ModelInfo::new(model.name.as_str(), now))
        .into_iter()
        .collect();
    wire::write_json(out, StatusCode::OK, &ModelsResponse::new(data)).await
}

/// Read the generation parameters of a chat completion request.
fn chat_request(body: &Value, show_statistics: bool) -> Result<(GenerationRequest, bool), GatewayError> {
    let messages = json::get_array(body, "messages").ok_or(GatewayError::MissingField("messages"))?;
    let conversation = ResolvedConversation::from_messages(messages)?;
    let request = GenerationRequest::new(conversation)
        .with_max_tokens(json::get_int(body, "max_tokens", 0))
        .with_statistics(show_statistics);
    Ok((request, json::get_bool(body, "stream", false)))
}

/// `POST /v1/chat/completions`
pub async fn chat_completions<W>(state: &GatewayState, body: &[u8], out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let admission = match admit(state, body) {
        Ok(admission) => admission,
        Err(e) => return respond_error(out, Dialect::OpenAi, &e).await,
    };
    let (request, stream) = match chat_request(&admission.body, state.show_statistics()) {
        Ok(parsed) => parsed,
        Err(e) => return respond_error(out, Dialect::OpenAi, &e).await,
    };

    let model = state.model_name();
    let start = Instant::now();

    if stream {
        stream_completion(out, admission.engine.clone(), request, model, start).await
    } else {
        let generation = Generation::spawn(admission.engine.clone(), request);
        match generation.collect().await {
            Ok(acc) => {
                log_completion(model, &acc, false, start);
                let response = ChatCompletionResponse::new(
                    completion_id(),
                    chrono::Utc::now().timestamp(),
                    model.to_string(),
                    acc.text,
                    acc.fragments,
                );
                wire::write_json(out, StatusCode::OK, &response).await
            }
            Err(e) => respond_error(out, Dialect::OpenAi, &GatewayError::from(e)).await,
        }
    }
}

async fn stream_completion<W>(
    out: &mut W,
    engine: SharedEngine,
    request: GenerationRequest,
    model: &str,
    start: Instant,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = StreamWriter::start(out, StreamFormat::EventStream).await?;
    let chunks = ChunkStream::new(model.to_string());
    let mut generation = Generation::spawn(engine, request);
    let mut acc = StreamAccumulator::default();

    let relayed = async {
        writer.send(&chunks.role()).await?;
        while let Some(fragment) = generation.next_fragment().await {
            acc.push(&fragment);
            writer.send(&chunks.content(&fragment)).await?;
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
            log_completion(model, &acc, true, start);
            writer.send(&chunks.finish()).await?;
        }
        Err(e) => {
            let err = GatewayError::from(e);
            writer.send(&err.to_body(Dialect::OpenAi)).await?;
        }
    }
    writer.finish().await
}

fn log_completion(model: &str, acc: &StreamAccumulator, stream: bool, start: Instant) {
    info!(
        model,
        stream,
        fragments = acc.fragments,
        elapsed_ms = start.elapsed().as_millis(),
        "Chat completion finished"
    );
}

/// The `input` field as a list of strings.
fn embedding_inputs(body: &Value) -> Result<Vec<String>, GatewayError> {
    match body.get("input") {
        Some(Value::String(text)) => Ok(vec![text.clone()]),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()),
        _ => Err(GatewayError::MissingField("input")),
    }
}

/// `POST /v1/embeddings`
pub async fn embeddings<W>(state: &GatewayState, body: &[u8], out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let admission = match admit(state, body) {
        Ok(admission) => admission,
        Err(e) => return respond_error(out, Dialect::OpenAi, &e).await,
    };
    let inputs = match embedding_inputs(&admission.body) {
        Ok(inputs) => inputs,
        Err(e) => return respond_error(out, Dialect::OpenAi, &e).await,
    };

    match embed_all(admission.engine.clone(), inputs).await {
        Ok(vectors) => {
            info!(inputs = vectors.len(), "Embeddings computed");
            let response = EmbeddingsResponse::new(state.model_name().to_string(), vectors);
            wire::write_json(out, StatusCode::OK, &response).await
        }
        Err(e) => respond_error(out, Dialect::OpenAi, &GatewayError::from(e)).await,
    }
}
