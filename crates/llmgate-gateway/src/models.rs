//! OpenAI API data models for response handling.
//!
//! Requests are read field by field from a generic JSON value (see
//! `llmgate_core::utils::json`); this module only describes what the gateway
//! writes back.

use serde::Serialize;

// =============================================================================
// Chat Completion Response Types
// =============================================================================

/// Response from /v1/chat/completions endpoint (non-streaming).
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

impl ChatCompletionResponse {
    /// A single-choice completion with `content` as the assistant reply.
    pub fn new(id: String, created: i64, model: String, content: String, completion_tokens: u32) -> Self {
        Self {
            id,
            object: "chat.completion",
            created,
            model,
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: "assistant",
                    content,
                },
                finish_reason: "stop",
            }],
            usage: Usage::completion_only(completion_tokens),
        }
    }
}

/// A single chat completion choice.
#[derive(Debug, Clone, Serialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: &'static str,
}

/// A complete chat message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// Streaming chunk from /v1/chat/completions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk<'a> {
    pub id: &'a str,
    pub object: &'static str,
    pub created: i64,
    pub model: &'a str,
    pub choices: [ChatChunkChoice<'a>; 1],
}

/// A single streaming choice.
#[derive(Debug, Clone, Serialize)]
pub struct ChatChunkChoice<'a> {
    pub index: u32,
    pub delta: ChatDelta<'a>,
    pub finish_reason: Option<&'static str>,
}

/// Delta content in streaming response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatDelta<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<&'a str>,
}

/// Identity shared by every chunk of one streamed completion.
#[derive(Debug, Clone)]
pub struct ChunkStream {
    pub id: String,
    pub created: i64,
    pub model: String,
}

impl ChunkStream {
    pub fn new(model: String) -> Self {
        Self {
            id: completion_id(),
            created: chrono::Utc::now().timestamp(),
            model,
        }
    }

    fn chunk<'a>(&'a self, delta: ChatDelta<'a>, finish_reason: Option<&'static str>) -> ChatCompletionChunk<'a> {
        ChatCompletionChunk {
            id: &self.id,
            object: "chat.completion.chunk",
            created: self.created,
            model: &self.model,
            choices: [ChatChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }

    /// First chunk: announces the assistant role.
    pub fn role(&self) -> ChatCompletionChunk<'_> {
        self.chunk(
            ChatDelta {
                role: Some("assistant"),
                content: None,
            },
            None,
        )
    }

    /// One generated fragment.
    pub fn content<'a>(&'a self, text: &'a str) -> ChatCompletionChunk<'a> {
        self.chunk(
            ChatDelta {
                role: None,
                content: Some(text),
            },
            None,
        )
    }

    /// Last chunk: empty delta with a finish reason.
    pub fn finish(&self) -> ChatCompletionChunk<'_> {
        self.chunk(ChatDelta::default(), Some("stop"))
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Usage when only completion tokens are known.
    pub const fn completion_only(completion_tokens: u32) -> Self {
        Self {
            prompt_tokens: 0,
            completion_tokens,
            total_tokens: completion_tokens,
        }
    }
}

/// A fresh `chatcmpl-` identifier.
pub fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

// =============================================================================
// Models Endpoint Types
// =============================================================================

/// Response from /v1/models endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub object: &'static str,
    pub data: Vec<ModelInfo>,
}

impl ModelsResponse {
    pub fn new(data: Vec<ModelInfo>) -> Self {
        Self {
            object: "list",
            data,
        }
    }
}

/// Information about a single model (OpenAI format).
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: &'static str,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, created: i64) -> Self {
        Self {
            id: id.into(),
            object: "model",
            created,
            owned_by: "llmgate",
        }
    }
}

// =============================================================================
// Embeddings Endpoint Types
// =============================================================================

/// Response from /v1/embeddings endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingsResponse {
    pub object: &'static str,
    pub data: Vec<EmbeddingData>,
    pub model: String,
    pub usage: EmbeddingUsage,
}

impl EmbeddingsResponse {
    pub fn new(model: String, vectors: Vec<Vec<f32>>) -> Self {
        Self {
            object: "list",
            data: vectors
                .into_iter()
                .zip(0u32..)
                .map(|(embedding, index)| EmbeddingData {
                    object: "embedding",
                    embedding,
                    index,
                })
                .collect(),
            model,
            usage: EmbeddingUsage::default(),
        }
    }
}

/// One embedding vector.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingData {
    pub object: &'static str,
    pub embedding: Vec<f32>,
    pub index: u32,
}

/// Token usage for embeddings (not reported by the engine).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EmbeddingUsage {
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}

// =============================================================================
// Error Response Types
// =============================================================================

/// Error response matching OpenAI format.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail within an error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                r#type: error_type.into(),
            },
        }
    }
}
