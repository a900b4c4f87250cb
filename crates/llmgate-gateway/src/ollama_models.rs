//! Ollama API data models.
//!
//! Timing statistics are synthetic: the engine port reports no per-phase
//! timing, so wall-clock time is split 25%/75% between prompt evaluation and
//! generation and `load_duration` is always 0 (the model is loaded at
//! startup).

use std::time::Instant;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::state::LoadedModel;

/// Version reported by `/api/version`. Some clients refuse anything older.
pub const OLLAMA_VERSION: &str = "0.6.4";

/// Body of `GET /`.
pub const OLLAMA_ROOT_RESPONSE: &str = "Ollama is running";

/// `expires_at` reported for the resident model; it is never unloaded.
pub const NEVER_EXPIRES: &str = "9999-12-31T23:59:59Z";

/// Bare error body: `{"error": "..."}`.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaError {
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OllamaVersionResponse {
    pub version: &'static str,
}

// ── Model listings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct OllamaModelDetails {
    pub parent_model: String,
    pub format: String,
    pub family: String,
    pub families: Vec<String>,
    pub parameter_size: String,
    pub quantization_level: String,
}

impl OllamaModelDetails {
    fn for_model(model: &LoadedModel) -> Self {
        let format = model
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("unknown")
            .to_ascii_lowercase();
        Self {
            parent_model: String::new(),
            format,
            family: "unknown".to_string(),
            families: Vec::new(),
            parameter_size: String::new(),
            quantization_level: String::new(),
        }
    }
}

/// Response from `/api/tags`.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaTagsResponse {
    pub models: Vec<OllamaModelEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OllamaModelEntry {
    pub name: String,
    pub model: String,
    pub modified_at: String,
    pub size: u64,
    pub digest: String,
    pub details: OllamaModelDetails,
}

impl From<&LoadedModel> for OllamaModelEntry {
    fn from(model: &LoadedModel) -> Self {
        Self {
            name: model.name.clone(),
            model: model.name.clone(),
            modified_at: model.modified.to_rfc3339(),
            size: model.size_bytes,
            digest: synthetic_digest(model),
            details: OllamaModelDetails::for_model(model),
        }
    }
}

/// Response from `/api/ps`.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaPsResponse {
    pub models: Vec<OllamaPsEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OllamaPsEntry {
    pub name: String,
    pub model: String,
    pub size: u64,
    pub digest: String,
    pub details: OllamaModelDetails,
    pub expires_at: &'static str,
    pub size_vram: u64,
}

impl From<&LoadedModel> for OllamaPsEntry {
    fn from(model: &LoadedModel) -> Self {
        Self {
            name: model.name.clone(),
            model: model.name.clone(),
            size: model.size_bytes,
            digest: synthetic_digest(model),
            details: OllamaModelDetails::for_model(model),
            expires_at: NEVER_EXPIRES,
            size_vram: 0,
        }
    }
}

// ── Chat / generate ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct OllamaChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

/// Timing and token statistics carried by the final record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OllamaStats {
    pub total_duration: u64,
    pub load_duration: u64,
    pub prompt_eval_count: u32,
    pub prompt_eval_duration: u64,
    pub eval_count: u32,
    pub eval_duration: u64,
}

impl OllamaStats {
    /// Stats for a generation that started at `start` and produced
    /// `eval_count` fragments.
    pub fn since(start: Instant, eval_count: u32) -> Self {
        let total = elapsed_nanos(start);
        Self {
            total_duration: total,
            load_duration: 0,
            prompt_eval_count: 0,
            prompt_eval_duration: total / 4,
            eval_count,
            eval_duration: total * 3 / 4,
        }
    }
}

/// One `/api/chat` record: a streamed fragment, the final record, or the
/// whole non-streamed reply.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaChatChunk<'a> {
    pub model: &'a str,
    pub created_at: String,
    pub message: OllamaChatMessage<'a>,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<&'static str>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub stats: Option<OllamaStats>,
}

impl<'a> OllamaChatChunk<'a> {
    pub fn fragment(model: &'a str, content: &'a str) -> Self {
        Self {
            model,
            created_at: now_rfc3339(),
            message: OllamaChatMessage {
                role: "assistant",
                content,
            },
            done: false,
            done_reason: None,
            stats: None,
        }
    }

    pub fn done(model: &'a str, content: &'a str, stats: OllamaStats) -> Self {
        Self {
            done: true,
            done_reason: Some("stop"),
            stats: Some(stats),
            ..Self::fragment(model, content)
        }
    }
}

/// One `/api/generate` record.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaGenerateChunk<'a> {
    pub model: &'a str,
    pub created_at: String,
    pub response: &'a str,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<&'static str>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub stats: Option<OllamaStats>,
}

impl<'a> OllamaGenerateChunk<'a> {
    pub fn fragment(model: &'a str, response: &'a str) -> Self {
        Self {
            model,
            created_at: now_rfc3339(),
            response,
            done: false,
            done_reason: None,
            stats: None,
        }
    }

    pub fn done(model: &'a str, response: &'a str, stats: OllamaStats) -> Self {
        Self {
            done: true,
            done_reason: Some("stop"),
            stats: Some(stats),
            ..Self::fragment(model, response)
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────────

/// Current time as RFC 3339, the format Ollama uses for `created_at`.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

/// Nanoseconds since `start`, saturating.
pub fn elapsed_nanos(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Stable `sha256:` digest derived from the model's identity.
///
/// Clients use the digest only to tell models apart, so hashing the name,
/// path and size is enough.
pub fn synthetic_digest(model: &LoadedModel) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.name.as_bytes());
    hasher.update(model.path.to_string_lossy().as_bytes());
    hasher.update(model.size_bytes.to_le_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256:{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn model() -> LoadedModel {
        LoadedModel {
            name: "tiny.gguf".to_string(),
            path: PathBuf::from("/models/tiny.gguf"),
            size_bytes: 1024,
            modified: chrono::DateTime::<chrono::Utc>::from_timestamp(0, 0).unwrap(),
        }
    }

    #[test]
    fn test_fragment_has_no_stats() {
        let value = serde_json::to_value(OllamaChatChunk::fragment("m", "Hi")).unwrap();

        assert_eq!(value["message"], json!({"role": "assistant", "content": "Hi"}));
        assert_eq!(value["done"], false);
        assert!(value.get("done_reason").is_none());
        assert!(value.get("eval_count").is_none());
    }

    #[test]
    fn test_done_record_flattens_stats() {
        let stats = OllamaStats {
            total_duration: 400,
            load_duration: 0,
            prompt_eval_count: 0,
            prompt_eval_duration: 100,
            eval_count: 3,
            eval_duration: 300,
        };

        let value = serde_json::to_value(OllamaGenerateChunk::done("m", "", stats)).unwrap();

        assert_eq!(value["done"], true);
        assert_eq!(value["done_reason"], "stop");
        assert_eq!(value["response"], "");
        assert_eq!(value["eval_count"], 3);
        assert_eq!(value["total_duration"], 400);
        assert_eq!(value["load_duration"], 0);
    }

    #[test]
    fn test_stats_split_wall_clock() {
        let stats = OllamaStats::since(Instant::now(), 5);

        assert_eq!(stats.eval_count, 5);
        assert_eq!(stats.load_duration, 0);
        assert!(stats.prompt_eval_duration + stats.eval_duration <= stats.total_duration);
    }

    #[test]
    fn test_digest_is_stable() {
        let digest = synthetic_digest(&model());

        assert!(digest.starts_with("sha256:"));
        assert_eq!(digest.len(), "sha256:".len() + 64);
        assert_eq!(digest, synthetic_digest(&model()));
    }

    #[test]
    fn test_ps_entry_never_expires() {
        let entry = OllamaPsEntry::from(&model());

        assert_eq!(entry.expires_at, NEVER_EXPIRES);
        assert_eq!(entry.details.format, "gguf");
        assert_eq!(entry.name, "tiny.gguf");
    }
}
