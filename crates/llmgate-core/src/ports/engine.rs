//! Engine port for driving a local text-generation engine.
//!
//! The engine is stateful and synchronous: it owns the conversation history,
//! and [`ChatEngine::user_input`] blocks until generation ends, reporting
//! output through an [`EngineSink`] as it is produced. Implementations hold
//! exactly one conversation and cannot run two generations at once.

use std::fmt;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::MessageRole;

/// Classification of a piece of engine output.
///
/// Only [`PrintKind::ChatChunk`] is generated text that belongs in a
/// response body; everything else is diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintKind {
    /// A fragment of the assistant reply.
    ChatChunk,
    /// Model metadata, load progress and similar informational output.
    Meta,
    /// An error message raised by the engine while generating.
    Error,
    /// Serialized embedding output.
    Embedding,
    /// Anything the engine does not classify further.
    Other,
}

/// Receiver for the output of a single generation.
///
/// `on_print` is called zero or more times in output order, then `on_end`
/// exactly once before `user_input` returns.
pub trait EngineSink {
    /// Deliver one piece of output.
    ///
    /// Returning [`ControlFlow::Break`] asks the engine to abort the
    /// generation; the engine still calls [`EngineSink::on_end`].
    fn on_print(&mut self, kind: PrintKind, text: &str) -> ControlFlow<()>;

    /// Signal the end of the generation.
    fn on_end(&mut self);
}

/// Errors reported by an engine implementation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The model file does not exist.
    #[error("Model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    /// The engine could not be created from the given parameters.
    #[error("Failed to create engine: {0}")]
    CreateFailed(String),

    /// Generation could not start or failed midway.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Saving or restoring a session failed.
    #[error("Session error: {0}")]
    Session(String),

    /// The engine does not implement this operation.
    #[error("Operation not supported by this engine: {0}")]
    Unsupported(&'static str),
}

/// A loaded, stateful chat engine.
///
/// The gateway keeps exactly one instance behind a mutex and only calls it
/// from a blocking thread.
pub trait ChatEngine: Send {
    /// Reset the conversation context, optionally installing a new system prompt.
    fn restart(&mut self, system_prompt: Option<&str>);

    /// Append a completed turn to the engine's history without generating.
    fn history_append(&mut self, role: MessageRole, text: &str);

    /// Limit the number of tokens produced by subsequent generations.
    fn set_gen_max_tokens(&mut self, max_tokens: u32);

    /// Submit user input and generate a reply.
    ///
    /// Blocks until the generation has ended. Output is delivered through
    /// `sink`; the call returns after `sink.on_end()` has been invoked.
    fn user_input(&mut self, text: &str, sink: &mut dyn EngineSink) -> Result<(), EngineError>;

    /// Emit timing and throughput statistics for the last generation.
    fn show_statistics(&mut self) {}

    /// Persist the current conversation to `path`.
    fn save_session(&mut self, path: &Path) -> Result<(), EngineError> {
        let _ = path;
        Err(EngineError::Unsupported("save_session"))
    }

    /// Restore a conversation previously written by [`ChatEngine::save_session`].
    fn load_session(&mut self, path: &Path) -> Result<(), EngineError> {
        let _ = path;
        Err(EngineError::Unsupported("load_session"))
    }

    /// Compute an embedding vector for `text`.
    fn embed(&mut self, text: &str) -> Result<Vec<f32>, EngineError> {
        let _ = text;
        Err(EngineError::Unsupported("embeddings"))
    }
}

/// Parameters used to create an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineParams {
    /// Path to the model file.
    pub model_path: PathBuf,
    /// Context window size in tokens.
    pub context_size: u32,
    /// Additional engine-specific arguments, appended verbatim.
    pub extra_args: Vec<String>,
}

impl EngineParams {
    /// Create parameters for a model with no extra arguments.
    #[must_use]
    pub fn new(model_path: impl Into<PathBuf>, context_size: u32) -> Self {
        Self {
            model_path: model_path.into(),
            context_size,
            extra_args: Vec::new(),
        }
    }

    /// Flatten into the argument list handed to the engine, one entry per
    /// appended parameter.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            self.model_path.display().to_string(),
            "--max_length".to_string(),
            self.context_size.to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Creates engine instances.
///
/// Implementations perform any one-time global initialization the backend
/// requires before the first instance is created.
pub trait EngineFactory: Send + Sync + fmt::Debug {
    /// Create and start an engine for the given parameters.
    fn create(&self, params: &EngineParams) -> Result<Box<dyn ChatEngine>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_args_appends_extra_args_last() {
        let mut params = EngineParams::new("/models/qwen.bin", 2048);
        params.extra_args = vec!["--temp".to_string(), "0.2".to_string()];

        assert_eq!(
            params.to_args(),
            vec!["-m", "/models/qwen.bin", "--max_length", "2048", "--temp", "0.2"]
        );
    }

    #[test]
    fn test_model_not_found_message_includes_path() {
        let err = EngineError::ModelNotFound(PathBuf::from("/missing/model.bin"));
        assert_eq!(err.to_string(), "Model file not found: /missing/model.bin");
    }
}
