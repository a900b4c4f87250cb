//! Loopback engine.
//!
//! `EchoEngine` implements the engine port without a model: every reply is
//! the user's input, streamed back one word at a time. It keeps real
//! conversation state (system prompt, history, token limit) and persists
//! sessions, which makes it useful for smoke-testing clients against the
//! gateway and for exercising the gateway end to end.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use llmgate_core::ports::{
    ChatEngine, EngineError, EngineFactory, EngineParams, EngineSink, PrintKind,
};
use llmgate_core::MessageRole;

/// One committed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: MessageRole,
    pub text: String,
}

/// On-disk session layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Session {
    system_prompt: Option<String>,
    history: Vec<Turn>,
}

#[derive(Debug, Default, Clone, Copy)]
struct GenerationStats {
    fragments: usize,
    elapsed: Duration,
}

/// Engine that echoes the user input back as its reply.
#[derive(Debug, Default)]
pub struct EchoEngine {
    context_size: u32,
    system_prompt: Option<String>,
    history: Vec<Turn>,
    max_tokens: Option<u32>,
    last: GenerationStats,
}

impl EchoEngine {
    /// Create an engine with an empty conversation.
    #[must_use]
    pub fn new(context_size: u32) -> Self {
        Self {
            context_size,
            ..Self::default()
        }
    }

    /// The current system prompt.
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Committed turns, oldest first.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    fn push_turn(&mut self, role: MessageRole, text: &str) {
        self.history.push(Turn {
            role,
            text: text.to_string(),
        });
    }
}

impl ChatEngine for EchoEngine {
    fn restart(&mut self, system_prompt: Option<&str>) {
        debug!(has_system_prompt = system_prompt.is_some(), "Restarting conversation");
        self.history.clear();
        self.system_prompt = system_prompt.map(str::to_string);
    }

    fn history_append(&mut self, role: MessageRole, text: &str) {
        self.push_turn(role, text);
    }

    fn set_gen_max_tokens(&mut self, max_tokens: u32) {
        self.max_tokens = Some(max_tokens);
    }

    fn user_input(&mut self, text: &str, sink: &mut dyn EngineSink) -> Result<(), EngineError> {
        let start = Instant::now();
        let limit = self.max_tokens.map_or(usize::MAX, |n| n as usize);
        let mut reply = String::new();
        let mut fragments = 0;

        for word in text.split_inclusive(' ').take(limit) {
            fragments += 1;
            reply.push_str(word);
            if sink.on_print(PrintKind::ChatChunk, word).is_break() {
                debug!(fragments, "Generation aborted by sink");
                break;
            }
        }

        self.push_turn(MessageRole::User, text);
        self.push_turn(MessageRole::Assistant, &reply);
        self.last = GenerationStats {
            fragments,
            elapsed: start.elapsed(),
        };
        sink.on_end();
        Ok(())
    }

    fn show_statistics(&mut self) {
        info!(
            fragments = self.last.fragments,
            elapsed_us = self.last.elapsed.as_micros(),
            history_turns = self.history.len(),
            context_size = self.context_size,
            "Generation statistics"
        );
    }

    fn save_session(&mut self, path: &Path) -> Result<(), EngineError> {
        let session = Session {
            system_prompt: self.system_prompt.clone(),
            history: self.history.clone(),
        };
        let data =
            serde_json::to_vec_pretty(&session).map_err(|e| EngineError::Session(e.to_string()))?;
        fs::write(path, data)
            .map_err(|e| EngineError::Session(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), turns = self.history.len(), "Session saved");
        Ok(())
    }

    fn load_session(&mut self, path: &Path) -> Result<(), EngineError> {
        let data = fs::read(path)
            .map_err(|e| EngineError::Session(format!("{}: {e}", path.display())))?;
        let session: Session =
            serde_json::from_slice(&data).map_err(|e| EngineError::Session(e.to_string()))?;
        self.system_prompt = session.system_prompt;
        self.history = session.history;
        info!(path = %path.display(), turns = self.history.len(), "Session restored");
        Ok(())
    }
}

/// Factory for [`EchoEngine`].
///
/// Requires the model path to exist so the loading path behaves like a real
/// backend, but never reads the file.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoEngineFactory;

impl EngineFactory for EchoEngineFactory {
    fn create(&self, params: &EngineParams) -> Result<Box<dyn ChatEngine>, EngineError> {
        if !params.model_path.exists() {
            return Err(EngineError::ModelNotFound(params.model_path.clone()));
        }
        debug!(args = ?params.to_args(), "Creating echo engine");
        Ok(Box::new(EchoEngine::new(params.context_size)))
    }
}
