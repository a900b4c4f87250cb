//! Test doubles for the engine port.
//!
//! Enabled for this crate's own tests and, through the `test-utils`
//! feature, for downstream test suites.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::MessageRole;
use crate::ports::{ChatEngine, EngineError, EngineSink, PrintKind};

/// A call received by [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Restart(Option<String>),
    HistoryAppend(MessageRole, String),
    SetGenMaxTokens(u32),
    UserInput(String),
    ShowStatistics,
    SaveSession(PathBuf),
    LoadSession(PathBuf),
    Embed(String),
}

/// Engine double that records every call and replies with scripted fragments.
///
/// Clones share the call log, so a test can keep one clone while the other
/// is boxed into the gateway state.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    calls: Arc<Mutex<Vec<EngineCall>>>,
    reply: Vec<String>,
    failure: Option<String>,
    embedding: Option<Vec<f32>>,
}

impl RecordingEngine {
    /// Engine that replies with no fragments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that replies with `fragments`, one chat chunk each.
    pub fn with_reply<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reply: fragments.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Make every generation fail with `message` after reporting it.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Answer embedding requests with `vector`.
    #[must_use]
    pub fn with_embedding(mut self, vector: Vec<f32>) -> Self {
        self.embedding = Some(vector);
        self
    }

    /// Snapshot of the calls received so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.log().clone()
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Vec<EngineCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: EngineCall) {
        self.log().push(call);
    }
}

impl ChatEngine for RecordingEngine {
    fn restart(&mut self, system_prompt: Option<&str>) {
        self.record(EngineCall::Restart(system_prompt.map(str::to_string)));
    }

    fn history_append(&mut self, role: MessageRole, text: &str) {
        self.record(EngineCall::HistoryAppend(role, text.to_string()));
    }

    fn set_gen_max_tokens(&mut self, max_tokens: u32) {
        self.record(EngineCall::SetGenMaxTokens(max_tokens));
    }

    fn user_input(&mut self, text: &str, sink: &mut dyn EngineSink) -> Result<(), EngineError> {
        self.record(EngineCall::UserInput(text.to_string()));
        let _ = sink.on_print(PrintKind::Meta, "recording engine");

        if let Some(message) = &self.failure {
            let _ = sink.on_print(PrintKind::Error, message);
            sink.on_end();
            return Err(EngineError::GenerationFailed(message.clone()));
        }

        for fragment in &self.reply {
            if let ControlFlow::Break(()) = sink.on_print(PrintKind::ChatChunk, fragment) {
                break;
            }
        }
        sink.on_end();
        Ok(())
    }

    fn show_statistics(&mut self) {
        self.record(EngineCall::ShowStatistics);
    }

    fn save_session(&mut self, path: &Path) -> Result<(), EngineError> {
        self.record(EngineCall::SaveSession(path.to_path_buf()));
        Ok(())
    }

    fn load_session(&mut self, path: &Path) -> Result<(), EngineError> {
        self.record(EngineCall::LoadSession(path.to_path_buf()));
        Ok(())
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>, EngineError> {
        self.record(EngineCall::Embed(text.to_string()));
        self.embedding
            .clone()
            .ok_or(EngineError::Unsupported("embeddings"))
    }
}
