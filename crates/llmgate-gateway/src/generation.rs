//! Generation driver.
//!
//! The engine call is synchronous and reports output through a callback,
//! so it runs on tokio's blocking pool. Chat fragments cross to the async
//! side over an `mpsc` channel of capacity 1, which keeps them in order and
//! lets at most one fragment wait between engine and socket. The channel
//! closes when the engine signals the end of the generation; the engine's
//! result follows on a `oneshot`.
//!
//! Dropping the receiving side makes the sink answer
//! [`ControlFlow::Break`], which asks the engine to stop early.

use std::ops::ControlFlow;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace, warn};

use llmgate_core::{EngineError, EngineSink, PrintKind, ResolvedConversation};

use crate::state::{SharedEngine, lock_engine};

/// Everything one generation needs, resolved before the engine is touched.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub conversation: ResolvedConversation,
    /// Applied to the engine only when present; the limit then persists.
    pub max_tokens: Option<u32>,
    pub show_statistics: bool,
}

impl GenerationRequest {
    pub const fn new(conversation: ResolvedConversation) -> Self {
        Self {
            conversation,
            max_tokens: None,
            show_statistics: false,
        }
    }

    /// Use `value` as the token limit when it is positive.
    #[must_use]
    pub fn with_max_tokens(mut self, value: i64) -> Self {
        self.max_tokens = u32::try_from(value).ok().filter(|&n| n > 0);
        self
    }

    #[must_use]
    pub const fn with_statistics(mut self, enabled: bool) -> Self {
        self.show_statistics = enabled;
        self
    }
}

/// Engine sink forwarding chat fragments into the channel.
struct ChannelSink {
    tx: Option<mpsc::Sender<String>>,
}

impl EngineSink for ChannelSink {
    fn on_print(&mut self, kind: PrintKind, text: &str) -> ControlFlow<()> {
        match kind {
            PrintKind::ChatChunk => {
                let Some(tx) = &self.tx else {
                    return ControlFlow::Break(());
                };
                if tx.blocking_send(text.to_string()).is_err() {
                    debug!("Fragment receiver dropped, aborting generation");
                    self.tx = None;
                    return ControlFlow::Break(());
                }
            }
            PrintKind::Error => warn!(error = text, "Engine reported an error"),
            PrintKind::Meta | PrintKind::Embedding | PrintKind::Other => {
                trace!(?kind, text, "Engine output");
            }
        }
        ControlFlow::Continue(())
    }

    fn on_end(&mut self) {
        // Closing the channel is the end-of-generation signal.
        self.tx = None;
    }
}

/// A generation running on the blocking pool.
#[derive(Debug)]
pub struct Generation {
    fragments: mpsc::Receiver<String>,
    result: oneshot::Receiver<Result<(), EngineError>>,
}

impl Generation {
    /// Apply the request to the engine and start generating.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(engine: SharedEngine, request: GenerationRequest) -> Self {
        let (tx, fragments) = mpsc::channel(1);
        let (done_tx, result) = oneshot::channel();

        tokio::task::spawn_blocking(move || {
            let mut engine = lock_engine(&engine);
            if let Some(max_tokens) = request.max_tokens {
                engine.set_gen_max_tokens(max_tokens);
            }
            request.conversation.apply(&mut **engine);

            let mut sink = ChannelSink { tx: Some(tx) };
            let outcome = engine.user_input(request.conversation.pending_user(), &mut sink);
            drop(sink);

            if request.show_statistics {
                engine.show_statistics();
            }
            drop(engine);

            if let Err(e) = &outcome {
                error!(error = %e, "Generation failed");
            }
            let _ = done_tx.send(outcome);
        });

        Self { fragments, result }
    }

    /// The next fragment, or `None` once the engine has finished.
    pub async fn next_fragment(&mut self) -> Option<String> {
        self.fragments.recv().await
    }

    /// Wait for the engine to return.
    ///
    /// Any fragments not yet read are discarded and the engine is asked to
    /// stop.
    pub async fn finish(self) -> Result<(), EngineError> {
        drop(self.fragments);
        self.result.await.unwrap_or_else(|_| {
            Err(EngineError::GenerationFailed(
                "generation task ended unexpectedly".to_string(),
            ))
        })
    }

    /// Read every fragment, then wait for the engine.
    pub async fn collect(mut self) -> Result<StreamAccumulator, EngineError> {
        let mut acc = StreamAccumulator::default();
        while let Some(fragment) = self.next_fragment().await {
            acc.push(&fragment);
        }
        self.finish().await?;
        Ok(acc)
    }
}

/// Text and fragment count gathered from one generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamAccumulator {
    pub text: String,
    pub fragments: u32,
}

impl StreamAccumulator {
    pub fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.fragments = self.fragments.saturating_add(1);
    }
}

/// Embed each input on the blocking pool.
///
/// An engine without embedding support yields the placeholder vector
/// `[0.0]` per input so the response keeps its shape.
pub async fn embed_all(engine: SharedEngine, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, EngineError> {
    tokio::task::spawn_blocking(move || {
        let mut engine = lock_engine(&engine);
        inputs
            .iter()
            .map(|input| match engine.embed(input) {
                Err(EngineError::Unsupported(what)) => {
                    debug!(what, "Engine cannot embed, returning placeholder");
                    Ok(vec![0.0])
                }
                other => other,
            })
            .collect()
    })
    .await
    .map_err(|e| EngineError::GenerationFailed(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use llmgate_core::testing::{EngineCall, RecordingEngine};
    use llmgate_core::{ChatEngine, MessageRole};
    use serde_json::json;

    fn shared(engine: &RecordingEngine) -> SharedEngine {
        Arc::new(Mutex::new(Box::new(engine.clone()) as Box<dyn ChatEngine>))
    }

    fn request(messages: serde_json::Value) -> GenerationRequest {
        let messages = messages.as_array().unwrap().clone();
        GenerationRequest::new(ResolvedConversation::from_messages(&messages).unwrap())
    }

    #[tokio::test]
    async fn test_fragments_arrive_in_order() {
        let engine = RecordingEngine::with_reply(["Hel", "lo", "!"]);
        let generation = Generation::spawn(
            shared(&engine),
            request(json!([{"role": "user", "content": "hi"}])),
        );

        let acc = generation.collect().await.unwrap();

        assert_eq!(acc.text, "Hello!");
        assert_eq!(acc.fragments, 3);
    }

    #[tokio::test]
    async fn test_conversation_applied_before_input() {
        let engine = RecordingEngine::with_reply(["ok"]);
        let req = request(json!([
            {"role": "system", "content": "S"},
            {"role": "user", "content": "U1"},
            {"role": "assistant", "content": "A1"},
            {"role": "user", "content": "U2"}
        ]))
        .with_max_tokens(16)
        .with_statistics(true);

        Generation::spawn(shared(&engine), req).collect().await.unwrap();

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::SetGenMaxTokens(16),
                EngineCall::Restart(Some("S".to_string())),
                EngineCall::HistoryAppend(MessageRole::User, "U1".to_string()),
                EngineCall::HistoryAppend(MessageRole::Assistant, "A1".to_string()),
                EngineCall::UserInput("U2".to_string()),
                EngineCall::ShowStatistics,
            ]
        );
    }

    #[test]
    fn test_non_positive_max_tokens_ignored() {
        let conversation = ResolvedConversation::from_prompt(None, "p");
        assert_eq!(GenerationRequest::new(conversation.clone()).with_max_tokens(0).max_tokens, None);
        assert_eq!(GenerationRequest::new(conversation.clone()).with_max_tokens(-1).max_tokens, None);
        assert_eq!(GenerationRequest::new(conversation).with_max_tokens(8).max_tokens, Some(8));
    }

    #[tokio::test]
    async fn test_engine_failure_is_reported_after_end() {
        let engine = RecordingEngine::new().failing("out of memory");
        let mut generation = Generation::spawn(
            shared(&engine),
            request(json!([{"role": "user", "content": "hi"}])),
        );

        assert_eq!(generation.next_fragment().await, None);
        let err = generation.finish().await.unwrap_err();
        assert!(matches!(err, EngineError::GenerationFailed(msg) if msg == "out of memory"));
    }

    #[tokio::test]
    async fn test_dropping_receiver_aborts_engine() {
        let engine = RecordingEngine::with_reply(["a", "b", "c", "d", "e"]);
        let shared = shared(&engine);
        let mut generation = Generation::spawn(
            Arc::clone(&shared),
            request(json!([{"role": "user", "content": "hi"}])),
        );

        assert_eq!(generation.next_fragment().await.as_deref(), Some("a"));
        generation.finish().await.unwrap();

        // The engine lock is free again once the generation has returned.
        assert!(shared.try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_embeddings_fall_back_to_placeholder() {
        let engine = RecordingEngine::new();

        let vectors = embed_all(shared(&engine), vec!["a".into(), "b".into()])
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![0.0], vec![0.0]]);
        assert_eq!(
            engine.calls(),
            vec![EngineCall::Embed("a".into()), EngineCall::Embed("b".into())]
        );
    }

    #[tokio::test]
    async fn test_embeddings_use_engine_vectors() {
        let engine = RecordingEngine::new().with_embedding(vec![0.5, 0.25]);

        let vectors = embed_all(shared(&engine), vec!["a".into()]).await.unwrap();

        assert_eq!(vectors, vec![vec![0.5, 0.25]]);
    }
}
