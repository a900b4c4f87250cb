//! Conversation reconstruction.
//!
//! Clients either replay a whole transcript on every request or send only the
//! latest turn and rely on the engine remembering earlier ones. Both are
//! served by a single left-to-right pass over the message array:
//!
//! - `system` resets the engine context with the message as system prompt.
//! - `user` becomes the pending input, replacing any unresolved one.
//! - `assistant` commits the pending user message and itself to the engine
//!   history. Without a pending user message it is dropped, since the engine
//!   already holds that turn from an earlier request.
//!
//! Whatever user message is still pending at the end is the input for this
//! generation. Resolution is pure; [`ResolvedConversation::apply`] performs
//! the engine calls, so a request that fails validation never touches the
//! engine.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::domain::MessageRole;
use crate::ports::ChatEngine;
use crate::utils::json::{get_array, get_string};

/// Errors raised while resolving a message array.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    /// No user message is left to generate a reply for.
    #[error("no user message found")]
    NoUserMessage,
}

/// One engine call produced by reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOp {
    /// Reset the context with a new system prompt.
    Restart(String),
    /// Commit a finished turn to history.
    Append { role: MessageRole, text: String },
}

/// The engine operations and pending input derived from a message array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConversation {
    ops: Vec<ConversationOp>,
    pending_user: String,
}

impl ResolvedConversation {
    /// Resolve an ordered array of `{role, content}` messages.
    ///
    /// Entries that are not objects or carry an unknown role are skipped.
    pub fn from_messages(messages: &[Value]) -> Result<Self, ConversationError> {
        let mut ops = Vec::new();
        let mut pending_user: Option<String> = None;

        for message in messages {
            let Some(role) = get_string(message, "role").and_then(MessageRole::parse) else {
                debug!(message = %message, "Skipping message without a known role");
                continue;
            };
            let content = message_content(message);

            match role {
                MessageRole::System => ops.push(ConversationOp::Restart(content)),
                MessageRole::User => {
                    if pending_user.is_some() {
                        debug!("Consecutive user messages; keeping the latest");
                    }
                    pending_user = Some(content);
                }
                MessageRole::Assistant => match pending_user.take() {
                    Some(user) => {
                        ops.push(ConversationOp::Append {
                            role: MessageRole::User,
                            text: user,
                        });
                        ops.push(ConversationOp::Append {
                            role: MessageRole::Assistant,
                            text: content,
                        });
                    }
                    None => debug!("Assistant message without a pending user turn; dropped"),
                },
            }
        }

        let pending_user = pending_user.ok_or(ConversationError::NoUserMessage)?;
        Ok(Self { ops, pending_user })
    }

    /// Build a single-turn conversation from a raw prompt.
    pub fn from_prompt(system: Option<&str>, prompt: impl Into<String>) -> Self {
        let ops = system
            .map(|s| vec![ConversationOp::Restart(s.to_string())])
            .unwrap_or_default();
        Self {
            ops,
            pending_user: prompt.into(),
        }
    }

    /// Engine operations in the order they must be applied.
    pub fn ops(&self) -> &[ConversationOp] {
        &self.ops
    }

    /// The user message to generate a reply for.
    pub fn pending_user(&self) -> &str {
        &self.pending_user
    }

    /// Apply the recorded operations to `engine`.
    ///
    /// Does not submit the pending input; the caller does that once it is
    /// ready to receive output.
    pub fn apply(&self, engine: &mut dyn ChatEngine) {
        for op in &self.ops {
            match op {
                ConversationOp::Restart(system) => engine.restart(Some(system)),
                ConversationOp::Append { role, text } => engine.history_append(*role, text),
            }
        }
    }
}

/// Extract the text of a message.
///
/// Accepts a plain string or an array of content parts, in which case the
/// `text` of every `{"type": "text"}` part is concatenated. Anything else is
/// the empty string.
pub fn message_content(message: &Value) -> String {
    if let Some(text) = get_string(message, "content") {
        return text.to_string();
    }
    get_array(message, "content")
        .map(|parts| {
            parts
                .iter()
                .filter(|part| get_string(part, "type") == Some("text"))
                .filter_map(|part| get_string(part, "text"))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, RecordingEngine};
    use serde_json::json;

    fn messages(value: Value) -> Vec<Value> {
        value.as_array().cloned().unwrap_or_default()
    }

    #[test]
    fn test_full_transcript_replays_history() {
        let msgs = messages(json!([
            {"role": "system", "content": "S"},
            {"role": "user", "content": "U1"},
            {"role": "assistant", "content": "A1"},
            {"role": "user", "content": "U2"}
        ]));

        let resolved = ResolvedConversation::from_messages(&msgs).unwrap();
        let mut engine = RecordingEngine::new();
        resolved.apply(&mut engine);

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::Restart(Some("S".to_string())),
                EngineCall::HistoryAppend(MessageRole::User, "U1".to_string()),
                EngineCall::HistoryAppend(MessageRole::Assistant, "A1".to_string()),
            ]
        );
        assert_eq!(resolved.pending_user(), "U2");
    }

    #[test]
    fn test_latest_turn_only() {
        let msgs = messages(json!([{"role": "user", "content": "hi"}]));

        let resolved = ResolvedConversation::from_messages(&msgs).unwrap();

        assert!(resolved.ops().is_empty());
        assert_eq!(resolved.pending_user(), "hi");
    }

    #[test]
    fn test_no_user_message_fails() {
        let msgs = messages(json!([
            {"role": "system", "content": "S"},
            {"role": "assistant", "content": "A"}
        ]));

        assert_eq!(
            ResolvedConversation::from_messages(&msgs),
            Err(ConversationError::NoUserMessage)
        );
        assert_eq!(
            ResolvedConversation::from_messages(&[]),
            Err(ConversationError::NoUserMessage)
        );
    }

    #[test]
    fn test_trailing_assistant_consumes_pending_user() {
        let msgs = messages(json!([
            {"role": "user", "content": "U1"},
            {"role": "assistant", "content": "A1"}
        ]));

        assert_eq!(
            ResolvedConversation::from_messages(&msgs),
            Err(ConversationError::NoUserMessage)
        );
    }

    #[test]
    fn test_consecutive_user_messages_keep_latest() {
        let msgs = messages(json!([
            {"role": "user", "content": "first"},
            {"role": "user", "content": "second"}
        ]));

        let resolved = ResolvedConversation::from_messages(&msgs).unwrap();

        assert!(resolved.ops().is_empty());
        assert_eq!(resolved.pending_user(), "second");
    }

    #[test]
    fn test_orphan_assistant_is_dropped() {
        let msgs = messages(json!([
            {"role": "assistant", "content": "earlier reply"},
            {"role": "user", "content": "next"}
        ]));

        let resolved = ResolvedConversation::from_messages(&msgs).unwrap();

        assert!(resolved.ops().is_empty());
        assert_eq!(resolved.pending_user(), "next");
    }

    #[test]
    fn test_system_between_turns_keeps_pending_user() {
        let msgs = messages(json!([
            {"role": "user", "content": "U"},
            {"role": "system", "content": "S"}
        ]));

        let resolved = ResolvedConversation::from_messages(&msgs).unwrap();

        assert_eq!(resolved.ops(), &[ConversationOp::Restart("S".to_string())]);
        assert_eq!(resolved.pending_user(), "U");
    }

    #[test]
    fn test_unknown_roles_and_non_objects_are_skipped() {
        let msgs = messages(json!([
            "not a message",
            {"role": "tool", "content": "{}"},
            {"content": "no role"},
            {"role": "user", "content": "U"}
        ]));

        let resolved = ResolvedConversation::from_messages(&msgs).unwrap();

        assert!(resolved.ops().is_empty());
        assert_eq!(resolved.pending_user(), "U");
    }

    #[test]
    fn test_content_parts_are_concatenated() {
        let message = json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "Describe "},
                {"type": "image_url", "image_url": {"url": "data:..."}},
                {"type": "text", "text": "this."}
            ]
        });

        assert_eq!(message_content(&message), "Describe this.");
    }

    #[test]
    fn test_missing_content_is_empty() {
        assert_eq!(message_content(&json!({"role": "user"})), "");
        assert_eq!(message_content(&json!({"role": "user", "content": null})), "");
    }

    #[test]
    fn test_from_prompt_with_system() {
        let resolved = ResolvedConversation::from_prompt(Some("be brief"), "why?");

        assert_eq!(
            resolved.ops(),
            &[ConversationOp::Restart("be brief".to_string())]
        );
        assert_eq!(resolved.pending_user(), "why?");
    }
}
