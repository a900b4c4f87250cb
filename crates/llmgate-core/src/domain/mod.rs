//! Domain types shared by every HTTP dialect.

pub mod chat;
pub mod conversation;

pub use chat::MessageRole;
pub use conversation::{ConversationError, ConversationOp, ResolvedConversation, message_content};
