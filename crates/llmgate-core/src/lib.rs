//! Core domain types and ports for llmgate.
//!
//! Nothing in this crate performs I/O: it defines the engine port, the
//! conversation reconstruction rules, the JSON conventions shared by every
//! HTTP dialect, and the gateway configuration.

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod ports;
pub mod settings;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use domain::{
    ConversationError, ConversationOp, MessageRole, ResolvedConversation, message_content,
};
pub use ports::{ChatEngine, EngineError, EngineFactory, EngineParams, EngineSink, PrintKind};
pub use settings::{
    DEFAULT_CONTEXT_SIZE, DEFAULT_GATEWAY_HOST, DEFAULT_GATEWAY_PORT, DEFAULT_READ_BUFFER_SIZE,
    DEFAULT_READ_TIMEOUT, GatewayConfig,
};
