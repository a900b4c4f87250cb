//! HTTP gateway exposing one local engine through OpenAI, Ollama and
//! llama.cpp compatible endpoints.
//!
//! HTTP/1.1 is parsed by hand: one request per connection, one connection
//! at a time, responses either plain or chunked. Generation runs on the
//! blocking pool and streams back through [`generation::Generation`].

#![deny(unused_crate_dependencies)]

pub mod error;
pub mod generation;
pub mod handlers;
pub mod models;
pub mod ollama_models;
pub mod routes;
pub mod server;
pub mod state;
pub mod stream;
pub mod wire;

pub use error::{Dialect, GatewayError};
pub use generation::{Generation, GenerationRequest, StreamAccumulator};
pub use routes::Route;
pub use server::{ConnectionOptions, handle_connection, serve};
pub use state::{GatewayState, GenerationSlot, LoadedModel, SharedEngine};
pub use wire::{HttpRequest, RequestParseError, parse_request};

// Used by the integration tests only.
#[cfg(test)]
use llmgate_runtime as _;
#[cfg(test)]
use reqwest as _;
