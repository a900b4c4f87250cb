//! Engine adapters for llmgate.
//!
//! Implementations of the core engine port that ship with the gateway.

#![deny(unused_crate_dependencies)]

pub mod echo;

pub use echo::{EchoEngine, EchoEngineFactory, Turn};

#[cfg(test)]
use tempfile as _;
