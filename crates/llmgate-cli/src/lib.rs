//! Command-line entry point for llmgate.
//!
//! `main.rs` parses [`Cli`] and hands the selected command to [`handlers`].

#![deny(unused_crate_dependencies)]

// Used by main.rs only
use dotenvy as _;
use tracing_subscriber as _;

#[cfg(test)]
use tempfile as _;

pub mod commands;
pub mod handlers;
pub mod parser;

pub use commands::{Backend, Commands, ServeArgs};
pub use parser::Cli;
