//! Root CLI structure with global options.

use clap::Parser;

use crate::commands::Commands;

/// Serve one local model to OpenAI, Ollama and llama.cpp clients.
#[derive(Debug, Parser)]
#[command(name = "llmgate")]
#[command(about = "Inference gateway for a single local model")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set.
    #[must_use]
    pub const fn default_log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
