//! Subcommands and their arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};

use llmgate_core::ports::EngineFactory;
use llmgate_core::{
    DEFAULT_CONTEXT_SIZE, DEFAULT_GATEWAY_HOST, DEFAULT_GATEWAY_PORT, DEFAULT_READ_BUFFER_SIZE,
    DEFAULT_READ_TIMEOUT, GatewayConfig,
};
use llmgate_runtime::EchoEngineFactory;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load a model and serve it until interrupted
    Serve(ServeArgs),
}

/// Engine implementation to load the model with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Replies with the user's input, word by word
    #[default]
    Echo,
}

impl Backend {
    /// The factory that builds engines for this backend.
    #[must_use]
    pub fn factory(self) -> Box<dyn EngineFactory> {
        match self {
            Self::Echo => Box::new(EchoEngineFactory),
        }
    }
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Model file to load; without one the gateway answers 503 to generation requests
    #[arg(short = 'm', long, env = "LLMGATE_MODEL")]
    pub model: Option<PathBuf>,

    /// Host to bind to
    #[arg(long, env = "LLMGATE_HOST", default_value = DEFAULT_GATEWAY_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short = 'p', long, env = "LLMGATE_PORT", default_value_t = DEFAULT_GATEWAY_PORT)]
    pub port: u16,

    /// Context window size in tokens
    #[arg(
        short = 'c',
        long = "ctx-size",
        env = "LLMGATE_CTX_SIZE",
        default_value_t = DEFAULT_CONTEXT_SIZE,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub ctx_size: u32,

    /// Engine backend
    #[arg(long, env = "LLMGATE_BACKEND", value_enum, default_value_t)]
    pub backend: Backend,

    /// Session file restored at startup and saved on shutdown
    #[arg(long, env = "LLMGATE_SESSION")]
    pub session: Option<PathBuf>,

    /// Ask the engine for statistics after every generation
    #[arg(long, env = "LLMGATE_STATS")]
    pub stats: bool,

    /// Seconds a client may take to send its request
    #[arg(long = "read-timeout", env = "LLMGATE_READ_TIMEOUT", default_value_t = DEFAULT_READ_TIMEOUT.as_secs())]
    pub read_timeout_secs: u64,

    /// Extra argument passed to the engine verbatim (repeatable)
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,
}

impl ServeArgs {
    /// Build the gateway configuration these arguments describe.
    #[must_use]
    pub fn to_config(&self) -> GatewayConfig {
        GatewayConfig {
            host: self.host.clone(),
            port: self.port,
            model_path: self.model.clone(),
            context_size: self.ctx_size,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            show_statistics: self.stats,
            session_path: self.session.clone(),
            engine_args: self.engine_args.clone(),
        }
    }
}
