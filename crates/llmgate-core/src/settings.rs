//! Gateway configuration.
//!
//! Plain configuration values with their defaults. The binary layers
//! command-line flags and environment variables over these.

use std::path::PathBuf;
use std::time::Duration;

use crate::ports::EngineParams;

/// Default port the gateway listens on (the port Ollama clients probe).
pub const DEFAULT_GATEWAY_PORT: u16 = 11434;

/// Default bind address.
pub const DEFAULT_GATEWAY_HOST: &str = "127.0.0.1";

/// Default context window reported to clients and passed to the engine.
pub const DEFAULT_CONTEXT_SIZE: u32 = 4096;

/// Size of the per-connection request buffer. Requests must fit in it.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// How long a client may take to deliver its request.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to (0 for auto-assign).
    pub port: u16,
    /// Model file to load; `None` starts the gateway without a model.
    pub model_path: Option<PathBuf>,
    /// Context window size in tokens.
    pub context_size: u32,
    /// Per-connection read buffer size in bytes.
    pub read_buffer_size: usize,
    /// Deadline for receiving a complete request.
    pub read_timeout: Duration,
    /// Ask the engine for statistics after every generation.
    pub show_statistics: bool,
    /// Session file restored at startup and written at shutdown.
    pub session_path: Option<PathBuf>,
    /// Extra arguments passed to the engine verbatim.
    pub engine_args: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_GATEWAY_HOST.to_string(),
            port: DEFAULT_GATEWAY_PORT,
            model_path: None,
            context_size: DEFAULT_CONTEXT_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            show_statistics: false,
            session_path: None,
            engine_args: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// The `host:port` string to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Engine parameters for the configured model, if any.
    #[must_use]
    pub fn engine_params(&self) -> Option<EngineParams> {
        self.model_path.as_ref().map(|path| EngineParams {
            model_path: path.clone(),
            context_size: self.context_size,
            extra_args: self.engine_args.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:11434");
        assert_eq!(config.read_buffer_size, 65536);
        assert!(config.engine_params().is_none());
    }

    #[test]
    fn test_engine_params_carry_context_and_args() {
        let config = GatewayConfig {
            model_path: Some(PathBuf::from("/models/chat.bin")),
            context_size: 1024,
            engine_args: vec!["--threads".to_string(), "4".to_string()],
            ..GatewayConfig::default()
        };

        let params = config.engine_params().unwrap();
        assert_eq!(params.model_path, PathBuf::from("/models/chat.bin"));
        assert_eq!(params.context_size, 1024);
        assert_eq!(params.extra_args, vec!["--threads", "4"]);
    }
}
