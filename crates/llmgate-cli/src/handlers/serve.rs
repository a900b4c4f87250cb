//! Serve command handler.
//!
//! Loads the engine, restores the session, and runs the gateway until
//! Ctrl-C. The session is written back on the way out.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use llmgate_core::GatewayConfig;
use llmgate_gateway::{ConnectionOptions, GatewayState, serve};

use crate::commands::ServeArgs;

/// Execute the serve command.
pub async fn execute(args: ServeArgs) -> Result<()> {
    let config = args.to_config();
    let factory = args.backend.factory();

    let state = GatewayState::load(factory.as_ref(), &config).context("Failed to load model")?;
    restore_session(&state, &config);

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address()))?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let state = Arc::new(state);
    serve(listener, Arc::clone(&state), ConnectionOptions::from(&config), cancel).await?;

    persist_session(&state, &config)
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupt received, shutting down"),
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
    }
    cancel.cancel();
}

/// Restore the configured session if the file exists. A broken session
/// file is logged and the gateway starts with an empty conversation.
fn restore_session(state: &GatewayState, config: &GatewayConfig) {
    let Some(path) = config.session_path.as_deref() else {
        return;
    };
    if !state.is_loaded() || !path.exists() {
        return;
    }
    match state.load_session(path) {
        Ok(()) => info!(path = %path.display(), "Session restored"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to restore session"),
    }
}

fn persist_session(state: &GatewayState, config: &GatewayConfig) -> Result<()> {
    let Some(path) = config.session_path.as_deref() else {
        return Ok(());
    };
    if !state.is_loaded() {
        return Ok(());
    }
    state
        .save_session(path)
        .with_context(|| format!("Failed to save session to {}", path.display()))?;
    info!(path = %path.display(), "Session saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmgate_runtime::EchoEngineFactory;

    fn config_with(dir: &tempfile::TempDir) -> GatewayConfig {
        let model = dir.path().join("echo.gguf");
        std::fs::write(&model, b"weights").unwrap();
        GatewayConfig {
            model_path: Some(model),
            session_path: Some(dir.path().join("session.json")),
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn test_session_round_trips_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with(&dir);
        let state = GatewayState::load(&EchoEngineFactory, &config).unwrap();

        persist_session(&state, &config).unwrap();

        assert!(config.session_path.as_ref().unwrap().exists());
        let reloaded = GatewayState::load(&EchoEngineFactory, &config).unwrap();
        restore_session(&reloaded, &config);
    }

    #[test]
    fn test_missing_session_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with(&dir);
        let state = GatewayState::load(&EchoEngineFactory, &config).unwrap();

        restore_session(&state, &config);

        assert!(!config.session_path.as_ref().unwrap().exists());
    }

    #[test]
    fn test_no_model_skips_session_save() {
        let dir = tempfile::tempdir().unwrap();
        let config = GatewayConfig {
            session_path: Some(dir.path().join("session.json")),
            ..GatewayConfig::default()
        };
        let state = GatewayState::load(&EchoEngineFactory, &config).unwrap();

        persist_session(&state, &config).unwrap();

        assert!(!dir.path().join("session.json").exists());
    }

    #[test]
    fn test_missing_model_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = GatewayConfig {
            model_path: Some(dir.path().join("absent.gguf")),
            ..GatewayConfig::default()
        };

        assert!(GatewayState::load(&EchoEngineFactory, &config).is_err());
    }
}
