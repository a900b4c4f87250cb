//! Connection loop.
//!
//! Connections are served one at a time: accept, read one request, answer
//! it, close. A failing connection is logged and never stops the loop.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use llmgate_core::{DEFAULT_READ_BUFFER_SIZE, DEFAULT_READ_TIMEOUT, GatewayConfig};

use crate::error::{Dialect, GatewayError};
use crate::handlers::{dispatch, respond_error};
use crate::state::GatewayState;
use crate::wire::{parse_request, read_request};

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Size of the request buffer; larger requests are rejected.
    pub read_buffer_size: usize,
    /// Deadline for the complete request to arrive.
    pub read_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl From<&GatewayConfig> for ConnectionOptions {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            read_buffer_size: config.read_buffer_size,
            read_timeout: config.read_timeout,
        }
    }
}

/// Serve connections from a pre-bound listener until `cancel` fires.
///
/// # Errors
///
/// Returns an error only if the listener's address cannot be read; per
/// connection failures are logged and skipped.
pub async fn serve(
    listener: TcpListener,
    state: Arc<GatewayState>,
    options: ConnectionOptions,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, model = state.model_name(), "Gateway listening");
    info!("OpenAI clients: http://{addr}/v1, Ollama clients: http://{addr}");

    loop {
        let accepted = tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                debug!(%peer, "Accepted connection");
                if let Err(e) = handle_connection(stream, &state, options).await {
                    warn!(%peer, error = %e, "Connection failed");
                }
            }
            Err(e) => warn!(error = %e, "Failed to accept connection"),
        }
    }

    info!("Gateway shut down");
    Ok(())
}

/// Read one request from `stream`, answer it, and close the stream.
///
/// # Errors
///
/// Returns the I/O error that ended the exchange, if any.
pub async fn handle_connection<S>(mut stream: S, state: &GatewayState, options: ConnectionOptions) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let start = Instant::now();
    let mut buf = vec![0u8; options.read_buffer_size];

    let Ok(read) = tokio::time::timeout(options.read_timeout, read_request(&mut stream, &mut buf)).await else {
        warn!(timeout_ms = options.read_timeout.as_millis(), "Timed out reading request");
        return Ok(());
    };
    let len = read?;
    if len == 0 {
        debug!("Connection closed before sending a request");
        return Ok(());
    }

    match parse_request(&buf[..len]) {
        Ok(request) => {
            dispatch(state, &request, &mut stream).await?;
            info!(
                method = request.method,
                path = request.path,
                elapsed_ms = start.elapsed().as_millis(),
                "Request served"
            );
        }
        Err(e) => {
            respond_error(&mut stream, Dialect::Plain, &GatewayError::from(e)).await?;
        }
    }

    stream.shutdown().await
}
