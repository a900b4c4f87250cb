//! Gateway instances bound to `127.0.0.1:0`.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use llmgate_core::ChatEngine;
use llmgate_gateway::{ConnectionOptions, GatewayState, LoadedModel, serve};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Name the test model is served under.
pub const TEST_MODEL: &str = "tiny-chat.gguf";

/// Context size reported by test gateways.
pub const TEST_CONTEXT: u32 = 2048;

/// A running gateway. Dropping it stops the accept loop.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: Arc<GatewayState>,
    cancel: CancellationToken,
}

impl TestGateway {
    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State serving `engine` under [`TEST_MODEL`].
pub fn state_with(engine: impl ChatEngine + 'static) -> GatewayState {
    GatewayState::with_engine(
        LoadedModel::from_path(Path::new(TEST_MODEL)),
        Box::new(engine),
        TEST_CONTEXT,
    )
}

/// Bind an ephemeral port and serve `state` on it.
pub async fn spawn_gateway(state: GatewayState) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");
    let state = Arc::new(state);
    let cancel = CancellationToken::new();

    tokio::spawn(serve(
        listener,
        Arc::clone(&state),
        ConnectionOptions::default(),
        cancel.clone(),
    ));

    TestGateway {
        addr,
        state,
        cancel,
    }
}
