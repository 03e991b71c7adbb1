//! Shared utilities for integration and load testing.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ordnung_gate::{AppState, GateConfig, GateServer, Shutdown};

/// A gate serving on an ephemeral local port.
pub struct TestGate {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub state: AppState,
    #[allow(dead_code)]
    pub updates: mpsc::UnboundedSender<GateConfig>,
}

impl TestGate {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGate {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the gate in front of `app`.
pub async fn start_gate(config: GateConfig, app: Router<AppState>) -> TestGate {
    start_gate_with_state(AppState::new(config), app).await
}

/// Start the gate with a prebuilt state, for apps that need its cache.
pub async fn start_gate_with_state(state: AppState, app: Router<AppState>) -> TestGate {
    let server = GateServer::with_routes(state.clone(), app);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    TestGate {
        addr,
        shutdown,
        state,
        updates,
    }
}

/// A client that never reuses connections or goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
