//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

use axum::Router;
use overlay_engine::config::Config;
use overlay_engine::store::{
    LocalOverlayStore, NewOverlay, OverlayKind, Position, Size, StoreAppState, StyleOverrides,
    store_routes,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

/// Create a test application router backed by the given store
pub fn create_test_app(store: Arc<LocalOverlayStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", store_routes(StoreAppState::new(store)))
        .layer(cors)
}

/// A store server listening on an ephemeral local port
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<LocalOverlayStore>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let store = Arc::new(LocalOverlayStore::new());
        let app = create_test_app(store.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server failed");
        });

        Self {
            addr,
            store,
            handle,
        }
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Engine configuration pointing at this server with fast timings
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.api_base_url = self.api_url();
        config.request.timeout = Duration::from_secs(2);
        config.request.retries = 1;
        config.request.retry_delay = Duration::from_millis(50);
        config.persistence.debounce = Duration::from_millis(100);
        config
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Create a new text overlay with standard values
pub fn create_test_overlay(content: &str) -> NewOverlay {
    NewOverlay {
        name: Some("Lower Third".to_string()),
        kind: OverlayKind::Text,
        content: content.to_string(),
        position: Position::new(10.0, 10.0),
        size: Size::new(20.0, 10.0),
        style: StyleOverrides::default(),
    }
}

/// Initialize test logging for detailed output
#[allow(dead_code)]
pub fn init_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "overlay_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
