//! HTTP/WebSocket front end
//!
//! Routes:
//! - `GET /ws/generate` - upgrade to a WebSocket and run one [`Session`] on it
//! - `GET /health` - static liveness check, unrelated to any session
//!
//! Every route allows any origin, so browser clients served from another host can connect.

use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::config::StreamConfig;
use crate::renderer::FrameRenderer;
use crate::renderers::PlaceholderRenderer;
use crate::session::Session;
use crate::transport::websocket;

/// Shared, read-only state handed to every connection
#[derive(Clone)]
pub struct AppState {
    config: Arc<StreamConfig>,
    renderer: Arc<dyn FrameRenderer>,
}

impl AppState {
    pub fn new(config: StreamConfig, renderer: Arc<dyn FrameRenderer>) -> Self {
        Self { config: Arc::new(config), renderer }
    }

    /// State using the placeholder renderer configured from `config`
    pub fn with_placeholder(config: StreamConfig) -> Self {
        let renderer = Arc::new(PlaceholderRenderer::from_config(&config));
        Self::new(config, renderer)
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    fn session(&self) -> Session {
        Session::new(Arc::clone(&self.config), Arc::clone(&self.renderer))
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws/generate", get(ws_generate))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on {}", addr);
    }
    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn ws_generate(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (source, sink) = websocket::split(socket, state.config.write_timeout());
    let outcome = state.session().run(source, sink).await;
    debug!(
        "Session {} ended in {:?} ({} frames, {} chunks)",
        outcome.id, outcome.state, outcome.frames_sent, outcome.chunks_sent
    );
}
