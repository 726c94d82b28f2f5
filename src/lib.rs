//! Chunked text-to-video streaming sessions with a pluggable frame renderer.
//!
//! Reelwire reproduces the session contract of a real-time text-to-video backend:
//! a client sends one generation request over a duplex connection and receives
//! every frame in order, grouped into fixed-size chunks, followed by exactly one
//! terminal message. Pixel synthesis is delegated to a [`FrameRenderer`]; the
//! bundled [`PlaceholderRenderer`] draws progress visuals so chunk and segment
//! behaviour can be audited by eye.
//!
//! # Features
//!
//! - **Segments and reprompts**: prompts switch at client-chosen frame indices;
//!   reprompts replace the tail of the prompt list without restarting
//! - **Chunked delivery**: frames are rendered block by block and flushed in chunks
//! - **Explicit lifecycle**: every session ends in `Done`, `Error` or `Closed`
//! - **Transport agnostic**: WebSocket via axum, or in-memory channels for tests
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use reelwire::{Reelwire, StreamConfig};
//!
//! #[tokio::main]
//! async fn main() -> reelwire::Result<()> {
//!     let shutdown = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     Reelwire::serve("0.0.0.0:8010", StreamConfig::default(), shutdown).await
//! }
//! ```
//!
//! ## Example (in-memory session)
//!
//! ```rust
//! use reelwire::{InitRequest, Reelwire, ServerMessage, StreamConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = StreamConfig {
//!     frame_width: 16,
//!     frame_height: 16,
//!     block_latency_ms: 0,
//!     ..StreamConfig::default()
//! };
//! let (mut client, session) = Reelwire::spawn_local(config);
//!
//! client.send_init(&InitRequest::with_prompts(["a red fox", "a blue fox"])).await;
//! let messages = client.collect().await;
//!
//! assert_eq!(messages.last(), Some(&ServerMessage::done(120)));
//! assert_eq!(session.await.unwrap().frames_sent, 120);
//! # }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Session pipeline, leaf first
pub mod handshake;
pub mod planner;
pub mod renderer;
pub mod renderers;
pub mod scheduler;
pub mod session;

// Connections
pub mod server;
pub mod transport;

// Core exports
pub use config::StreamConfig;
pub use error::*;
pub use types::*;

// Main API exports
pub use handshake::{SessionHandshake, SessionParams};
pub use planner::SegmentPlan;
pub use renderer::{FrameRenderer, RenderRequest};
pub use renderers::PlaceholderRenderer;
pub use scheduler::ChunkScheduler;
pub use session::{Session, SessionOutcome, SessionState};

use std::future::Future;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::task::JoinHandle;

use server::AppState;
use transport::channel::{self, ClientEnd};

/// Unified entry point for running sessions.
///
/// ## Network server
/// ```rust,no_run
/// use reelwire::{Reelwire, StreamConfig};
///
/// # #[tokio::main]
/// # async fn main() -> reelwire::Result<()> {
/// Reelwire::serve("127.0.0.1:8010", StreamConfig::default(), std::future::pending::<()>()).await
/// # }
/// ```
pub struct Reelwire;

impl Reelwire {
    /// Bind `addr` and serve sessions with the placeholder renderer until `shutdown`
    /// resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration does not validate
    /// - The address cannot be bound
    pub async fn serve<A, F>(addr: A, config: StreamConfig, shutdown: F) -> Result<()>
    where
        A: ToSocketAddrs,
        F: Future<Output = ()> + Send + 'static,
    {
        config.validate()?;
        let listener = TcpListener::bind(addr).await?;
        server::serve(listener, AppState::with_placeholder(config), shutdown).await?;
        Ok(())
    }

    /// Run one session over an in-memory connection with the placeholder renderer.
    ///
    /// Returns the client end and a handle resolving to the session outcome.
    pub fn spawn_local(config: StreamConfig) -> (ClientEnd, JoinHandle<SessionOutcome>) {
        let renderer = Arc::new(PlaceholderRenderer::from_config(&config));
        Self::spawn_local_with(config, renderer)
    }

    /// Run one session over an in-memory connection with a custom renderer.
    pub fn spawn_local_with(
        config: StreamConfig,
        renderer: Arc<dyn FrameRenderer>,
    ) -> (ClientEnd, JoinHandle<SessionOutcome>) {
        let (client, source, sink) = channel::pair();
        let session = Session::new(Arc::new(config), renderer);
        (client, tokio::spawn(session.run(source, sink)))
    }
}
