//! Error types for streaming sessions.
//!
//! Every failure a session can hit maps onto one [`SessionError`] variant, and every
//! variant maps onto one [`ErrorKind`]. The kind decides what the session does next:
//!
//! - **Protocol**: the init message was malformed or inconsistent. Reported to the
//!   client, no frames are generated.
//! - **Render**: the frame renderer failed mid-stream. Reported to the client if the
//!   connection is still writable; chunks already sent stay valid.
//! - **Transport**: the connection went away or a write failed. Logged only.
//! - **Config**: startup configuration problems. Never reaches a session.
//!
//! ```rust
//! use reelwire::{ErrorKind, SessionError};
//!
//! let error = SessionError::protocol("missing required field `prompts`");
//! assert_eq!(error.kind(), ErrorKind::Protocol);
//! assert!(error.is_reportable());
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T, E = SessionError> = std::result::Result<T, E>;

/// Main error type for session operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SessionError {
    #[error("Protocol error: {reason}")]
    Protocol { reason: String },

    #[error("Render failed at frame {frame_index}: {reason}")]
    Render {
        frame_index: u64,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{operation} timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    #[error("Peer disconnected")]
    Disconnected,

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Configuration file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification of a [`SessionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Protocol,
    Render,
    Transport,
    Config,
}

impl SessionError {
    /// Category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Protocol { .. } => ErrorKind::Protocol,
            SessionError::Render { .. } => ErrorKind::Render,
            SessionError::Transport { .. } => ErrorKind::Transport,
            SessionError::Timeout { .. } => ErrorKind::Transport,
            SessionError::Disconnected => ErrorKind::Transport,
            SessionError::Config { .. } => ErrorKind::Config,
            SessionError::File { .. } => ErrorKind::Config,
        }
    }

    /// Whether the session should try to tell the client about this error.
    ///
    /// Transport failures are never reported since there is nobody left to read
    /// the message.
    pub fn is_reportable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Protocol | ErrorKind::Render)
    }

    /// Helper constructor for protocol errors.
    pub fn protocol(reason: impl Into<String>) -> Self {
        SessionError::Protocol { reason: reason.into() }
    }

    /// Helper constructor for render errors.
    pub fn render_failed(frame_index: u64, reason: impl Into<String>) -> Self {
        SessionError::Render { frame_index, reason: reason.into(), source: None }
    }

    /// Helper constructor for render errors with source.
    pub fn render_failed_with_source(
        frame_index: u64,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SessionError::Render { frame_index, reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for transport errors.
    pub fn transport(reason: impl Into<String>) -> Self {
        SessionError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SessionError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for timeouts.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        SessionError::Timeout { operation: operation.into(), duration }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        SessionError::Config { reason: reason.into() }
    }

    /// Helper constructor for configuration file errors.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        SessionError::File { path, source }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::transport_with_source("I/O failure", Box::new(err))
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::protocol(format!("invalid JSON: {err}"))
    }
}
