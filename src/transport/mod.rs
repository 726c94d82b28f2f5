//! Transport abstraction between sessions and connections
//!
//! A connection is split into a [`MessageSource`] (inbound text messages) and a
//! [`MessageSink`] (outbound [`ServerMessage`]s). The session reads the init message
//! from the source itself, then hands the source to a [`DisconnectWatch`] which
//! drains it in the background and reports when the peer goes away.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::types::ServerMessage;
use crate::{ErrorKind, Result};

pub mod channel;
pub mod websocket;

/// Inbound half of a connection
#[async_trait::async_trait]
pub trait MessageSource: Send + 'static {
    /// Receive the next text message
    ///
    /// Returns:
    /// - `Ok(Some(text))` - a message arrived
    /// - `Ok(None)` - the peer closed the connection
    /// - `Err(e)` - the read side failed (transport) or the message was unusable (protocol)
    async fn next_message(&mut self) -> Result<Option<String>>;
}

/// Outbound half of a connection
#[async_trait::async_trait]
pub trait MessageSink: Send {
    /// Serialize and write one message, waiting until it has been handed to the peer
    async fn send(&mut self, message: &ServerMessage) -> Result<()>;

    /// Close the connection. No further sends are attempted afterwards.
    async fn close(&mut self) -> Result<()>;
}

/// Background drain of a connection's inbound half after the handshake.
///
/// The token returned by [`token`](Self::token) is cancelled once the peer closes
/// or the read side fails. Messages arriving mid-stream are logged and dropped.
/// Dropping the watch stops the background task.
pub struct DisconnectWatch {
    peer_gone: CancellationToken,
    shutdown: CancellationToken,
}

impl DisconnectWatch {
    /// Spawn the drain task for `source`
    pub fn spawn<S: MessageSource>(source: S) -> Self {
        let peer_gone = CancellationToken::new();
        let shutdown = CancellationToken::new();

        tokio::spawn(Self::drain(source, peer_gone.clone(), shutdown.clone()));

        Self { peer_gone, shutdown }
    }

    /// Token cancelled when the peer disconnects
    pub fn token(&self) -> CancellationToken {
        self.peer_gone.clone()
    }

    pub fn is_disconnected(&self) -> bool {
        self.peer_gone.is_cancelled()
    }

    async fn drain<S: MessageSource>(
        mut source: S,
        peer_gone: CancellationToken,
        shutdown: CancellationToken,
    ) {
        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                message = source.next_message() => message,
            };

            match message {
                Ok(Some(text)) => {
                    debug!("Ignoring {} byte message received mid-stream", text.len());
                }
                Ok(None) => {
                    info!("Peer closed the connection");
                    peer_gone.cancel();
                    break;
                }
                Err(e) if e.kind() == ErrorKind::Transport => {
                    warn!("Read side failed: {}", e);
                    peer_gone.cancel();
                    break;
                }
                Err(e) => {
                    debug!("Ignoring unusable mid-stream message: {}", e);
                }
            }
        }
    }
}

impl Drop for DisconnectWatch {
    fn drop(&mut self) {
        // Stop draining; the session is done with this connection
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::channel;
    use std::time::Duration;

    #[tokio::test]
    async fn peer_close_cancels_token() {
        let (mut client, source, _sink) = channel::pair();
        let watch = DisconnectWatch::spawn(source);
        let token = watch.token();

        client.send_text("mid-stream chatter").await;
        assert!(!watch.is_disconnected());

        client.disconnect();
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("token should be cancelled after disconnect");
        assert!(watch.is_disconnected());
    }

    #[tokio::test]
    async fn dropping_watch_stops_drain_without_cancelling() {
        let (_client, source, _sink) = channel::pair();
        let watch = DisconnectWatch::spawn(source);
        let token = watch.token();

        drop(watch);
        tokio::task::yield_now().await;
        assert!(!token.is_cancelled());
    }
}
