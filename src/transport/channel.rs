//! In-memory transport backed by bounded tokio channels
//!
//! Used to drive sessions without a network connection, from tests or from an
//! embedding application. Messages cross the channel as serialized JSON text, so
//! the wire shape is exercised exactly as on a WebSocket.

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{MessageSink, MessageSource};
use crate::types::{InitRequest, ServerMessage};
use crate::{Result, SessionError};

/// Default number of in-flight messages per direction
pub const DEFAULT_CAPACITY: usize = 64;

/// Create a connected client/server pair with the default capacity
pub fn pair() -> (ClientEnd, ChannelSource, ChannelSink) {
    pair_with_capacity(DEFAULT_CAPACITY)
}

/// Create a connected client/server pair.
///
/// `capacity` bounds each direction; a full outbound channel makes
/// [`ChannelSink::send`] wait, which throttles the session like a slow socket.
pub fn pair_with_capacity(capacity: usize) -> (ClientEnd, ChannelSource, ChannelSink) {
    let (client_tx, server_rx) = mpsc::channel(capacity);
    let (server_tx, client_rx) = mpsc::channel(capacity);

    (
        ClientEnd { outbound: Some(client_tx), inbound: client_rx },
        ChannelSource { inbound: server_rx },
        ChannelSink { outbound: Some(server_tx) },
    )
}

/// Server-side inbound half
pub struct ChannelSource {
    inbound: mpsc::Receiver<String>,
}

#[async_trait::async_trait]
impl MessageSource for ChannelSource {
    async fn next_message(&mut self) -> Result<Option<String>> {
        Ok(self.inbound.recv().await)
    }
}

/// Server-side outbound half
pub struct ChannelSink {
    outbound: Option<mpsc::Sender<String>>,
}

#[async_trait::async_trait]
impl MessageSink for ChannelSink {
    async fn send(&mut self, message: &ServerMessage) -> Result<()> {
        let outbound =
            self.outbound.as_ref().ok_or_else(|| SessionError::transport("sink already closed"))?;
        let text = message.to_json()?;
        outbound.send(text).await.map_err(|_| SessionError::transport("client end dropped"))
    }

    async fn close(&mut self) -> Result<()> {
        self.outbound = None;
        Ok(())
    }
}

/// Client side of an in-memory connection
pub struct ClientEnd {
    outbound: Option<mpsc::Sender<String>>,
    inbound: mpsc::Receiver<String>,
}

impl ClientEnd {
    /// Send raw text. Returns `false` once disconnected or the server stopped reading.
    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        match &self.outbound {
            Some(outbound) => outbound.send(text.into()).await.is_ok(),
            None => false,
        }
    }

    /// Send an init request as JSON
    pub async fn send_init(&self, init: &InitRequest) -> bool {
        match serde_json::to_string(init) {
            Ok(text) => self.send_text(text).await,
            Err(_) => false,
        }
    }

    /// Close the client's write side. The server observes this as a peer disconnect.
    pub fn disconnect(&mut self) {
        self.outbound = None;
    }

    /// Next raw message, or `None` once the server closed and everything was read
    pub async fn recv_text(&mut self) -> Option<String> {
        self.inbound.recv().await
    }

    /// Next decoded message. Ends at the first message that does not decode.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        let text = self.recv_text().await?;
        serde_json::from_str(&text).ok()
    }

    /// Read until the server closes the connection
    pub async fn collect(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Some(message) = self.recv().await {
            messages.push(message);
        }
        messages
    }

    /// Consume the client, yielding raw server messages as a stream
    pub fn into_stream(self) -> impl Stream<Item = String> {
        ReceiverStream::new(self.inbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn messages_cross_as_json() {
        let (mut client, mut source, mut sink) = pair();

        assert!(client.send_init(&InitRequest::with_prompts(["a"])).await);
        let text = source.next_message().await.unwrap().unwrap();
        assert_eq!(text, r#"{"prompts":["a"]}"#);

        sink.send(&ServerMessage::done(3)).await.unwrap();
        assert_eq!(client.recv_text().await.unwrap(), r#"{"type":"done","total_frames":3}"#);
    }

    #[tokio::test]
    async fn close_ends_client_reads() {
        let (mut client, _source, mut sink) = pair();

        sink.send(&ServerMessage::error("bad init")).await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(client.collect().await, vec![ServerMessage::error("bad init")]);
        assert!(sink.send(&ServerMessage::done(0)).await.is_err());
    }

    #[tokio::test]
    async fn disconnect_is_seen_by_source() {
        let (mut client, mut source, _sink) = pair();
        client.disconnect();

        assert!(source.next_message().await.unwrap().is_none());
        assert!(!client.send_text("late").await);
    }

    #[tokio::test]
    async fn dropped_client_fails_sends() {
        let (client, _source, mut sink) = pair();
        drop(client);

        let err = sink.send(&ServerMessage::done(1)).await.unwrap_err();
        assert!(matches!(err, SessionError::Transport { .. }));
    }

    #[tokio::test]
    async fn client_stream_yields_raw_text() {
        let (client, _source, mut sink) = pair();
        sink.send(&ServerMessage::done(5)).await.unwrap();
        sink.close().await.unwrap();

        let texts: Vec<String> = client.into_stream().collect().await;
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("done"));
    }
}
