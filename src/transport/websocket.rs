//! WebSocket transport over axum's upgraded socket

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tracing::trace;

use super::{MessageSink, MessageSource};
use crate::types::ServerMessage;
use crate::{Result, SessionError};

/// Split an upgraded socket into session halves.
///
/// Every write on the sink is bounded by `write_timeout` so a stalled client
/// eventually tears the session down.
pub fn split(socket: WebSocket, write_timeout: Duration) -> (WsSource, WsSink) {
    let (sink, stream) = socket.split();
    (WsSource { stream }, WsSink { sink, write_timeout })
}

/// Inbound half of a WebSocket
pub struct WsSource {
    stream: SplitStream<WebSocket>,
}

#[async_trait::async_trait]
impl MessageSource for WsSource {
    async fn next_message(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(bytes))) => {
                    return String::from_utf8(bytes)
                        .map(Some)
                        .map_err(|_| SessionError::protocol("binary message is not UTF-8 JSON"));
                }
                Some(Ok(Message::Close(frame))) => {
                    trace!("Close frame received: {:?}", frame);
                    return Ok(None);
                }
                // Ping/Pong handled by axum
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(SessionError::transport_with_source(
                        "websocket read failed",
                        Box::new(e),
                    ));
                }
                None => return Ok(None),
            }
        }
    }
}

/// Outbound half of a WebSocket
pub struct WsSink {
    sink: SplitSink<WebSocket, Message>,
    write_timeout: Duration,
}

impl WsSink {
    async fn write(&mut self, message: Message, operation: &str) -> Result<()> {
        match tokio::time::timeout(self.write_timeout, self.sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SessionError::transport_with_source(
                format!("{operation} failed"),
                Box::new(e),
            )),
            Err(_) => Err(SessionError::timeout(operation, self.write_timeout)),
        }
    }
}

#[async_trait::async_trait]
impl MessageSink for WsSink {
    async fn send(&mut self, message: &ServerMessage) -> Result<()> {
        let text = message.to_json()?;
        self.write(Message::Text(text), "websocket write").await
    }

    async fn close(&mut self) -> Result<()> {
        self.write(Message::Close(None), "websocket close").await
    }
}
