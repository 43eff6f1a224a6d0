/*
[INPUT]:  Stream URL and outbound text frames
[OUTPUT]: Inbound text frames from one physical WebSocket connection
[POS]:    WebSocket layer - raw socket ownership, no retry logic
[UPDATE]: When changing socket setup or control frame handling
*/

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::http::{AlorError, Result};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One open streaming connection
///
/// Consumed by [`WsTransport::close`], so a closed transport cannot be used.
#[derive(Debug)]
pub struct WsTransport {
    socket: Socket,
    url: String,
}

impl WsTransport {
    /// Open a socket to `url`, giving up after `timeout`
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let (socket, response) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| AlorError::timeout(timeout))??;
        debug!(url, status = %response.status(), "ws socket opened");

        Ok(Self {
            socket,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one text frame
    pub async fn send(&mut self, frame: String) -> Result<()> {
        self.socket.send(WsMessage::Text(frame.into())).await?;
        Ok(())
    }

    /// Wait for the next text frame
    ///
    /// Returns `Ok(None)` once the server closes the connection.
    pub async fn receive(&mut self) -> Result<Option<String>> {
        loop {
            let Some(message) = self.socket.next().await else {
                return Ok(None);
            };

            match message? {
                WsMessage::Text(text) => return Ok(Some(text.to_string())),
                WsMessage::Binary(bytes) => {
                    let text = String::from_utf8(bytes.to_vec())
                        .map_err(|err| AlorError::Protocol(format!("binary frame is not UTF-8: {err}")))?;
                    return Ok(Some(text));
                }
                WsMessage::Ping(payload) => {
                    trace!(bytes = payload.len(), "ws ping");
                    // tungstenite queues the pong reply; push it out now
                    self.socket.flush().await?;
                }
                WsMessage::Pong(_) | WsMessage::Frame(_) => {}
                WsMessage::Close(frame) => {
                    debug!(url = %self.url, ?frame, "ws close frame received");
                    return Ok(None);
                }
            }
        }
    }

    /// Close the connection
    pub async fn close(mut self) {
        if let Err(err) = self.socket.close(None).await {
            debug!(url = %self.url, error = %err, "ws close failed");
        }
    }
}
