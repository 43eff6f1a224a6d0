/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for alor-adapter tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alor_adapter::{AlorClient, AlorError, ClientConfig, Result, StreamConfig, TokenProvider};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use wiremock::MockServer;

pub const WAIT: Duration = Duration::from_secs(5);

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// REST client pointed at the mock server for both API and OAuth
pub fn client_for(server: &MockServer) -> AlorClient {
    AlorClient::with_config_and_base_urls(ClientConfig::default(), &server.uri(), &server.uri())
        .expect("client init")
}

/// Unsigned JWT with the given `exp`
pub fn make_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "exp": exp }).to_string());
    format!("{header}.{payload}.signature")
}

/// Hands out `token-1`, `token-2`, ... so replays can be told apart
#[derive(Debug, Default)]
pub struct CountingTokenProvider {
    issued: AtomicUsize,
}

#[async_trait]
impl TokenProvider for CountingTokenProvider {
    async fn token(&self) -> Result<String> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("token-{n}"))
    }
}

/// Like [`CountingTokenProvider`], but refuses the listed calls (1-based)
#[derive(Debug, Default)]
pub struct FlakyTokenProvider {
    issued: AtomicUsize,
    failing: Vec<usize>,
}

impl FlakyTokenProvider {
    pub fn failing_on(calls: &[usize]) -> Self {
        Self {
            issued: AtomicUsize::new(0),
            failing: calls.to_vec(),
        }
    }
}

#[async_trait]
impl TokenProvider for FlakyTokenProvider {
    async fn token(&self) -> Result<String> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.contains(&n) {
            return Err(AlorError::Authentication {
                message: format!("refresh refused on call {n}"),
            });
        }
        Ok(format!("token-{n}"))
    }
}

/// Stream config with fast reconnects, pointed at `url`
pub fn fast_stream_config(url: &str) -> StreamConfig {
    let mut config = StreamConfig::with_url(url);
    config.connect_timeout = Duration::from_secs(2);
    config.ready_timeout = Some(WAIT);
    config.reconnect_delay_initial = Duration::from_millis(20);
    config.reconnect_delay_max = Duration::from_millis(100);
    config
}

enum ServerAction {
    Send(String),
    Close,
}

/// Inbound frame seen by the mock stream server
#[derive(Debug, Clone)]
pub struct SeenFrame {
    /// 1-based connection number
    pub connection: usize,
    pub frame: Value,
}

/// Local WebSocket server standing in for the data stream
///
/// Records every inbound frame, lets a test push frames to the current
/// connection, and can drop that connection to force a reconnect.
pub struct MockStreamServer {
    url: String,
    seen: mpsc::UnboundedReceiver<SeenFrame>,
    current: Arc<Mutex<Option<mpsc::UnboundedSender<ServerAction>>>>,
    connections: Arc<AtomicUsize>,
}

impl MockStreamServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (seen_tx, seen) = mpsc::unbounded_channel();
        let current = Arc::new(Mutex::new(None));
        let connections = Arc::new(AtomicUsize::new(0));

        let current_for_accept = current.clone();
        let connections_for_accept = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(mut ws) = accept_async(stream).await else {
                    continue;
                };
                let connection = connections_for_accept.fetch_add(1, Ordering::SeqCst) + 1;
                let (action_tx, mut action_rx) = mpsc::unbounded_channel();
                *current_for_accept.lock().unwrap() = Some(action_tx);

                let seen_tx = seen_tx.clone();
                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            incoming = ws.next() => match incoming {
                                Some(Ok(Message::Text(text))) => {
                                    if let Ok(frame) = serde_json::from_str(text.as_str()) {
                                        let _ = seen_tx.send(SeenFrame { connection, frame });
                                    }
                                }
                                Some(Ok(_)) => {}
                                Some(Err(_)) | None => break,
                            },
                            action = action_rx.recv() => match action {
                                Some(ServerAction::Send(text)) => {
                                    if ws.send(Message::Text(text.into())).await.is_err() {
                                        break;
                                    }
                                }
                                Some(ServerAction::Close) | None => {
                                    let _ = ws.close(None).await;
                                    break;
                                }
                            },
                        }
                    }
                });
            }
        });

        Self {
            url: format!("ws://{addr}"),
            seen,
            current,
            connections,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Next frame the client sent
    pub async fn next_frame(&mut self) -> SeenFrame {
        tokio::time::timeout(WAIT, self.seen.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("server stopped")
    }

    /// Assert the client sends nothing for `quiet`
    pub async fn expect_silence(&mut self, quiet: Duration) {
        if let Ok(Some(seen)) = tokio::time::timeout(quiet, self.seen.recv()).await {
            panic!("unexpected client frame: {:?}", seen.frame);
        }
    }

    /// Push a frame to the current connection
    pub fn send(&self, frame: Value) {
        self.send_raw(frame.to_string());
    }

    pub fn send_raw(&self, text: impl Into<String>) {
        let current = self.current.lock().unwrap();
        let sender = current.as_ref().expect("no client connected");
        sender.send(ServerAction::Send(text.into())).expect("connection gone");
    }

    /// Close the current connection from the server side
    pub fn drop_connection(&self) {
        if let Some(sender) = self.current.lock().unwrap().take() {
            let _ = sender.send(ServerAction::Close);
        }
    }
}
