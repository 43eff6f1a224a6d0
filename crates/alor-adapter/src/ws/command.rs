/*
[INPUT]:  Order requests and a token provider
[OUTPUT]: Command acknowledgements (order numbers) from the command socket
[POS]:    WebSocket layer - order placement over the authorized command socket
[UPDATE]: When adding command opcodes or changing the authorize handshake
*/

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::TokenProvider;
use crate::http::{AlorError, Result};
use crate::types::{CommandResponse, Environment, Exchange, LimitOrderRequest, MarketOrderRequest};

use super::transport::WsTransport;

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Order commands over the command socket
///
/// The socket is opened and authorized on the first command. A command that
/// fails on the socket drops the connection; the next command reconnects.
pub struct CommandClient {
    url: String,
    token_provider: Arc<dyn TokenProvider>,
    timeout: Duration,
    socket: Mutex<Option<WsTransport>>,
}

impl std::fmt::Debug for CommandClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandClient")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CommandClient {
    pub fn new(environment: Environment, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self::with_url(environment.command_url(), token_provider)
    }

    pub fn with_url(url: &str, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            url: url.to_string(),
            token_provider,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            socket: Mutex::new(None),
        }
    }

    /// Bound on connecting and on waiting for each acknowledgement
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn create_market_order(&self, order: &MarketOrderRequest) -> Result<CommandResponse> {
        self.execute("create:market", order_body(order)?).await
    }

    pub async fn create_limit_order(&self, order: &LimitOrderRequest) -> Result<CommandResponse> {
        self.execute("create:limit", order_body(order)?).await
    }

    pub async fn delete_order(
        &self,
        portfolio: &str,
        exchange: Exchange,
        order_id: &str,
    ) -> Result<CommandResponse> {
        let mut body = Map::new();
        body.insert("orderId".to_string(), Value::from(order_id));
        body.insert("exchange".to_string(), Value::from(exchange.as_str()));
        body.insert("user".to_string(), serde_json::json!({ "portfolio": portfolio }));
        self.execute("delete:limit", body).await
    }

    /// Close the socket; the next command reconnects
    pub async fn close(&self) {
        if let Some(transport) = self.socket.lock().await.take() {
            transport.close().await;
        }
    }

    async fn execute(&self, opcode: &str, body: Map<String, Value>) -> Result<CommandResponse> {
        let mut socket = self.socket.lock().await;
        if socket.is_none() {
            *socket = Some(self.open().await?);
        }
        let Some(transport) = socket.as_mut() else {
            return Err(AlorError::Connection("command socket unavailable".to_string()));
        };

        let guid = Uuid::new_v4().to_string();
        let mut frame = body;
        frame.insert("opcode".to_string(), Value::from(opcode));
        frame.insert("guid".to_string(), Value::from(guid.as_str()));

        let outcome = self
            .round_trip(transport, Value::Object(frame).to_string(), &guid)
            .await;
        let ack = match outcome {
            Ok(ack) => ack,
            Err(err) => {
                warn!(opcode, error = %err, "command socket dropped");
                *socket = None;
                return Err(err);
            }
        };

        if !ack.is_success() {
            return Err(AlorError::Api {
                code: ack.http_code,
                message: ack.message.unwrap_or_default(),
            });
        }
        debug!(opcode, guid = %guid, order_number = ?ack.order_number, "command acknowledged");
        Ok(ack)
    }

    async fn open(&self) -> Result<WsTransport> {
        let mut transport = WsTransport::connect(&self.url, self.timeout).await?;
        let token = self.token_provider.token().await?;
        let guid = Uuid::new_v4().to_string();
        let frame = serde_json::json!({
            "opcode": "authorize",
            "token": token,
            "guid": guid,
        });

        let ack = self
            .round_trip(&mut transport, frame.to_string(), &guid)
            .await?;
        if !ack.is_success() {
            transport.close().await;
            return Err(AlorError::Authentication {
                message: format!(
                    "command socket authorize rejected (code {}): {}",
                    ack.http_code,
                    ack.message.unwrap_or_default()
                ),
            });
        }

        info!(url = %self.url, "command socket authorized");
        Ok(transport)
    }

    /// Send a frame and wait for the acknowledgement carrying `guid`
    async fn round_trip(
        &self,
        transport: &mut WsTransport,
        frame: String,
        guid: &str,
    ) -> Result<CommandResponse> {
        transport.send(frame).await?;

        let wait = async {
            loop {
                let Some(text) = transport.receive().await? else {
                    return Err(AlorError::Connection(
                        "command socket closed by server".to_string(),
                    ));
                };
                match serde_json::from_str::<CommandResponse>(&text) {
                    Ok(ack) if ack.request_guid == guid => return Ok(ack),
                    Ok(ack) => debug!(guid = %ack.request_guid, "ack for another command skipped"),
                    Err(err) => debug!(error = %err, "command socket frame skipped"),
                }
            }
        };

        tokio::time::timeout(self.timeout, wait)
            .await
            .map_err(|_| AlorError::timeout(self.timeout))?
    }
}

fn order_body<T: serde::Serialize>(order: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(order)? {
        Value::Object(mut body) => {
            // The order kind travels in the opcode
            body.remove("type");
            Ok(body)
        }
        other => Err(AlorError::InvalidRequest(format!(
            "order must serialize to an object, got {other}"
        ))),
    }
}
