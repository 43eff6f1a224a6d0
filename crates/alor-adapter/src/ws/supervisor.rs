/*
[INPUT]:  Stream config, token provider, subscribe/unsubscribe commands, cancellation
[OUTPUT]: A continuously re-established connection with every registered stream live
[POS]:    WebSocket layer - connection lifecycle (connect, replay, receive, reconnect)
[UPDATE]: When changing reconnection backoff, replay, or shutdown semantics
*/

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::TokenProvider;
use crate::http::{AlorError, ErrorKind, Result};
use crate::types::Environment;

use super::dispatcher::{Dispatcher, Listeners};
use super::message::LifecycleEvent;
use super::registry::{Registry, Subscription, SubscriptionId};
use super::transport::WsTransport;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RECONNECT_DELAY_INITIAL: Duration = Duration::from_secs(1);
const DEFAULT_RECONNECT_DELAY_MAX: Duration = Duration::from_secs(30);
const DEFAULT_COMMAND_BUFFER: usize = 64;

/// Streaming connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub url: String,
    pub connect_timeout: Duration,
    /// How long subscribe/unsubscribe wait for the connection; `None` waits forever
    pub ready_timeout: Option<Duration>,
    pub reconnect_delay_initial: Duration,
    pub reconnect_delay_max: Duration,
    pub command_buffer: usize,
}

impl StreamConfig {
    pub fn new(environment: Environment) -> Self {
        Self::with_url(environment.stream_url())
    }

    pub fn with_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            ready_timeout: Some(DEFAULT_READY_TIMEOUT),
            reconnect_delay_initial: DEFAULT_RECONNECT_DELAY_INITIAL,
            reconnect_delay_max: DEFAULT_RECONNECT_DELAY_MAX,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.reconnect_delay_initial
            .saturating_mul(1u32 << exp)
            .min(self.reconnect_delay_max)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new(Environment::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Replaying,
    Ready,
    Disconnected,
    Errored,
    Cancelled,
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }
}

#[derive(Debug)]
pub(crate) enum Command {
    Subscribe {
        subscription: Subscription,
        reply: oneshot::Sender<Result<()>>,
    },
    Unsubscribe {
        id: SubscriptionId,
        reply: oneshot::Sender<Result<()>>,
    },
}

#[derive(Debug)]
enum StreamExit {
    Disconnected,
    Failed(AlorError),
    Shutdown,
}

/// Sole owner of the streaming socket
pub(crate) struct Supervisor {
    config: StreamConfig,
    token_provider: Arc<dyn TokenProvider>,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    state_tx: watch::Sender<ConnectionState>,
    commands: mpsc::Receiver<Command>,
    /// Subscribers whose frame was lost with the socket; answered after replay
    pending: Vec<(SubscriptionId, oneshot::Sender<Result<()>>)>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("url", &self.config.url)
            .field("state", &*self.state_tx.borrow())
            .field("subscriptions", &self.registry.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Supervisor {
    pub(crate) fn new(
        config: StreamConfig,
        token_provider: Arc<dyn TokenProvider>,
        registry: Arc<Registry>,
        listeners: Arc<Listeners>,
        state_tx: watch::Sender<ConnectionState>,
        commands: mpsc::Receiver<Command>,
        cancel: CancellationToken,
    ) -> Self {
        let dispatcher = Dispatcher::new(registry.clone(), listeners);
        Self {
            config,
            token_provider,
            registry,
            dispatcher,
            state_tx,
            commands,
            pending: Vec::new(),
            cancel,
        }
    }

    /// Publish `Cancelled` for a supervisor that never ran
    pub(crate) fn abandon(self) {
        self.state_tx.send_replace(ConnectionState::Cancelled);
    }

    pub(crate) async fn run(mut self) {
        self.dispatcher.notify(&LifecycleEvent::Entering);
        let mut attempt: u32 = 0;

        let open = 'run: loop {
            if self.cancel.is_cancelled() {
                break 'run None;
            }

            self.set_state(ConnectionState::Connecting);
            self.dispatcher.notify(&LifecycleEvent::Enter);

            let cancel = self.cancel.clone();
            let session = tokio::select! {
                _ = cancel.cancelled() => break 'run None,
                session = self.open_session() => session,
            };

            match session {
                Ok(mut transport) => {
                    attempt = 0;
                    let exit = match self.resolve_pending(&mut transport).await {
                        Ok(()) => self.stream_loop(&mut transport).await,
                        Err(err) => StreamExit::Failed(err),
                    };
                    match exit {
                        StreamExit::Shutdown => break 'run Some(transport),
                        StreamExit::Disconnected => {
                            info!(url = %self.config.url, "ws disconnected by server");
                            self.set_state(ConnectionState::Disconnected);
                            self.dispatcher.notify(&LifecycleEvent::Disconnect);
                        }
                        StreamExit::Failed(err) => self.report_failure(&err),
                    }
                }
                Err(err) => self.report_failure(&err),
            }

            attempt = attempt.saturating_add(1);
            let backoff = self.config.backoff(attempt);
            debug!(attempt, ?backoff, "ws reconnecting after backoff");
            tokio::select! {
                _ = self.cancel.cancelled() => break 'run None,
                _ = tokio::time::sleep(backoff) => {}
            }
        };

        self.dispatcher.notify(&LifecycleEvent::Cancel);
        if let Some(transport) = open {
            transport.close().await;
        }
        info!(url = %self.config.url, "ws supervisor stopped");
        self.dispatcher.notify(&LifecycleEvent::Exit);
        self.set_state(ConnectionState::Cancelled);
    }

    /// Connect and replay the registry; the returned transport is ready
    async fn open_session(&self) -> Result<WsTransport> {
        let mut transport =
            WsTransport::connect(&self.config.url, self.config.connect_timeout).await?;
        info!(url = %self.config.url, "ws connected");
        self.set_state(ConnectionState::Replaying);
        self.dispatcher.notify(&LifecycleEvent::Connect);

        let subscriptions = self.registry.all();
        if !subscriptions.is_empty() {
            self.dispatcher.notify(&LifecycleEvent::Resubscribe {
                count: subscriptions.len(),
            });
            let token = self.token_provider.token().await?;
            for subscription in &subscriptions {
                transport.send(subscription.subscribe_frame(&token)).await?;
                debug!(guid = %subscription.id, opcode = %subscription.opcode(), "ws stream replayed");
            }
        }

        self.set_state(ConnectionState::Ready);
        info!(subscriptions = subscriptions.len(), "ws ready");
        self.dispatcher.notify(&LifecycleEvent::Ready);
        Ok(transport)
    }

    async fn stream_loop(&mut self, transport: &mut WsTransport) -> StreamExit {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return StreamExit::Shutdown,
                frame = transport.receive() => match frame {
                    Ok(Some(text)) => self.dispatcher.handle_frame(&text),
                    Ok(None) => return StreamExit::Disconnected,
                    Err(err) if err.kind() == ErrorKind::Protocol => {
                        debug!(error = %err, "ws frame dropped");
                    }
                    Err(err) => return StreamExit::Failed(err),
                },
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Err(err) = self.handle_command(transport, command).await {
                            return StreamExit::Failed(err);
                        }
                    }
                    None => return StreamExit::Shutdown,
                },
            }
        }
    }

    /// Answer subscribers whose stream went out with the replay
    ///
    /// A subscriber that gave up meanwhile never learns the id, so its
    /// stream is stopped instead of kept.
    async fn resolve_pending(&mut self, transport: &mut WsTransport) -> Result<()> {
        let registry = self.registry.clone();
        let orphans: Vec<_> = std::mem::take(&mut self.pending)
            .into_iter()
            .filter_map(|(id, reply)| match reply.send(Ok(())) {
                Ok(()) => None,
                Err(_) => registry.get(&id),
            })
            .collect();
        if orphans.is_empty() {
            return Ok(());
        }

        for subscription in &orphans {
            self.rollback(&subscription.id);
        }
        let token = self.token_provider.token().await?;
        for subscription in &orphans {
            transport.send(subscription.unsubscribe_frame(&token)).await?;
            debug!(guid = %subscription.id, "ws abandoned stream unsubscribed");
        }
        Ok(())
    }

    /// Apply one command; an `Err` means the connection must be re-established
    async fn handle_command(&mut self, transport: &mut WsTransport, command: Command) -> Result<()> {
        match command {
            Command::Subscribe {
                subscription,
                reply,
            } => {
                if reply.is_closed() {
                    debug!(guid = %subscription.id, "ws subscribe abandoned before sending");
                    return Ok(());
                }

                let token = match self.token_provider.token().await {
                    Ok(token) => token,
                    Err(err) => {
                        let _ = reply.send(Err(err));
                        return Ok(());
                    }
                };

                let id = subscription.id.clone();
                let frame = subscription.subscribe_frame(&token);
                self.registry.put(subscription);

                if let Err(err) = transport.send(frame).await {
                    // Registered; the replay on the next connection sends it
                    self.pending.push((id, reply));
                    return Err(err);
                }

                if reply.send(Ok(())).is_err() {
                    let Ok(orphan) = self.registry.remove(&id) else {
                        return Ok(());
                    };
                    self.dispatcher.forget(&id);
                    debug!(guid = %id, "ws subscribe abandoned after sending");
                    return transport.send(orphan.unsubscribe_frame(&token)).await;
                }

                debug!(guid = %id, "ws stream subscribed");
                Ok(())
            }
            Command::Unsubscribe { id, reply } => {
                let Some(subscription) = self.registry.get(&id) else {
                    let _ = reply.send(Err(AlorError::NotFound {
                        guid: id.to_string(),
                    }));
                    return Ok(());
                };

                // Removed even if the frame cannot be sent; never replayed again
                self.rollback(&id);

                let token = match self.token_provider.token().await {
                    Ok(token) => token,
                    Err(err) => {
                        // The server only forgets the stream with the connection
                        warn!(guid = %id, error = %err, "ws unsubscribe frame not sent");
                        let message = format!("unsubscribe {id}: {err}");
                        let _ = reply.send(Err(err));
                        return Err(AlorError::Authentication { message });
                    }
                };

                let sent = transport.send(subscription.unsubscribe_frame(&token)).await;
                let _ = reply.send(Ok(()));

                match sent {
                    Ok(()) => {
                        debug!(guid = %id, "ws stream unsubscribed");
                        Ok(())
                    }
                    Err(err) => {
                        warn!(guid = %id, error = %err, "ws unsubscribe frame not sent");
                        Err(err)
                    }
                }
            }
        }
    }

    fn rollback(&mut self, id: &SubscriptionId) {
        let _ = self.registry.remove(id);
        self.dispatcher.forget(id);
    }

    fn report_failure(&self, err: &AlorError) {
        self.set_state(ConnectionState::Errored);
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Connection | ErrorKind::Timeout => {
                warn!(url = %self.config.url, error = %message, "ws connection lost");
                self.dispatcher.notify(&LifecycleEvent::Timeout { message });
            }
            _ => {
                warn!(url = %self.config.url, error = %message, "ws session failed");
                self.dispatcher.notify(&LifecycleEvent::Error { message });
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}
