/*
[INPUT]:  Subscription requests, listeners, and a token provider
[OUTPUT]: Subscription ids; events delivered to listeners until shutdown
[POS]:    WebSocket layer - public streaming facade over the supervisor task
[UPDATE]: When adding subscription helpers or changing readiness semantics
*/

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::TokenProvider;
use crate::http::{AlorError, Result};
use crate::types::{EventKind, Exchange, Format, SubscriptionRequest, Timeframe};

use super::dispatcher::{HandlerResult, Listeners};
use super::message::{LifecycleEvent, StreamEvent};
use super::registry::{Registry, Subscription, SubscriptionId};
use super::supervisor::{Command, ConnectionState, StreamConfig, Supervisor};

#[derive(Debug)]
enum Worker {
    Idle(Box<Supervisor>),
    Running(JoinHandle<()>),
    Finished,
}

/// Streaming client for the Alor data socket
///
/// Many subscriptions share one connection. The connection is opened lazily
/// on the first subscribe and re-established transparently, replaying every
/// registered subscription with its original id.
#[derive(Debug)]
pub struct AlorWebSocket {
    config: StreamConfig,
    registry: Arc<Registry>,
    listeners: Arc<Listeners>,
    state_rx: watch::Receiver<ConnectionState>,
    command_tx: mpsc::Sender<Command>,
    worker: Mutex<Worker>,
    cancel: CancellationToken,
}

impl AlorWebSocket {
    pub fn new(config: StreamConfig, token_provider: Arc<dyn TokenProvider>) -> Self {
        let registry = Arc::new(Registry::new());
        let listeners = Arc::new(Listeners::new());
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let cancel = CancellationToken::new();

        let supervisor = Supervisor::new(
            config.clone(),
            token_provider,
            registry.clone(),
            listeners.clone(),
            state_tx,
            command_rx,
            cancel.clone(),
        );

        Self {
            config,
            registry,
            listeners,
            state_rx,
            command_tx,
            worker: Mutex::new(Worker::Idle(Box::new(supervisor))),
            cancel,
        }
    }

    /// Register a listener for one event category
    pub fn add_listener<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&StreamEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.listeners.add(kind, Arc::new(listener));
    }

    /// Register a listener for connection lifecycle notifications
    pub fn add_lifecycle_listener<F>(&self, listener: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.listeners.add_lifecycle(Arc::new(listener));
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Snapshot of the registered subscriptions
    pub fn subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.registry.all()
    }

    /// Register a stream; the id is returned once the subscribe frame was sent
    pub async fn subscribe(&self, request: SubscriptionRequest) -> Result<SubscriptionId> {
        request.validate()?;
        self.start()?;
        self.wait_ready().await?;

        let id = SubscriptionId::new();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(Command::Subscribe {
            subscription: Subscription::new(id.clone(), request),
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| AlorError::Cancelled)??;
        Ok(id)
    }

    /// Stop a stream; fails with `NotFound` for an unknown id
    pub async fn unsubscribe(&self, id: &SubscriptionId) -> Result<()> {
        if !self.registry.contains(id) {
            return Err(AlorError::NotFound {
                guid: id.to_string(),
            });
        }
        self.wait_ready().await?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(Command::Unsubscribe {
            id: id.clone(),
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| AlorError::Cancelled)?
    }

    pub async fn subscribe_order_book(
        &self,
        exchange: Exchange,
        symbol: &str,
        depth: u32,
        format: Format,
    ) -> Result<SubscriptionId> {
        self.subscribe(SubscriptionRequest::order_book(exchange, symbol, depth, format))
            .await
    }

    /// Closed bars only; see [`EventKind::NewBar`]
    pub async fn subscribe_bars(
        &self,
        exchange: Exchange,
        symbol: &str,
        timeframe: Timeframe,
        from: i64,
        skip_history: bool,
        format: Format,
    ) -> Result<SubscriptionId> {
        self.subscribe(SubscriptionRequest::bars(
            exchange,
            symbol,
            timeframe,
            from,
            skip_history,
            format,
        ))
        .await
    }

    pub async fn subscribe_quotes(
        &self,
        exchange: Exchange,
        symbol: &str,
        format: Format,
    ) -> Result<SubscriptionId> {
        self.subscribe(SubscriptionRequest::quotes(exchange, symbol, format))
            .await
    }

    pub async fn subscribe_all_trades(
        &self,
        exchange: Exchange,
        symbol: &str,
        depth: u32,
        format: Format,
    ) -> Result<SubscriptionId> {
        self.subscribe(SubscriptionRequest::all_trades(exchange, symbol, depth, format))
            .await
    }

    pub async fn subscribe_positions(
        &self,
        exchange: Exchange,
        portfolio: &str,
        format: Format,
    ) -> Result<SubscriptionId> {
        self.subscribe(SubscriptionRequest::positions(exchange, portfolio, format))
            .await
    }

    pub async fn subscribe_summaries(
        &self,
        exchange: Exchange,
        portfolio: &str,
        format: Format,
    ) -> Result<SubscriptionId> {
        self.subscribe(SubscriptionRequest::summaries(exchange, portfolio, format))
            .await
    }

    pub async fn subscribe_risks(
        &self,
        exchange: Exchange,
        portfolio: &str,
        format: Format,
    ) -> Result<SubscriptionId> {
        self.subscribe(SubscriptionRequest::risks(exchange, portfolio, format))
            .await
    }

    pub async fn subscribe_spectra_risks(
        &self,
        exchange: Exchange,
        portfolio: &str,
        format: Format,
    ) -> Result<SubscriptionId> {
        self.subscribe(SubscriptionRequest::spectra_risks(exchange, portfolio, format))
            .await
    }

    pub async fn subscribe_trades(
        &self,
        exchange: Exchange,
        portfolio: &str,
        skip_history: bool,
        format: Format,
    ) -> Result<SubscriptionId> {
        self.subscribe(SubscriptionRequest::trades(
            exchange,
            portfolio,
            skip_history,
            format,
        ))
        .await
    }

    pub async fn subscribe_stop_orders(
        &self,
        exchange: Exchange,
        portfolio: &str,
        format: Format,
    ) -> Result<SubscriptionId> {
        self.subscribe(SubscriptionRequest::stop_orders(exchange, portfolio, format))
            .await
    }

    pub async fn subscribe_stop_orders_v2(
        &self,
        exchange: Exchange,
        portfolio: &str,
        format: Format,
    ) -> Result<SubscriptionId> {
        self.subscribe(SubscriptionRequest::stop_orders_v2(exchange, portfolio, format))
            .await
    }

    pub async fn subscribe_orders(
        &self,
        exchange: Exchange,
        portfolio: &str,
        skip_history: bool,
        format: Format,
    ) -> Result<SubscriptionId> {
        self.subscribe(SubscriptionRequest::orders(
            exchange,
            portfolio,
            skip_history,
            format,
        ))
        .await
    }

    pub async fn subscribe_instrument(
        &self,
        exchange: Exchange,
        symbol: &str,
        format: Format,
    ) -> Result<SubscriptionId> {
        self.subscribe(SubscriptionRequest::instrument_info(exchange, symbol, format))
            .await
    }

    /// Stop the supervisor; the client cannot be restarted
    pub fn shutdown(&self) {
        self.cancel.cancel();

        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        *worker = match std::mem::replace(&mut *worker, Worker::Finished) {
            Worker::Idle(supervisor) => {
                (*supervisor).abandon();
                Worker::Finished
            }
            other => other,
        };
    }

    /// Wait for the supervisor task to exit
    pub async fn join(&self) {
        let handle = {
            let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *worker, Worker::Finished) {
                Worker::Running(handle) => Some(handle),
                other => {
                    *worker = other;
                    None
                }
            }
        };

        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            warn!(error = %err, "ws supervisor task failed");
        }
    }

    /// Spawn the supervisor on first use
    fn start(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AlorError::Cancelled);
        }

        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        *worker = match std::mem::replace(&mut *worker, Worker::Finished) {
            Worker::Idle(supervisor) => {
                debug!(url = %self.config.url, "starting ws supervisor");
                Worker::Running(tokio::spawn((*supervisor).run()))
            }
            other => other,
        };
        Ok(())
    }

    async fn wait_ready(&self) -> Result<()> {
        let mut state_rx = self.state_rx.clone();
        let wait = async move {
            let state = *state_rx
                .wait_for(|state| {
                    matches!(state, ConnectionState::Ready | ConnectionState::Cancelled)
                })
                .await
                .map_err(|_| AlorError::Cancelled)?;
            match state {
                ConnectionState::Ready => Ok(()),
                _ => Err(AlorError::Cancelled),
            }
        };

        match self.config.ready_timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| AlorError::timeout(limit))?,
            None => wait.await,
        }
    }

    async fn send_command(&self, command: Command) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AlorError::Cancelled);
        }
        self.command_tx
            .send(command)
            .await
            .map_err(|_| AlorError::Cancelled)
    }
}

impl Drop for AlorWebSocket {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
