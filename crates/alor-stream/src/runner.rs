/*
[INPUT]:  Streaming client and configured subscription requests
[OUTPUT]: Logged stream events; bounded graceful shutdown
[POS]:    Runner layer - owns the subscriptions opened from configuration
[UPDATE]: When changing startup subscription or shutdown behavior
*/

use std::collections::HashSet;
use std::time::Duration;

use alor_adapter::{
    AlorWebSocket, EventKind, LifecycleEvent, StreamEvent, SubscriptionId, SubscriptionRequest,
};
use anyhow::{Context, Result, anyhow};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens configured streams on one client and tears them down on shutdown
#[derive(Debug)]
pub struct StreamManager {
    ws: AlorWebSocket,
    active: Vec<SubscriptionId>,
    logged_kinds: HashSet<EventKind>,
    shutdown: CancellationToken,
}

impl StreamManager {
    pub fn new(ws: AlorWebSocket) -> Self {
        ws.add_lifecycle_listener(log_lifecycle);
        Self {
            ws,
            active: Vec::new(),
            logged_kinds: HashSet::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn client(&self) -> &AlorWebSocket {
        &self.ws
    }

    /// Ids of the streams opened so far, in subscribe order
    pub fn active(&self) -> &[SubscriptionId] {
        &self.active
    }

    /// Subscribe every request in order, logging the events each produces
    pub async fn start(&mut self, requests: Vec<SubscriptionRequest>) -> Result<()> {
        for request in requests {
            let kind = request.opcode().event_kind();
            if self.logged_kinds.insert(kind) {
                self.ws.add_listener(kind, log_event);
            }

            let opcode = request.opcode();
            let id = self
                .ws
                .subscribe(request)
                .await
                .with_context(|| format!("subscribe {opcode:?}"))?;
            info!(guid = %id, opcode = ?opcode, "stream opened");
            self.active.push(id);
        }
        Ok(())
    }

    /// Unsubscribe everything, stop the client and wait for it to exit
    ///
    /// Bounded by a 30s deadline; unsubscribe failures are logged, not fatal.
    pub async fn shutdown_and_wait(&mut self) -> Result<()> {
        self.shutdown.cancel();

        let active = std::mem::take(&mut self.active);
        let ws = &self.ws;
        let unsubscribe_all = async {
            for id in &active {
                if let Err(err) = ws.unsubscribe(id).await {
                    warn!(guid = %id, error = %err, "unsubscribe failed");
                }
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, unsubscribe_all)
            .await
            .is_err()
        {
            warn!("unsubscribe pass timed out");
        }

        self.ws.shutdown();
        tokio::time::timeout(SHUTDOWN_TIMEOUT, self.ws.join())
            .await
            .map_err(|_| anyhow!("shutdown timed out after {SHUTDOWN_TIMEOUT:?}"))?;
        info!("stream client stopped");
        Ok(())
    }
}

fn log_event(event: &StreamEvent) -> alor_adapter::HandlerResult {
    info!(guid = %event.guid, kind = ?event.kind, data = %event.data, "stream event");
    Ok(())
}

fn log_lifecycle(event: &LifecycleEvent) {
    match event {
        LifecycleEvent::Timeout { .. } | LifecycleEvent::Error { .. } => {
            warn!(event = %event, "connection")
        }
        _ => info!(event = %event, "connection"),
    }
}
