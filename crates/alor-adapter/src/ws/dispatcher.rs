/*
[INPUT]:  Inbound frame text, the subscription registry, registered listeners
[OUTPUT]: StreamEvent / LifecycleEvent callbacks in receive order
[POS]:    WebSocket layer - routes frames to listeners, holds per-stream bar state
[UPDATE]: When adding event categories or changing bar close detection
*/

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::http::BoxError;
use crate::http::client::truncate_for_log;
use crate::types::EventKind;

use super::message::{InboundFrame, LifecycleEvent, StreamEvent};
use super::registry::{Registry, SubscriptionId};

const RAW_LOG_MAX_BYTES: usize = 512;

/// Listener outcome; an `Err` is reported as a lifecycle error
pub type HandlerResult = std::result::Result<(), BoxError>;

pub type Listener = Arc<dyn Fn(&StreamEvent) -> HandlerResult + Send + Sync>;
pub type LifecycleListener = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Callbacks per event category plus lifecycle observers
#[derive(Default)]
pub struct Listeners {
    data: RwLock<HashMap<EventKind, Vec<Listener>>>,
    lifecycle: RwLock<Vec<LifecycleListener>>,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        let lifecycle = self.lifecycle.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Listeners")
            .field("kinds", &data.keys().collect::<Vec<_>>())
            .field("lifecycle", &lifecycle.len())
            .finish()
    }
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kind: EventKind, listener: Listener) {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.entry(kind).or_default().push(listener);
    }

    pub fn add_lifecycle(&self, listener: LifecycleListener) {
        let mut lifecycle = self.lifecycle.write().unwrap_or_else(PoisonError::into_inner);
        lifecycle.push(listener);
    }

    /// Deliver a lifecycle notification to every observer
    pub fn notify(&self, event: &LifecycleEvent) {
        debug!(event = %event, "ws lifecycle");
        // Listeners may register more listeners; call them without the lock
        let listeners = {
            let lifecycle = self.lifecycle.read().unwrap_or_else(PoisonError::into_inner);
            lifecycle.clone()
        };
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(event = %event, "lifecycle listener panicked");
            }
        }
    }

    /// Deliver a data event, in registration order
    pub fn emit(&self, event: &StreamEvent) {
        let listeners = {
            let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
            data.get(&event.kind).cloned().unwrap_or_default()
        };
        if listeners.is_empty() {
            trace!(kind = ?event.kind, guid = %event.guid, "no listener for event");
            return;
        }

        for listener in listeners {
            let failure = match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            warn!(kind = ?event.kind, guid = %event.guid, error = %failure, "listener failed");
            self.notify(&LifecycleEvent::Error {
                message: format!("{:?} listener failed: {failure}", event.kind),
            });
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic".to_string()
    }
}

/// Last unfinished bar of one bar stream
///
/// The server repeats the current bar while it is open; a bar is final
/// once a bar with a later `time` arrives.
#[derive(Debug, Default)]
pub struct BarBuffer {
    pending: Option<(i64, Value)>,
}

impl BarBuffer {
    /// Feed a bar; returns the bar that just closed, if any
    pub fn push(&mut self, time: i64, bar: Value) -> Option<Value> {
        match self.pending.as_ref().map(|(pending_time, _)| *pending_time) {
            // History replayed after a reconnect
            Some(pending_time) if time < pending_time => None,
            Some(pending_time) if time > pending_time => self
                .pending
                .replace((time, bar))
                .map(|(_, closed)| closed),
            _ => {
                self.pending = Some((time, bar));
                None
            }
        }
    }
}

/// Routes inbound frames to listeners
///
/// Owned by the supervisor task; frames are handled one at a time.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    listeners: Arc<Listeners>,
    bars: HashMap<SubscriptionId, BarBuffer>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, listeners: Arc<Listeners>) -> Self {
        Self {
            registry,
            listeners,
            bars: HashMap::new(),
        }
    }

    /// Drop transform state of an unsubscribed stream
    pub fn forget(&mut self, id: &SubscriptionId) {
        self.bars.remove(id);
    }

    pub fn notify(&self, event: &LifecycleEvent) {
        self.listeners.notify(event);
    }

    /// Handle one inbound frame
    pub fn handle_frame(&mut self, text: &str) {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(
                    error = %err,
                    bytes = text.len(),
                    message = %truncate_for_log(text, RAW_LOG_MAX_BYTES),
                    "ws frame parse failed"
                );
                return;
            }
        };

        if let Some(code) = frame.http_code.filter(|code| *code != 200) {
            warn!(
                code,
                message = frame.message.as_deref().unwrap_or_default(),
                "ws request rejected"
            );
        }

        let Some((guid, data)) = frame.into_data() else {
            trace!(message = %truncate_for_log(text, RAW_LOG_MAX_BYTES), "ws service frame");
            return;
        };

        let guid = SubscriptionId::from(guid);
        let Some(subscription) = self.registry.get(&guid) else {
            debug!(%guid, "ws frame for unknown subscription dropped");
            return;
        };

        let data = if subscription.opcode().is_bars() {
            let Some(time) = bar_time(&data) else {
                warn!(%guid, "bar frame without numeric time dropped");
                return;
            };
            match self.bars.entry(guid.clone()).or_default().push(time, data) {
                Some(closed) => closed,
                None => return,
            }
        } else {
            data
        };

        let event = StreamEvent {
            guid,
            kind: subscription.opcode().event_kind(),
            subscription,
            data,
        };
        self.listeners.emit(&event);
    }
}

fn bar_time(data: &Value) -> Option<i64> {
    let time = data.get("time")?;
    time.as_i64().or_else(|| time.as_f64().map(|value| value as i64))
}
