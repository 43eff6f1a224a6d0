/*
[INPUT]:  Accepted subscribe / unsubscribe commands
[OUTPUT]: The set of streams that must be live on every connection
[POS]:    WebSocket layer - durable subscription state, replayed after reconnect
[UPDATE]: When subscription identity or descriptor fields change
*/

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use crate::http::{AlorError, Result};
use crate::types::{Opcode, SubscriptionRequest};

/// Opaque subscription id, sent as the frame `guid`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SubscriptionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A registered stream
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub request: SubscriptionRequest,
}

impl Subscription {
    pub fn new(id: SubscriptionId, request: SubscriptionRequest) -> Self {
        Self { id, request }
    }

    pub fn opcode(&self) -> Opcode {
        self.request.opcode()
    }

    /// Frame that (re-)establishes this stream
    pub fn subscribe_frame(&self, token: &str) -> String {
        self.request.to_frame(token, self.id.as_str()).to_string()
    }

    /// Frame that stops this stream
    pub fn unsubscribe_frame(&self, token: &str) -> String {
        serde_json::json!({
            "opcode": "unsubscribe",
            "token": token,
            "guid": self.id.as_str(),
        })
        .to_string()
    }
}

/// Subscriptions that should be live right now
///
/// Entries are shared, so lookups on the receive path never copy the request.
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<HashMap<SubscriptionId, Arc<Subscription>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, subscription: Subscription) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(subscription.id.clone(), Arc::new(subscription));
    }

    pub fn get(&self, id: &SubscriptionId) -> Option<Arc<Subscription>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(id).cloned()
    }

    /// Remove a subscription; fails when it is not registered
    pub fn remove(&self, id: &SubscriptionId) -> Result<Arc<Subscription>> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(id).ok_or_else(|| AlorError::NotFound {
            guid: id.to_string(),
        })
    }

    /// Snapshot of every registered subscription
    pub fn all(&self) -> Vec<Arc<Subscription>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.values().cloned().collect()
    }

    pub fn contains(&self, id: &SubscriptionId) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
