/*
[INPUT]:  Raw inbound frame text and supervisor transitions
[OUTPUT]: Parsed frames, data events and lifecycle notifications
[POS]:    WebSocket layer - message parsing and the events handed to listeners
[UPDATE]: When adding new notification kinds or changing frame format
*/

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::types::EventKind;

use super::registry::{Subscription, SubscriptionId};

/// Inbound frame envelope
///
/// Data frames carry `guid` and `data`; anything else is a service frame
/// (subscribe acknowledgement, error report).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InboundFrame {
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(rename = "httpCode", default)]
    pub http_code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

impl InboundFrame {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Split into `(guid, data)` when this is a data frame
    pub fn into_data(self) -> Option<(String, Value)> {
        match (self.guid, self.data) {
            (Some(guid), Some(data)) => Some((guid, data)),
            _ => None,
        }
    }
}

/// One data delivery to a listener
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub guid: SubscriptionId,
    pub kind: EventKind,
    pub subscription: Arc<Subscription>,
    pub data: Value,
}

/// Supervisor notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Supervisor task started
    Entering,
    /// A connection attempt begins
    Enter,
    Connect,
    /// Registered streams are being replayed on a new connection
    Resubscribe { count: usize },
    Ready,
    Disconnect,
    /// Socket failure or timeout; a reconnect follows
    Timeout { message: String },
    Error { message: String },
    Cancel,
    /// Supervisor task finished
    Exit,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Entering => f.write_str("entering"),
            LifecycleEvent::Enter => f.write_str("enter"),
            LifecycleEvent::Connect => f.write_str("connect"),
            LifecycleEvent::Resubscribe { count } => write!(f, "resubscribe ({count})"),
            LifecycleEvent::Ready => f.write_str("ready"),
            LifecycleEvent::Disconnect => f.write_str("disconnect"),
            LifecycleEvent::Timeout { message } => write!(f, "timeout: {message}"),
            LifecycleEvent::Error { message } => write!(f, "error: {message}"),
            LifecycleEvent::Cancel => f.write_str("cancel"),
            LifecycleEvent::Exit => f.write_str("exit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_frame() {
        let frame = InboundFrame::parse(r#"{"guid":"g1","data":{"time":1}}"#).unwrap();
        let (guid, data) = frame.into_data().unwrap();
        assert_eq!(guid, "g1");
        assert_eq!(data["time"], 1);
    }

    #[test]
    fn test_service_frame_has_no_data() {
        let frame = InboundFrame::parse(
            r#"{"requestGuid":"g1","httpCode":200,"message":"Handled successfully"}"#,
        )
        .unwrap();
        assert_eq!(frame.http_code, Some(200));
        assert!(frame.into_data().is_none());

        let null_data = InboundFrame::parse(r#"{"guid":"g1","data":null}"#).unwrap();
        assert!(null_data.into_data().is_none());
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(InboundFrame::parse("[1,2,3]").is_err());
        assert!(InboundFrame::parse("{not json").is_err());
    }
}
