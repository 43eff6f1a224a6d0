/*
[INPUT]:  Stream configuration, subscription requests, token provider
[OUTPUT]: Routed real-time events and order command acknowledgements
[POS]:    WebSocket layer - streaming connection management and command socket
[UPDATE]: When adding new modules or changing the public streaming surface
*/

pub mod client;
pub mod command;
pub mod dispatcher;
pub mod message;
pub mod registry;
pub mod supervisor;
pub mod transport;

pub use client::AlorWebSocket;
pub use command::CommandClient;
pub use dispatcher::{BarBuffer, HandlerResult, LifecycleListener, Listener, Listeners};
pub use message::{LifecycleEvent, StreamEvent};
pub use registry::{Registry, Subscription, SubscriptionId};
pub use supervisor::{ConnectionState, StreamConfig};
pub use transport::WsTransport;
