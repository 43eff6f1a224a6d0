/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Alor adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod types;
pub mod ws;

// Re-export commonly used types from auth
pub use auth::{AuthManager, JwtManager, StaticTokenProvider, TokenData, TokenProvider};

// Re-export commonly used types from http
pub use http::{AlorClient, AlorError, BoxError, ClientConfig, ErrorKind, Result};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    AlorWebSocket,
    CommandClient,
    ConnectionState,
    HandlerResult,
    LifecycleEvent,
    StreamConfig,
    StreamEvent,
    Subscription,
    SubscriptionId,
};
