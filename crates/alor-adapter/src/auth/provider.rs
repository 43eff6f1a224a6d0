/*
[INPUT]:  Cached or freshly exchanged bearer tokens
[OUTPUT]: Current bearer token on demand
[POS]:    Auth layer - token source abstraction shared by REST and WebSocket
[UPDATE]: When adding new token sources or changing refresh semantics
*/

use async_trait::async_trait;

use crate::http::Result;

/// Source of bearer tokens
///
/// Implementations refresh the token themselves when it is stale; callers
/// ask for a token right before every request or frame.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a token valid for at least the next request
    async fn token(&self) -> Result<String>;
}

/// Fixed token, for tests and short-lived tools
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new("jwt");
        assert_eq!(provider.token().await.unwrap(), "jwt");
    }
}
