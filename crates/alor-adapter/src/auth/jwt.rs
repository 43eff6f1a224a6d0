/*
[INPUT]:  JWT access tokens and their expiration claims
[OUTPUT]: Token retrieval and staleness checks
[POS]:    Auth layer - token lifecycle management
[UPDATE]: When changing token storage or the expiry source
*/

use std::sync::{Arc, PoisonError, RwLock};

use base64::{
    Engine as _,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use chrono::{DateTime, Duration, Utc};

/// Stored token data with metadata
#[derive(Debug, Clone)]
pub struct TokenData {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Thread-safe JWT token cell
#[derive(Debug, Clone)]
pub struct JwtManager {
    data: Arc<RwLock<Option<TokenData>>>,
}

impl JwtManager {
    /// Create a new empty JWT manager
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(None)),
        }
    }

    /// Store a new token with expiration
    pub fn set_token(&self, token: String, expires_at: DateTime<Utc>) {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(TokenData { token, expires_at });
    }

    /// Get the current token if available
    pub fn get_token(&self) -> Option<String> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(|data| data.token.clone())
    }

    /// Check if token is expired
    pub fn is_expired(&self) -> bool {
        self.expires_within(Duration::zero())
    }

    /// Check if the token is missing or expires within `margin`
    pub fn expires_within(&self, margin: Duration) -> bool {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(data) => Utc::now() + margin >= data.expires_at,
            None => true,
        }
    }

    /// Get token data if available
    pub fn token_data(&self) -> Option<TokenData> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    /// Clear the stored token
    pub fn clear(&self) {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }
}

impl Default for JwtManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Read the `exp` claim of a JWT without verifying its signature
pub fn decode_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload_b64 = token.trim().split('.').nth(1)?;
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .or_else(|_| URL_SAFE.decode(payload_b64))
        .ok()?;
    let payload: serde_json::Value = serde_json::from_slice(&payload_bytes).ok()?;
    let exp = payload.get("exp")?.as_i64()?;
    DateTime::from_timestamp(exp, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_jwt(exp: i64) -> String {
        let header = serde_json::json!({"alg": "none", "typ": "JWT"});
        let payload = serde_json::json!({"sub": "P012345", "exp": exp});
        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        format!("{header_b64}.{payload_b64}.signature")
    }

    #[test]
    fn test_new_manager_is_empty() {
        let manager = JwtManager::new();
        assert!(manager.get_token().is_none());
        assert!(manager.is_expired());
    }

    #[test]
    fn test_set_and_get_token() {
        let manager = JwtManager::new();
        manager.set_token("test_token".to_string(), Utc::now() + Duration::hours(1));

        assert_eq!(manager.get_token(), Some("test_token".to_string()));
        assert!(!manager.is_expired());
        assert!(manager.expires_within(Duration::hours(2)));
    }

    #[test]
    fn test_clear_token() {
        let manager = JwtManager::new();
        manager.set_token("test_token".to_string(), Utc::now() + Duration::hours(1));

        manager.clear();
        assert!(manager.get_token().is_none());
        assert!(manager.is_expired());
    }

    #[test]
    fn test_decode_expiry() {
        let jwt = make_test_jwt(1_700_000_000);
        let exp = decode_expiry(&jwt).expect("exp claim");
        assert_eq!(exp.timestamp(), 1_700_000_000);

        assert!(decode_expiry("not-a-jwt").is_none());
    }
}
