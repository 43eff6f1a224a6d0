/*
[INPUT]:  Refresh token and OAuth HTTP client
[OUTPUT]: Cached JWT access token, refreshed before it goes stale
[POS]:    Auth layer - orchestrates the token exchange flow
[UPDATE]: When OAuth endpoints or refresh policy change
*/

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Method;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::http::{AlorClient, AlorError, Result};
use crate::types::RefreshTokenResponse;

use super::jwt::decode_expiry;
use super::{JwtManager, TokenProvider};

/// Refresh this long before `exp`
const REFRESH_MARGIN_SECONDS: i64 = 60;
/// Assumed lifetime when the token carries no readable `exp`
const FALLBACK_LIFETIME_SECONDS: i64 = 25 * 60;

/// Exchanges a long-lived refresh token for short-lived access tokens
#[derive(Debug)]
pub struct AuthManager {
    client: AlorClient,
    refresh_token: String,
    jwt_manager: JwtManager,
    refresh_lock: Mutex<()>,
}

impl AuthManager {
    /// Create a new auth manager
    pub fn new(client: AlorClient, refresh_token: &str) -> Self {
        Self {
            client,
            refresh_token: refresh_token.to_string(),
            jwt_manager: JwtManager::new(),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Get the JWT manager
    pub fn jwt_manager(&self) -> &JwtManager {
        &self.jwt_manager
    }

    /// Exchange the refresh token for a new access token
    ///
    /// POST /refresh?token={refresh_token}
    pub async fn refresh(&self) -> Result<String> {
        let builder = self
            .client
            .oauth_request(Method::POST, "/refresh")?
            .query(&[("token", self.refresh_token.as_str())]);

        let response: RefreshTokenResponse =
            self.client.send_json(builder).await.map_err(|err| match err {
                AlorError::Api { code, message } => AlorError::Authentication {
                    message: format!("token refresh rejected (code {code}): {message}"),
                },
                other => other,
            })?;

        let expires_at = decode_expiry(&response.access_token)
            .unwrap_or_else(|| Utc::now() + Duration::seconds(FALLBACK_LIFETIME_SECONDS));
        info!(%expires_at, "access token refreshed");

        self.jwt_manager
            .set_token(response.access_token.clone(), expires_at);
        Ok(response.access_token)
    }
}

#[async_trait]
impl TokenProvider for AuthManager {
    async fn token(&self) -> Result<String> {
        let margin = Duration::seconds(REFRESH_MARGIN_SECONDS);
        if !self.jwt_manager.expires_within(margin)
            && let Some(token) = self.jwt_manager.get_token()
        {
            return Ok(token);
        }

        // Concurrent callers wait for one refresh instead of issuing their own
        let _guard = self.refresh_lock.lock().await;
        if !self.jwt_manager.expires_within(margin)
            && let Some(token) = self.jwt_manager.get_token()
        {
            debug!("access token refreshed by a concurrent caller");
            return Ok(token);
        }

        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::http::ClientConfig;

    fn make_test_jwt(exp: i64) -> String {
        let header = serde_json::json!({"alg": "none", "typ": "JWT"});
        let payload = serde_json::json!({"exp": exp});
        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        format!("{header_b64}.{payload_b64}.signature")
    }

    fn manager_for(server: &MockServer) -> AuthManager {
        let client = AlorClient::with_config_and_base_urls(
            ClientConfig::default(),
            &server.uri(),
            &server.uri(),
        )
        .unwrap();
        AuthManager::new(client, "refresh-123")
    }

    #[tokio::test]
    async fn test_token_is_cached_until_stale() {
        let server = MockServer::start().await;
        let jwt = make_test_jwt((Utc::now() + Duration::hours(1)).timestamp());

        Mock::given(method("POST"))
            .and(path("/refresh"))
            .and(query_param("token", "refresh-123"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"AccessToken": jwt})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        let first = manager.token().await.unwrap();
        let second = manager.token().await.unwrap();

        assert_eq!(first, jwt);
        assert_eq!(second, jwt);
    }

    #[tokio::test]
    async fn test_token_refreshes_inside_margin() {
        let server = MockServer::start().await;
        let jwt = make_test_jwt((Utc::now() + Duration::seconds(10)).timestamp());

        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"AccessToken": jwt})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        manager.token().await.unwrap();
        manager.token().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let server = MockServer::start().await;
        let jwt = make_test_jwt((Utc::now() + Duration::hours(1)).timestamp());

        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"AccessToken": jwt}))
                    .set_delay(std::time::Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let manager = Arc::new(manager_for(&server));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), jwt);
        }
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
            .mount(&server)
            .await;

        let err = manager_for(&server).token().await.unwrap_err();
        assert!(err.is_auth_error());
        assert!(matches!(err, AlorError::Authentication { .. }));
    }
}
