/*
[INPUT]:  HTTP configuration (server selection, timeouts, token provider)
[OUTPUT]: Configured reqwest client ready for API calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::TokenProvider;
use crate::http::{AlorError, Result};
use crate::types::Environment;

const ERROR_BODY_MAX_BYTES: usize = 512;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub environment: Environment,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Main HTTP client for the Alor OpenAPI
#[derive(Clone)]
pub struct AlorClient {
    http_client: Client,
    api_base_url: Url,
    oauth_base_url: Url,
    token_provider: Option<Arc<dyn TokenProvider>>,
}

impl fmt::Debug for AlorClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlorClient")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("oauth_base_url", &self.oauth_base_url.as_str())
            .field("authorized", &self.token_provider.is_some())
            .finish()
    }
}

impl AlorClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let api = config.environment.api_url();
        let oauth = config.environment.oauth_url();
        Self::with_config_and_base_urls(config, api, oauth)
    }

    /// Create a client against explicit base URLs (mock servers, proxies)
    pub fn with_config_and_base_urls(
        config: ClientConfig,
        api_base_url: &str,
        oauth_base_url: &str,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            api_base_url: Url::parse(api_base_url)?,
            oauth_base_url: Url::parse(oauth_base_url)?,
            token_provider: None,
        })
    }

    /// Attach the bearer token source for authorized endpoints
    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }

    /// Build request builder for API endpoints (no auth header)
    pub(crate) fn api_request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.api_base_url.join(endpoint)?;
        Ok(self.http_client.request(method, url))
    }

    /// Build request builder for OAuth endpoints
    pub(crate) fn oauth_request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.oauth_base_url.join(endpoint)?;
        Ok(self.http_client.request(method, url))
    }

    /// Build request builder for API endpoints with a bearer token
    pub(crate) async fn authorized_request(
        &self,
        method: Method,
        endpoint: &str,
    ) -> Result<RequestBuilder> {
        let provider = self.token_provider.as_ref().ok_or_else(|| {
            AlorError::Config("authorized endpoint called without a token provider".to_string())
        })?;
        let token = provider.token().await?;
        Ok(self.api_request(method, endpoint)?.bearer_auth(token))
    }

    /// Send and decode a JSON body into `T`
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let body = self.send_checked(builder).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Send and return parsed JSON, or the raw text when the body is not JSON
    pub(crate) async fn send_value(&self, builder: RequestBuilder) -> Result<serde_json::Value> {
        let body = self.send_checked(builder).await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(_) => {
                debug!(bytes = body.len(), "non-JSON response body returned as text");
                Ok(serde_json::Value::String(body))
            }
        }
    }

    async fn send_checked(&self, builder: RequestBuilder) -> Result<String> {
        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                path = %url,
                body = %truncate_for_log(&body, ERROR_BODY_MAX_BYTES),
                "API request failed"
            );
            return Err(AlorError::api_error(status, body));
        }

        Ok(body)
    }
}

pub(crate) fn truncate_for_log(value: &str, max_len: usize) -> &str {
    if value.len() <= max_len {
        return value;
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AlorClient {
        AlorClient::with_config_and_base_urls(ClientConfig::default(), &server.uri(), &server.uri())
            .expect("client init")
            .with_token_provider(Arc::new(StaticTokenProvider::new("jwt")))
    }

    #[tokio::test]
    async fn test_send_value_returns_text_for_non_json() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/orders/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("success"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let builder = client.api_request(Method::DELETE, "/orders/1").unwrap();
        let value = client.send_value(builder).await.unwrap();
        assert_eq!(value, serde_json::Value::String("success".to_string()));
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/md/v2/time"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let builder = client.api_request(Method::GET, "/md/v2/time").unwrap();
        let err = client.send_value(builder).await.unwrap_err();
        match err {
            AlorError::Api { code, message } => {
                assert_eq!(code, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_authorized_request_sets_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/private"))
            .and(header("authorization", "Bearer jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let builder = client
            .authorized_request(Method::GET, "/private")
            .await
            .unwrap();
        let value = client.send_value(builder).await.unwrap();
        assert_eq!(value["ok"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_authorized_request_without_provider_fails() {
        let client = AlorClient::new().unwrap();
        let err = client
            .authorized_request(Method::GET, "/private")
            .await
            .unwrap_err();
        assert!(matches!(err, AlorError::Config(_)));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        let text = "ééé";
        assert_eq!(truncate_for_log(text, 3), "é");
    }
}
