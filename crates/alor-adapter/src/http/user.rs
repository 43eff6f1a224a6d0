/*
[INPUT]:  Portfolio identifiers and bearer token
[OUTPUT]: Account data (portfolios, positions, summary, orders, trades, risk)
[POS]:    HTTP layer - client portfolio endpoints (require bearer auth)
[UPDATE]: When adding new portfolio endpoints or changing query parameters
*/

use reqwest::Method;
use serde_json::Value;

use crate::http::{AlorClient, Result};
use crate::types::{Exchange, Format};

impl AlorClient {
    /// Portfolios available to a user
    ///
    /// GET /client/v1.0/users/{user_name}/portfolios
    pub async fn portfolios(&self, user_name: &str) -> Result<Value> {
        let endpoint = format!("/client/v1.0/users/{user_name}/portfolios");
        let builder = self.authorized_request(Method::GET, &endpoint).await?;
        self.send_value(builder).await
    }

    /// Positions of a portfolio
    ///
    /// GET /md/v2/Clients/{exchange}/{portfolio}/positions?withoutCurrency={bool}&format={format}
    pub async fn positions(
        &self,
        exchange: Exchange,
        portfolio: &str,
        without_currency: bool,
        format: Format,
    ) -> Result<Value> {
        let builder = self
            .portfolio_request(exchange, portfolio, "positions")
            .await?
            .query(&[
                ("withoutCurrency", without_currency.to_string()),
                ("format", format.as_str().to_string()),
            ]);
        self.send_value(builder).await
    }

    /// Portfolio summary (buying power, P&L)
    ///
    /// GET /md/v2/Clients/{exchange}/{portfolio}/summary?format={format}
    pub async fn summary(&self, exchange: Exchange, portfolio: &str, format: Format) -> Result<Value> {
        self.portfolio_get(exchange, portfolio, "summary", format).await
    }

    /// Orders of the current session
    ///
    /// GET /md/v2/Clients/{exchange}/{portfolio}/orders?format={format}
    pub async fn orders(&self, exchange: Exchange, portfolio: &str, format: Format) -> Result<Value> {
        self.portfolio_get(exchange, portfolio, "orders", format).await
    }

    /// Single order
    ///
    /// GET /md/v2/Clients/{exchange}/{portfolio}/orders/{order_id}?format={format}
    pub async fn order(
        &self,
        exchange: Exchange,
        portfolio: &str,
        order_id: &str,
        format: Format,
    ) -> Result<Value> {
        let resource = format!("orders/{order_id}");
        self.portfolio_get(exchange, portfolio, &resource, format).await
    }

    /// Trades of the current session
    ///
    /// GET /md/v2/Clients/{exchange}/{portfolio}/trades?format={format}
    pub async fn trades(&self, exchange: Exchange, portfolio: &str, format: Format) -> Result<Value> {
        self.portfolio_get(exchange, portfolio, "trades", format).await
    }

    /// Stop orders of the current session
    ///
    /// GET /md/v2/Clients/{exchange}/{portfolio}/stoporders?format={format}
    pub async fn stop_orders(
        &self,
        exchange: Exchange,
        portfolio: &str,
        format: Format,
    ) -> Result<Value> {
        self.portfolio_get(exchange, portfolio, "stoporders", format).await
    }

    /// Portfolio risk figures
    ///
    /// GET /md/v2/Clients/{exchange}/{portfolio}/risk?format={format}
    pub async fn risk(&self, exchange: Exchange, portfolio: &str, format: Format) -> Result<Value> {
        self.portfolio_get(exchange, portfolio, "risk", format).await
    }

    async fn portfolio_get(
        &self,
        exchange: Exchange,
        portfolio: &str,
        resource: &str,
        format: Format,
    ) -> Result<Value> {
        let builder = self
            .portfolio_request(exchange, portfolio, resource)
            .await?
            .query(&[("format", format.as_str())]);
        self.send_value(builder).await
    }

    async fn portfolio_request(
        &self,
        exchange: Exchange,
        portfolio: &str,
        resource: &str,
    ) -> Result<reqwest::RequestBuilder> {
        let endpoint = format!("/md/v2/Clients/{exchange}/{portfolio}/{resource}");
        self.authorized_request(Method::GET, &endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::auth::StaticTokenProvider;
    use crate::http::{AlorClient, AlorError, ClientConfig};
    use crate::types::{Exchange, Format};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AlorClient {
        AlorClient::with_config_and_base_urls(ClientConfig::default(), &server.uri(), &server.uri())
            .expect("client init")
            .with_token_provider(Arc::new(StaticTokenProvider::new("jwt")))
    }

    #[tokio::test]
    async fn test_positions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/md/v2/Clients/MOEX/D12345/positions"))
            .and(query_param("withoutCurrency", "true"))
            .and(query_param("format", "Simple"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"symbol": "SBER", "qty": 10}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let positions = client_for(&server)
            .positions(Exchange::Moex, "D12345", true, Format::Simple)
            .await
            .expect("positions failed");
        assert_eq!(positions[0]["qty"], serde_json::json!(10));
    }

    #[tokio::test]
    async fn test_order_not_found_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/md/v2/Clients/MOEX/D12345/orders/42"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Order not found"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .order(Exchange::Moex, "D12345", "42", Format::Simple)
            .await
            .unwrap_err();
        assert!(matches!(err, AlorError::Api { code: 404, .. }));
    }
}
