/*
[INPUT]:  Order requests and bearer token
[OUTPUT]: Order placement / cancellation results
[POS]:    HTTP layer - trading endpoints (require auth + request id header)
[UPDATE]: When adding new trading endpoints or changing order flow
*/

use reqwest::Method;
use serde_json::Value;
use uuid::Uuid;

use crate::http::{AlorClient, Result};
use crate::types::{Exchange, LimitOrderRequest, MarketOrderRequest, StopOrderRequest};

const ORDERS_ENDPOINT: &str = "/commandapi/warptrans/TRADE/v2/client/orders";
const REQUEST_ID_HEADER: &str = "X-ALOR-REQID";

impl AlorClient {
    /// Create a market order
    ///
    /// POST /commandapi/warptrans/TRADE/v2/client/orders/actions/market
    pub async fn create_market_order(&self, req: &MarketOrderRequest) -> Result<Value> {
        self.post_order("market", &req.user.portfolio, req).await
    }

    /// Create a limit order
    ///
    /// POST /commandapi/warptrans/TRADE/v2/client/orders/actions/limit
    pub async fn create_limit_order(&self, req: &LimitOrderRequest) -> Result<Value> {
        self.post_order("limit", &req.user.portfolio, req).await
    }

    /// Create a stop order
    ///
    /// POST /commandapi/warptrans/TRADE/v2/client/orders/actions/stop
    pub async fn create_stop_order(&self, req: &StopOrderRequest) -> Result<Value> {
        self.post_order("stop", &req.user.portfolio, req).await
    }

    /// Cancel an order; the server answers with plain text on success
    ///
    /// DELETE /commandapi/warptrans/TRADE/v2/client/orders/{order_id}?portfolio=&exchange=&stop=
    pub async fn delete_order(
        &self,
        portfolio: &str,
        exchange: Exchange,
        order_id: &str,
        stop: bool,
    ) -> Result<Value> {
        let endpoint = format!("{ORDERS_ENDPOINT}/{order_id}");
        let builder = self
            .authorized_request(Method::DELETE, &endpoint)
            .await?
            .query(&[
                ("portfolio", portfolio.to_string()),
                ("exchange", exchange.as_str().to_string()),
                ("stop", stop.to_string()),
                ("format", "Simple".to_string()),
            ]);
        self.send_value(builder).await
    }

    async fn post_order<T: serde::Serialize>(
        &self,
        action: &str,
        portfolio: &str,
        body: &T,
    ) -> Result<Value> {
        let endpoint = format!("{ORDERS_ENDPOINT}/actions/{action}");
        let builder = self
            .authorized_request(Method::POST, &endpoint)
            .await?
            .header(REQUEST_ID_HEADER, request_id(portfolio))
            .json(body);
        self.send_value(builder).await
    }
}

/// Idempotency key the server expects per order request
fn request_id(portfolio: &str) -> String {
    format!("{portfolio};{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::StaticTokenProvider;
    use crate::http::ClientConfig;
    use crate::types::Side;
    use wiremock::matchers::{body_json, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AlorClient {
        AlorClient::with_config_and_base_urls(ClientConfig::default(), &server.uri(), &server.uri())
            .expect("client init")
            .with_token_provider(Arc::new(StaticTokenProvider::new("jwt")))
    }

    #[test]
    fn test_request_id_prefixed_with_portfolio() {
        let id = request_id("D12345");
        let (portfolio, uuid) = id.split_once(';').unwrap();
        assert_eq!(portfolio, "D12345");
        assert!(Uuid::parse_str(uuid).is_ok());
    }

    #[tokio::test]
    async fn test_create_market_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/commandapi/warptrans/TRADE/v2/client/orders/actions/market",
            ))
            .and(header_exists("x-alor-reqid"))
            .and(body_json(serde_json::json!({
                "side": "sell",
                "type": "market",
                "quantity": 3,
                "instrument": {"symbol": "GAZP", "exchange": "MOEX"},
                "user": {"portfolio": "D12345"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "success",
                "orderNumber": "18995978560"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let order = MarketOrderRequest::new("D12345", Exchange::Moex, "GAZP", Side::Sell, 3);
        let response = client_for(&server)
            .create_market_order(&order)
            .await
            .expect("create_market_order failed");
        assert_eq!(response["orderNumber"], serde_json::json!("18995978560"));
    }

    #[tokio::test]
    async fn test_delete_order_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/commandapi/warptrans/TRADE/v2/client/orders/18995978560"))
            .and(query_param("portfolio", "D12345"))
            .and(query_param("exchange", "MOEX"))
            .and(query_param("stop", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_string("success"))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .delete_order("D12345", Exchange::Moex, "18995978560", false)
            .await
            .expect("delete_order failed");
        assert_eq!(response, Value::String("success".to_string()));
    }
}
