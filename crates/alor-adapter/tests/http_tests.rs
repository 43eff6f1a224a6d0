/*
[INPUT]:  Mock HTTP responses
[OUTPUT]: Test results for HTTP client
[POS]:    Integration tests - HTTP endpoints
[UPDATE]: When HTTP endpoints change
*/

mod common;

use std::sync::Arc;

use alor_adapter::{
    AlorClient, AlorError, ClientConfig, ErrorKind, Exchange, Format, LimitOrderRequest, Side,
    StaticTokenProvider, Timeframe,
};
use common::{client_for, setup_mock_server};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[test]
fn test_client_creation() {
    let client = assert_ok!(AlorClient::new());
    assert_eq!(client.api_base_url().as_str(), "https://api.alor.ru/");
}

#[test]
fn test_client_with_config() {
    let config = ClientConfig::default();
    let _client = assert_ok!(AlorClient::with_config(config));
}

#[tokio::test]
async fn test_authorized_call_without_provider_is_config_error() {
    let server = setup_mock_server().await;
    let err = client_for(&server)
        .positions(Exchange::Moex, "D12345", false, Format::Simple)
        .await
        .unwrap_err();
    assert!(matches!(err, AlorError::Config(_)));
}

#[tokio::test]
async fn test_bearer_token_and_history_query() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/md/v2/history"))
        .and(header("authorization", "Bearer secret-jwt"))
        .and(query_param("tf", "D"))
        .and(query_param("symbol", "GAZP"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "history": [
                {"time": 1700000000, "open": 160.0, "high": 162.0, "low": 159.0, "close": 161.5, "volume": 1200}
            ],
            "next": null,
            "prev": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).with_token_provider(Arc::new(StaticTokenProvider::new("secret-jwt")));
    let history = assert_ok!(
        client
            .history(Exchange::Moex, "GAZP", Timeframe::Day, 1_700_000_000, 1_700_086_400)
            .await
    );
    assert_eq!(history.history.len(), 1);
    assert_eq!(history.history[0].close, "161.5".parse().unwrap());
}

#[tokio::test]
async fn test_non_2xx_maps_to_api_error() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/md/v2/Clients/MOEX/D12345/summary"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let client = client_for(&server).with_token_provider(Arc::new(StaticTokenProvider::new("jwt")));
    let err = client
        .summary(Exchange::Moex, "D12345", Format::Simple)
        .await
        .unwrap_err();

    assert!(matches!(&err, AlorError::Api { code: 403, message } if message == "Forbidden"));
    assert!(err.is_auth_error());
    assert_eq!(err.kind(), ErrorKind::Application);
}

#[tokio::test]
async fn test_limit_order_posts_request_id() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/commandapi/warptrans/TRADE/v2/client/orders/actions/limit"))
        .and(header_exists("x-alor-reqid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "success",
            "orderNumber": "19001"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).with_token_provider(Arc::new(StaticTokenProvider::new("jwt")));
    let order = LimitOrderRequest::new(
        "D12345",
        Exchange::Moex,
        "SBER",
        Side::Buy,
        2,
        "250.25".parse().unwrap(),
    );
    let response = assert_ok!(client.create_limit_order(&order).await);
    assert_eq!(response["orderNumber"], "19001");
}

#[tokio::test]
async fn test_portfolios_empty_body_is_null() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/client/v1.0/users/P012345/portfolios"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client_for(&server).with_token_provider(Arc::new(StaticTokenProvider::new("jwt")));
    let portfolios = assert_ok!(client.portfolios("P012345").await);
    assert!(portfolios.is_null());
}
