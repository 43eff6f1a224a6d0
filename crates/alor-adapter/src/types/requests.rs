/*
[INPUT]:  Caller parameters for streams and orders
[OUTPUT]: Subscription descriptors and order request bodies
[POS]:    Data layer - outbound request types for WebSocket and REST
[UPDATE]: When opcode fields or order body shapes change
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::enums::{Condition, Exchange, Format, Opcode, Side, Timeframe};
use crate::http::{AlorError, Result};

/// Fields filled in by the client when a frame is built
const RESERVED_FIELDS: [&str; 3] = ["opcode", "token", "guid"];

/// Immutable description of a stream to (re-)establish with the server.
///
/// The bearer token is deliberately absent: it is injected each time the
/// frame is sent so that replays after a reconnect carry a fresh one.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRequest {
    opcode: Opcode,
    params: Map<String, Value>,
}

impl SubscriptionRequest {
    /// Build a request from raw opcode-specific fields
    pub fn new(opcode: Opcode, params: Map<String, Value>) -> Self {
        Self { opcode, params }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Check the request can be sent as-is
    pub fn validate(&self) -> Result<()> {
        if let Some(key) = RESERVED_FIELDS
            .iter()
            .find(|key| self.params.contains_key(**key))
        {
            return Err(AlorError::InvalidRequest(format!(
                "{} must not set reserved field '{key}'",
                self.opcode
            )));
        }

        for key in ["code", "portfolio"] {
            if let Some(value) = self.params.get(key) {
                let blank = value.as_str().is_none_or(|s| s.trim().is_empty());
                if blank {
                    return Err(AlorError::InvalidRequest(format!(
                        "{} requires a non-empty '{key}'",
                        self.opcode
                    )));
                }
            }
        }

        Ok(())
    }

    /// Wire frame for this request tagged with `guid`
    pub fn to_frame(&self, token: &str, guid: &str) -> Value {
        let mut frame = Map::with_capacity(self.params.len() + 3);
        frame.insert("opcode".to_string(), Value::from(self.opcode.as_str()));
        for (key, value) in &self.params {
            frame.insert(key.clone(), value.clone());
        }
        frame.insert("token".to_string(), Value::from(token));
        frame.insert("guid".to_string(), Value::from(guid));
        Value::Object(frame)
    }

    /// Order book changes
    pub fn order_book(exchange: Exchange, symbol: &str, depth: u32, format: Format) -> Self {
        Self::instrument(Opcode::OrderBookGetAndSubscribe, exchange, symbol, format)
            .with("depth", depth)
    }

    /// Bars of `timeframe` starting at unix second `from`
    pub fn bars(
        exchange: Exchange,
        symbol: &str,
        timeframe: Timeframe,
        from: i64,
        skip_history: bool,
        format: Format,
    ) -> Self {
        Self::instrument(Opcode::BarsGetAndSubscribe, exchange, symbol, format)
            .with("tf", timeframe.to_value())
            .with("from", from)
            .with("skipHistory", skip_history)
            .with("splitAdjust", true)
    }

    pub fn quotes(exchange: Exchange, symbol: &str, format: Format) -> Self {
        Self::instrument(Opcode::QuotesSubscribe, exchange, symbol, format)
    }

    /// Tape; `depth` is the number of historical trades sent first
    pub fn all_trades(exchange: Exchange, symbol: &str, depth: u32, format: Format) -> Self {
        Self::instrument(Opcode::AllTradesGetAndSubscribe, exchange, symbol, format)
            .with("depth", depth)
    }

    pub fn instrument_info(exchange: Exchange, symbol: &str, format: Format) -> Self {
        Self::instrument(Opcode::InstrumentsGetAndSubscribeV2, exchange, symbol, format)
    }

    pub fn positions(exchange: Exchange, portfolio: &str, format: Format) -> Self {
        Self::portfolio(Opcode::PositionsGetAndSubscribeV2, exchange, portfolio, format)
    }

    pub fn summaries(exchange: Exchange, portfolio: &str, format: Format) -> Self {
        Self::portfolio(Opcode::SummariesGetAndSubscribeV2, exchange, portfolio, format)
    }

    pub fn risks(exchange: Exchange, portfolio: &str, format: Format) -> Self {
        Self::portfolio(Opcode::RisksGetAndSubscribe, exchange, portfolio, format)
    }

    pub fn spectra_risks(exchange: Exchange, portfolio: &str, format: Format) -> Self {
        Self::portfolio(Opcode::SpectraRisksGetAndSubscribe, exchange, portfolio, format)
    }

    pub fn trades(exchange: Exchange, portfolio: &str, skip_history: bool, format: Format) -> Self {
        Self::portfolio(Opcode::TradesGetAndSubscribeV2, exchange, portfolio, format)
            .with("skipHistory", skip_history)
    }

    pub fn stop_orders(exchange: Exchange, portfolio: &str, format: Format) -> Self {
        Self::portfolio(Opcode::StopOrdersGetAndSubscribe, exchange, portfolio, format)
    }

    pub fn stop_orders_v2(exchange: Exchange, portfolio: &str, format: Format) -> Self {
        Self::portfolio(Opcode::StopOrdersGetAndSubscribeV2, exchange, portfolio, format)
    }

    pub fn orders(exchange: Exchange, portfolio: &str, skip_history: bool, format: Format) -> Self {
        Self::portfolio(Opcode::OrdersGetAndSubscribeV2, exchange, portfolio, format)
            .with("skipHistory", skip_history)
    }

    fn instrument(opcode: Opcode, exchange: Exchange, symbol: &str, format: Format) -> Self {
        Self::new(opcode, Map::new())
            .with("exchange", exchange.as_str())
            .with("code", symbol)
            .with("format", format.as_str())
    }

    fn portfolio(opcode: Opcode, exchange: Exchange, portfolio: &str, format: Format) -> Self {
        Self::new(opcode, Map::new())
            .with("exchange", exchange.as_str())
            .with("portfolio", portfolio)
            .with("format", format.as_str())
    }

    fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub exchange: Exchange,
    #[serde(rename = "instrumentGroup", skip_serializing_if = "Option::is_none")]
    pub board: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUser {
    pub portfolio: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOrderRequest {
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: String,
    pub quantity: u32,
    pub instrument: Instrument,
    pub user: OrderUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl MarketOrderRequest {
    pub fn new(portfolio: &str, exchange: Exchange, symbol: &str, side: Side, quantity: u32) -> Self {
        Self {
            side,
            order_type: "market".to_string(),
            quantity,
            instrument: Instrument {
                symbol: symbol.to_string(),
                exchange,
                board: None,
            },
            user: OrderUser {
                portfolio: portfolio.to_string(),
            },
            comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOrderRequest {
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub instrument: Instrument,
    pub user: OrderUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl LimitOrderRequest {
    pub fn new(
        portfolio: &str,
        exchange: Exchange,
        symbol: &str,
        side: Side,
        quantity: u32,
        price: Decimal,
    ) -> Self {
        Self {
            side,
            order_type: "limit".to_string(),
            quantity,
            price,
            instrument: Instrument {
                symbol: symbol.to_string(),
                exchange,
                board: None,
            },
            user: OrderUser {
                portfolio: portfolio.to_string(),
            },
            comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopOrderRequest {
    pub side: Side,
    pub condition: Condition,
    #[serde(rename = "triggerPrice", with = "rust_decimal::serde::float")]
    pub trigger_price: Decimal,
    /// Unix seconds; 0 means good till cancelled
    #[serde(rename = "stopEndUnixTime")]
    pub stop_end_unix_time: i64,
    pub quantity: u32,
    pub instrument: Instrument,
    pub user: OrderUser,
}
