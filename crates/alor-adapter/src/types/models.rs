/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust structs for stream payloads
[POS]:    Data layer - typed views over `Simple` format payloads
[UPDATE]: When payload schema changes or new typed views are added
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Candle as delivered by `BarsGetAndSubscribe` / `GET /md/v2/history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Unix seconds of the bar open
    pub time: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub close: Decimal,
    pub volume: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub volume: i64,
}

/// Order book snapshot as delivered by `OrderBookGetAndSubscribe`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    #[serde(default)]
    pub bids: Vec<OrderBookLevel>,
    #[serde(default)]
    pub asks: Vec<OrderBookLevel>,
    #[serde(default)]
    pub ms_timestamp: Option<i64>,
    #[serde(default)]
    pub existing: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub history: Vec<Bar>,
    #[serde(default)]
    pub next: Option<i64>,
    #[serde(default)]
    pub prev: Option<i64>,
}
