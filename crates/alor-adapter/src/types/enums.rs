/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes, new opcodes or new servers are added
*/

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    Moex,
    Spbx,
}

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Moex => "MOEX",
            Exchange::Spbx => "SPBX",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response payload shape requested from the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Format {
    #[default]
    Simple,
    Slim,
    Heavy,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Simple => "Simple",
            Format::Slim => "Slim",
            Format::Heavy => "Heavy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Stop order trigger condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    More,
    Less,
    MoreOrEqual,
    LessOrEqual,
}

/// Bar duration
///
/// Intraday bars are expressed in seconds; calendar bars use the server's
/// letter codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    Seconds(u32),
    Day,
    Week,
    Month,
}

impl Timeframe {
    pub fn minutes(minutes: u32) -> Self {
        Timeframe::Seconds(minutes * 60)
    }

    pub fn hours(hours: u32) -> Self {
        Timeframe::Seconds(hours * 3600)
    }

    /// Wire value for the `tf` field
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Timeframe::Seconds(secs) => serde_json::Value::from(*secs),
            Timeframe::Day => serde_json::Value::from("D"),
            Timeframe::Week => serde_json::Value::from("W"),
            Timeframe::Month => serde_json::Value::from("M"),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Seconds(secs) => write!(f, "{secs}"),
            Timeframe::Day => f.write_str("D"),
            Timeframe::Week => f.write_str("W"),
            Timeframe::Month => f.write_str("M"),
        }
    }
}

/// Server selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Demo,
}

impl Environment {
    pub fn api_url(&self) -> &'static str {
        match self {
            Environment::Production => "https://api.alor.ru",
            Environment::Demo => "https://apidev.alor.ru",
        }
    }

    pub fn oauth_url(&self) -> &'static str {
        match self {
            Environment::Production => "https://oauth.alor.ru",
            Environment::Demo => "https://oauthdev.alor.ru",
        }
    }

    pub fn stream_url(&self) -> &'static str {
        match self {
            Environment::Production => "wss://api.alor.ru/ws",
            Environment::Demo => "wss://apidev.alor.ru/ws",
        }
    }

    pub fn command_url(&self) -> &'static str {
        match self {
            Environment::Production => "wss://api.alor.ru/cws",
            Environment::Demo => "wss://apidev.alor.ru/cws",
        }
    }
}

/// Event category a data frame is delivered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OrderBook,
    NewBar,
    Quotes,
    AllTrades,
    Position,
    Summary,
    Risk,
    SpectraRisk,
    Trade,
    StopOrder,
    StopOrderV2,
    Order,
    SymbolInfo,
}

/// Subscription opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    OrderBookGetAndSubscribe,
    BarsGetAndSubscribe,
    QuotesSubscribe,
    AllTradesGetAndSubscribe,
    PositionsGetAndSubscribeV2,
    SummariesGetAndSubscribeV2,
    RisksGetAndSubscribe,
    SpectraRisksGetAndSubscribe,
    TradesGetAndSubscribeV2,
    StopOrdersGetAndSubscribe,
    StopOrdersGetAndSubscribeV2,
    OrdersGetAndSubscribeV2,
    InstrumentsGetAndSubscribeV2,
}

impl Opcode {
    pub const ALL: [Opcode; 13] = [
        Opcode::OrderBookGetAndSubscribe,
        Opcode::BarsGetAndSubscribe,
        Opcode::QuotesSubscribe,
        Opcode::AllTradesGetAndSubscribe,
        Opcode::PositionsGetAndSubscribeV2,
        Opcode::SummariesGetAndSubscribeV2,
        Opcode::RisksGetAndSubscribe,
        Opcode::SpectraRisksGetAndSubscribe,
        Opcode::TradesGetAndSubscribeV2,
        Opcode::StopOrdersGetAndSubscribe,
        Opcode::StopOrdersGetAndSubscribeV2,
        Opcode::OrdersGetAndSubscribeV2,
        Opcode::InstrumentsGetAndSubscribeV2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Opcode::OrderBookGetAndSubscribe => "OrderBookGetAndSubscribe",
            Opcode::BarsGetAndSubscribe => "BarsGetAndSubscribe",
            Opcode::QuotesSubscribe => "QuotesSubscribe",
            Opcode::AllTradesGetAndSubscribe => "AllTradesGetAndSubscribe",
            Opcode::PositionsGetAndSubscribeV2 => "PositionsGetAndSubscribeV2",
            Opcode::SummariesGetAndSubscribeV2 => "SummariesGetAndSubscribeV2",
            Opcode::RisksGetAndSubscribe => "RisksGetAndSubscribe",
            Opcode::SpectraRisksGetAndSubscribe => "SpectraRisksGetAndSubscribe",
            Opcode::TradesGetAndSubscribeV2 => "TradesGetAndSubscribeV2",
            Opcode::StopOrdersGetAndSubscribe => "StopOrdersGetAndSubscribe",
            Opcode::StopOrdersGetAndSubscribeV2 => "StopOrdersGetAndSubscribeV2",
            Opcode::OrdersGetAndSubscribeV2 => "OrdersGetAndSubscribeV2",
            Opcode::InstrumentsGetAndSubscribeV2 => "InstrumentsGetAndSubscribeV2",
        }
    }

    /// Category inbound data for this opcode is routed to
    pub fn event_kind(&self) -> EventKind {
        match self {
            Opcode::OrderBookGetAndSubscribe => EventKind::OrderBook,
            Opcode::BarsGetAndSubscribe => EventKind::NewBar,
            Opcode::QuotesSubscribe => EventKind::Quotes,
            Opcode::AllTradesGetAndSubscribe => EventKind::AllTrades,
            Opcode::PositionsGetAndSubscribeV2 => EventKind::Position,
            Opcode::SummariesGetAndSubscribeV2 => EventKind::Summary,
            Opcode::RisksGetAndSubscribe => EventKind::Risk,
            Opcode::SpectraRisksGetAndSubscribe => EventKind::SpectraRisk,
            Opcode::TradesGetAndSubscribeV2 => EventKind::Trade,
            Opcode::StopOrdersGetAndSubscribe => EventKind::StopOrder,
            Opcode::StopOrdersGetAndSubscribeV2 => EventKind::StopOrderV2,
            Opcode::OrdersGetAndSubscribeV2 => EventKind::Order,
            Opcode::InstrumentsGetAndSubscribeV2 => EventKind::SymbolInfo,
        }
    }

    /// Bars are delivered only once closed
    pub fn is_bars(&self) -> bool {
        matches!(self, Opcode::BarsGetAndSubscribe)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_opcode_serializes_as_wire_name() {
        for opcode in Opcode::ALL {
            let value = serde_json::to_value(opcode).unwrap();
            assert_eq!(value, serde_json::Value::from(opcode.as_str()));
        }
    }

    #[test]
    fn test_every_opcode_routes_to_distinct_kind() {
        let kinds: HashSet<EventKind> = Opcode::ALL.iter().map(Opcode::event_kind).collect();
        assert_eq!(kinds.len(), Opcode::ALL.len());
    }

    #[test]
    fn test_timeframe_wire_value() {
        assert_eq!(Timeframe::minutes(5).to_value(), serde_json::json!(300));
        assert_eq!(Timeframe::Day.to_value(), serde_json::json!("D"));
        assert_eq!(Timeframe::hours(1).to_string(), "3600");
    }

    #[test]
    fn test_environment_urls() {
        assert_eq!(Environment::Demo.stream_url(), "wss://apidev.alor.ru/ws");
        assert_eq!(Environment::default(), Environment::Production);
        assert_eq!(Environment::Production.oauth_url(), "https://oauth.alor.ru");
    }
}
