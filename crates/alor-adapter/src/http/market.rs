/*
[INPUT]:  Symbol identifiers and query parameters
[OUTPUT]: Market data (securities, quotes, order book, history, tape)
[POS]:    HTTP layer - market data endpoints
[UPDATE]: When adding new market data endpoints or changing response format
*/

use reqwest::Method;
use serde_json::Value;

use crate::http::{AlorClient, Result};
use crate::types::{Exchange, Format, History, Timeframe};

impl AlorClient {
    /// Server time in unix seconds
    ///
    /// GET /md/v2/time
    pub async fn server_time(&self) -> Result<i64> {
        let builder = self.api_request(Method::GET, "/md/v2/time")?;
        self.send_json(builder).await
    }

    /// Search securities
    ///
    /// GET /md/v2/Securities?query={query}&limit={limit}&exchange={exchange}&format={format}
    pub async fn securities(
        &self,
        query: &str,
        limit: u32,
        exchange: Option<Exchange>,
        format: Format,
    ) -> Result<Value> {
        let mut params = vec![
            ("query", query.to_string()),
            ("limit", limit.to_string()),
            ("format", format.as_str().to_string()),
        ];
        if let Some(exchange) = exchange {
            params.push(("exchange", exchange.as_str().to_string()));
        }

        let builder = self
            .authorized_request(Method::GET, "/md/v2/Securities")
            .await?
            .query(&params);
        self.send_value(builder).await
    }

    /// Single security specification
    ///
    /// GET /md/v2/Securities/{exchange}/{symbol}?format={format}
    pub async fn security(&self, exchange: Exchange, symbol: &str, format: Format) -> Result<Value> {
        let endpoint = format!("/md/v2/Securities/{exchange}/{symbol}");
        let builder = self
            .authorized_request(Method::GET, &endpoint)
            .await?
            .query(&[("format", format.as_str())]);
        self.send_value(builder).await
    }

    /// Quotes for `EXCHANGE:SYMBOL` pairs
    ///
    /// GET /md/v2/Securities/{symbols}/quotes?format={format}
    pub async fn quotes(&self, symbols: &[(Exchange, &str)], format: Format) -> Result<Value> {
        let joined = symbols
            .iter()
            .map(|(exchange, symbol)| format!("{exchange}:{symbol}"))
            .collect::<Vec<_>>()
            .join(",");
        let endpoint = format!("/md/v2/Securities/{joined}/quotes");
        let builder = self
            .authorized_request(Method::GET, &endpoint)
            .await?
            .query(&[("format", format.as_str())]);
        self.send_value(builder).await
    }

    /// Order book snapshot
    ///
    /// GET /md/v2/orderbooks/{exchange}/{symbol}?depth={depth}&format={format}
    pub async fn order_book(
        &self,
        exchange: Exchange,
        symbol: &str,
        depth: u32,
        format: Format,
    ) -> Result<Value> {
        let endpoint = format!("/md/v2/orderbooks/{exchange}/{symbol}");
        let builder = self
            .authorized_request(Method::GET, &endpoint)
            .await?
            .query(&[("depth", depth.to_string()), ("format", format.as_str().to_string())]);
        self.send_value(builder).await
    }

    /// Bar history in the `Simple` format
    ///
    /// GET /md/v2/history?symbol={symbol}&exchange={exchange}&tf={tf}&from={from}&to={to}
    pub async fn history(
        &self,
        exchange: Exchange,
        symbol: &str,
        timeframe: Timeframe,
        from: i64,
        to: i64,
    ) -> Result<History> {
        let builder = self
            .authorized_request(Method::GET, "/md/v2/history")
            .await?
            .query(&[
                ("symbol", symbol.to_string()),
                ("exchange", exchange.as_str().to_string()),
                ("tf", timeframe.to_string()),
                ("from", from.to_string()),
                ("to", to.to_string()),
                ("format", Format::Simple.as_str().to_string()),
            ]);
        self.send_json(builder).await
    }

    /// Tape for a symbol
    ///
    /// GET /md/v2/Securities/{exchange}/{symbol}/alltrades?take={take}&format={format}
    pub async fn all_trades(
        &self,
        exchange: Exchange,
        symbol: &str,
        take: u32,
        format: Format,
    ) -> Result<Value> {
        let endpoint = format!("/md/v2/Securities/{exchange}/{symbol}/alltrades");
        let builder = self
            .authorized_request(Method::GET, &endpoint)
            .await?
            .query(&[("take", take.to_string()), ("format", format.as_str().to_string())]);
        self.send_value(builder).await
    }
}
