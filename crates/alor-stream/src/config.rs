/*
[INPUT]:  YAML configuration file, ALOR_* environment variables
[OUTPUT]: Validated runner configuration and subscription requests
[POS]:    Configuration layer - runner setup
[UPDATE]: When adding new configuration options or stream kinds
*/

use alor_adapter::{Environment, Exchange, Format, SubscriptionRequest, Timeframe};
use anyhow::{Context, Result, anyhow, bail};
use config::{Config, FileFormat};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the stream runner
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Server selection: "production" or "demo"
    #[serde(default)]
    pub environment: Environment,
    /// Long-lived refresh token; usually supplied via `ALOR_REFRESH_TOKEN`
    #[serde(default)]
    pub refresh_token: String,
    /// Streams to open at startup
    #[serde(default)]
    pub subscriptions: Vec<StreamConfigEntry>,
}

/// One configured stream
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfigEntry {
    #[serde(flatten)]
    pub stream: StreamKind,
    #[serde(default = "default_exchange")]
    pub exchange: Exchange,
    #[serde(default)]
    pub format: Format,
}

/// Stream category plus its category-specific parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "stream", rename_all = "snake_case")]
pub enum StreamKind {
    OrderBook {
        symbol: String,
        #[serde(default = "default_depth")]
        depth: u32,
    },
    Bars {
        symbol: String,
        /// Seconds, or one of "D", "W", "M"
        #[serde(default = "default_timeframe")]
        timeframe: String,
        /// How far back the initial history reaches
        #[serde(default = "default_history_minutes")]
        history_minutes: u32,
        #[serde(default)]
        skip_history: bool,
    },
    Quotes {
        symbol: String,
    },
    AllTrades {
        symbol: String,
        #[serde(default)]
        depth: u32,
    },
    Instrument {
        symbol: String,
    },
    Positions {
        portfolio: String,
    },
    Summaries {
        portfolio: String,
    },
    Risks {
        portfolio: String,
    },
    SpectraRisks {
        portfolio: String,
    },
    Trades {
        portfolio: String,
        #[serde(default)]
        skip_history: bool,
    },
    StopOrders {
        portfolio: String,
    },
    StopOrdersV2 {
        portfolio: String,
    },
    Orders {
        portfolio: String,
        #[serde(default)]
        skip_history: bool,
    },
}

fn default_exchange() -> Exchange {
    Exchange::Moex
}

fn default_depth() -> u32 {
    10
}

fn default_timeframe() -> String {
    "60".to_string()
}

fn default_history_minutes() -> u32 {
    60
}

impl RunnerConfig {
    /// Load configuration from a YAML file, overlaid with `ALOR_*` variables
    pub fn from_file(path: &str) -> Result<Self> {
        Self::assemble(
            config::File::new(path, FileFormat::Yaml),
            config::Environment::with_prefix("ALOR"),
        )
    }

    fn assemble<S>(file: S, env: config::Environment) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = Config::builder()
            .add_source(file)
            .add_source(env)
            .build()
            .context("read configuration sources")?;
        let config: Self = settings
            .try_deserialize()
            .context("deserialize runner configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_token.trim().is_empty() {
            bail!("refresh_token is empty; set it in the file or via ALOR_REFRESH_TOKEN");
        }
        if self.subscriptions.is_empty() {
            bail!("no subscriptions configured");
        }
        for (index, entry) in self.subscriptions.iter().enumerate() {
            entry
                .request(0)
                .with_context(|| format!("subscription #{index}"))?;
        }
        Ok(())
    }

    /// Subscription requests for every configured stream
    ///
    /// `now` anchors the history start of bar streams.
    pub fn requests(&self, now: i64) -> Result<Vec<SubscriptionRequest>> {
        self.subscriptions
            .iter()
            .map(|entry| entry.request(now))
            .collect()
    }
}

impl StreamConfigEntry {
    pub fn request(&self, now: i64) -> Result<SubscriptionRequest> {
        let (exchange, format) = (self.exchange, self.format);
        let request = match &self.stream {
            StreamKind::OrderBook { symbol, depth } => {
                SubscriptionRequest::order_book(exchange, symbol, *depth, format)
            }
            StreamKind::Bars {
                symbol,
                timeframe,
                history_minutes,
                skip_history,
            } => {
                let from = now - i64::from(*history_minutes) * 60;
                SubscriptionRequest::bars(
                    exchange,
                    symbol,
                    parse_timeframe(timeframe)?,
                    from,
                    *skip_history,
                    format,
                )
            }
            StreamKind::Quotes { symbol } => SubscriptionRequest::quotes(exchange, symbol, format),
            StreamKind::AllTrades { symbol, depth } => {
                SubscriptionRequest::all_trades(exchange, symbol, *depth, format)
            }
            StreamKind::Instrument { symbol } => {
                SubscriptionRequest::instrument_info(exchange, symbol, format)
            }
            StreamKind::Positions { portfolio } => {
                SubscriptionRequest::positions(exchange, portfolio, format)
            }
            StreamKind::Summaries { portfolio } => {
                SubscriptionRequest::summaries(exchange, portfolio, format)
            }
            StreamKind::Risks { portfolio } => SubscriptionRequest::risks(exchange, portfolio, format),
            StreamKind::SpectraRisks { portfolio } => {
                SubscriptionRequest::spectra_risks(exchange, portfolio, format)
            }
            StreamKind::Trades {
                portfolio,
                skip_history,
            } => SubscriptionRequest::trades(exchange, portfolio, *skip_history, format),
            StreamKind::StopOrders { portfolio } => {
                SubscriptionRequest::stop_orders(exchange, portfolio, format)
            }
            StreamKind::StopOrdersV2 { portfolio } => {
                SubscriptionRequest::stop_orders_v2(exchange, portfolio, format)
            }
            StreamKind::Orders {
                portfolio,
                skip_history,
            } => SubscriptionRequest::orders(exchange, portfolio, *skip_history, format),
        };
        request.validate().map_err(|err| anyhow!(err))?;
        Ok(request)
    }
}

/// Parse "60", "D", "W" or "M" into a bar timeframe
pub fn parse_timeframe(raw: &str) -> Result<Timeframe> {
    match raw.trim() {
        "D" => Ok(Timeframe::Day),
        "W" => Ok(Timeframe::Week),
        "M" => Ok(Timeframe::Month),
        other => {
            let secs: u32 = other
                .parse()
                .with_context(|| format!("invalid timeframe: {raw}"))?;
            if secs == 0 {
                bail!("timeframe must be positive");
            }
            Ok(Timeframe::Seconds(secs))
        }
    }
}
