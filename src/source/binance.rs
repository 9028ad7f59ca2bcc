use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use super::{Candle, Market, MarketSource, TimedSample};
use crate::errors::SourceError;

const SPOT_BASE_URL: &str = "https://api.binance.com";
const FUTURES_BASE_URL: &str = "https://fapi.binance.com";

/// Candle interval requested for historical backfills.
const CANDLE_INTERVAL: &str = "1m";
/// Sampling period of the open interest history endpoint.
const OPEN_INTEREST_PERIOD: &str = "5m";
/// Row cap on every historical request.
const HISTORY_LIMIT: u32 = 240;

/// Price ticker shape shared by the spot and futures APIs.
#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
struct PremiumIndex {
    symbol: String,

    #[serde(rename = "lastFundingRate")]
    last_funding_rate: String,
}

#[derive(Debug, Deserialize)]
struct OpenInterest {
    #[serde(rename = "openInterest")]
    open_interest: String,
}

#[derive(Debug, Deserialize)]
struct FundingRateEvent {
    #[serde(rename = "fundingTime")]
    funding_time: i64,

    #[serde(rename = "fundingRate")]
    funding_rate: String,
}

#[derive(Debug, Deserialize)]
struct OpenInterestSample {
    timestamp: i64,

    #[serde(rename = "sumOpenInterest")]
    sum_open_interest: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    status: String,

    #[serde(rename = "contractType")]
    contract_type: String,
}

pub struct Binance {
    client: reqwest::Client,
}

impl Binance {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(SourceError::Http)?
            .error_for_status()
            .map_err(SourceError::Http)?
            .json::<T>()
            .await
            .map_err(SourceError::Http)?;

        Ok(response)
    }
}

impl Default for Binance {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_number(raw: &str, what: &str) -> Result<f64, SourceError> {
    raw.parse::<f64>()
        .map_err(|_| SourceError::UnexpectedData(format!("invalid {what}: {raw:?}")))
}

/// Start/end of the trailing window, epoch milliseconds.
fn window_bounds(window: Duration) -> (i64, i64) {
    let end = Utc::now().timestamp_millis();
    let start = end - window.as_millis() as i64;
    (start, end)
}

/// Maps raw kline rows into candles. Each row is a heterogeneous JSON
/// array; open time sits at index 0, close price at index 4.
fn parse_candles(rows: &[Value]) -> Result<Vec<Candle>, SourceError> {
    let mut candles = Vec::with_capacity(rows.len());

    for row in rows {
        let open_time_ms = row
            .get(0)
            .and_then(Value::as_i64)
            .ok_or_else(|| SourceError::UnexpectedData("kline missing open time".to_string()))?;

        let close = row
            .get(4)
            .and_then(Value::as_str)
            .ok_or_else(|| SourceError::UnexpectedData("kline missing close price".to_string()))
            .and_then(|s| parse_number(s, "kline close"))?;

        candles.push(Candle {
            open_time_ms,
            close,
        });
    }

    Ok(candles)
}

#[async_trait]
impl MarketSource for Binance {
    fn name(&self) -> &'static str {
        "binance"
    }

    /// Symbols from exchangeInfo that are live USDT-margined perpetuals.
    async fn list_perpetual_symbols(&self) -> Result<Vec<String>, SourceError> {
        let url = format!("{FUTURES_BASE_URL}/fapi/v1/exchangeInfo");
        let info: ExchangeInfo = self.get_json(&url).await?;

        let symbols = info
            .symbols
            .into_iter()
            .filter(|s| {
                s.symbol.ends_with("USDT")
                    && s.status == "TRADING"
                    && s.contract_type == "PERPETUAL"
            })
            .map(|s| s.symbol)
            .collect();

        Ok(symbols)
    }

    /// One premiumIndex call without a symbol returns the whole universe.
    /// Response order is preserved for the ranking tie-break.
    async fn current_funding_rates(&self) -> Result<Vec<(String, f64)>, SourceError> {
        let url = format!("{FUTURES_BASE_URL}/fapi/v1/premiumIndex");
        let entries: Vec<PremiumIndex> = self.get_json(&url).await?;

        let mut rates = Vec::with_capacity(entries.len());
        for entry in entries {
            if !entry.symbol.ends_with("USDT") {
                continue;
            }
            let rate = parse_number(&entry.last_funding_rate, "funding rate")?;
            rates.push((entry.symbol, rate));
        }

        Ok(rates)
    }

    async fn spot_price(&self, symbol: &str) -> Result<f64, SourceError> {
        let url = format!("{SPOT_BASE_URL}/api/v3/ticker/price?symbol={symbol}");
        let ticker: TickerPrice = self.get_json(&url).await?;
        parse_number(&ticker.price, "spot price")
    }

    async fn derivative_price(&self, symbol: &str) -> Result<f64, SourceError> {
        let url = format!("{FUTURES_BASE_URL}/fapi/v1/ticker/price?symbol={symbol}");
        let ticker: TickerPrice = self.get_json(&url).await?;
        parse_number(&ticker.price, "derivative price")
    }

    async fn funding_rate(&self, symbol: &str) -> Result<f64, SourceError> {
        let url = format!("{FUTURES_BASE_URL}/fapi/v1/premiumIndex?symbol={symbol}");
        let index: PremiumIndex = self.get_json(&url).await?;
        parse_number(&index.last_funding_rate, "funding rate")
    }

    async fn open_interest(&self, symbol: &str) -> Result<f64, SourceError> {
        let url = format!("{FUTURES_BASE_URL}/fapi/v1/openInterest?symbol={symbol}");
        let oi: OpenInterest = self.get_json(&url).await?;
        parse_number(&oi.open_interest, "open interest")
    }

    async fn historical_candles(
        &self,
        market: Market,
        symbol: &str,
        window: Duration,
    ) -> Result<Vec<Candle>, SourceError> {
        let (start, end) = window_bounds(window);
        let url = match market {
            Market::Spot => format!(
                "{SPOT_BASE_URL}/api/v3/klines?symbol={symbol}&interval={CANDLE_INTERVAL}\
                 &startTime={start}&endTime={end}&limit={HISTORY_LIMIT}"
            ),
            Market::Derivative => format!(
                "{FUTURES_BASE_URL}/fapi/v1/klines?symbol={symbol}&interval={CANDLE_INTERVAL}\
                 &startTime={start}&endTime={end}&limit={HISTORY_LIMIT}"
            ),
        };

        let rows: Vec<Value> = self.get_json(&url).await?;
        parse_candles(&rows)
    }

    async fn historical_funding_rates(
        &self,
        symbol: &str,
        window: Duration,
    ) -> Result<Vec<TimedSample>, SourceError> {
        let (start, end) = window_bounds(window);
        let url = format!(
            "{FUTURES_BASE_URL}/fapi/v1/fundingRate?symbol={symbol}\
             &startTime={start}&endTime={end}&limit={HISTORY_LIMIT}"
        );

        let events: Vec<FundingRateEvent> = self.get_json(&url).await?;

        events
            .into_iter()
            .map(|e| {
                Ok(TimedSample {
                    timestamp_ms: e.funding_time,
                    value: parse_number(&e.funding_rate, "historical funding rate")?,
                })
            })
            .collect()
    }

    async fn historical_open_interest(
        &self,
        symbol: &str,
        window: Duration,
    ) -> Result<Vec<TimedSample>, SourceError> {
        let (start, end) = window_bounds(window);
        let url = format!(
            "{FUTURES_BASE_URL}/futures/data/openInterestHist?symbol={symbol}\
             &period={OPEN_INTEREST_PERIOD}&startTime={start}&endTime={end}&limit={HISTORY_LIMIT}"
        );

        let samples: Vec<OpenInterestSample> = self.get_json(&url).await?;

        samples
            .into_iter()
            .map(|s| {
                Ok(TimedSample {
                    timestamp_ms: s.timestamp,
                    value: parse_number(&s.sum_open_interest, "historical open interest")?,
                })
            })
            .collect()
    }
}
