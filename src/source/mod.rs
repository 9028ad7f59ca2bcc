use std::time::Duration;

use async_trait::async_trait;

use crate::errors::SourceError;

pub mod binance;

pub use binance::Binance;

/// Which side of the exchange a candle series comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Market {
    Spot,
    Derivative,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub open_time_ms: i64,
    pub close: f64,
}

/// One timestamped value from an irregularly sampled historical series
/// (funding rate events, open interest snapshots).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedSample {
    pub timestamp_ms: i64,
    pub value: f64,
}

/// Read-only view of one exchange. Every method either returns a complete
/// typed value or an error; callers that can degrade treat any error as
/// "unavailable" without inspecting it. Timeouts are this layer's problem.
#[async_trait]
pub trait MarketSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// All tradable perpetual-contract symbols.
    async fn list_perpetual_symbols(&self) -> Result<Vec<String>, SourceError>;

    /// Current funding rate for every perpetual symbol, one batch call.
    /// Order of the returned pairs is the exchange's response order and is
    /// load-bearing for ranking tie-breaks.
    async fn current_funding_rates(&self) -> Result<Vec<(String, f64)>, SourceError>;

    async fn spot_price(&self, symbol: &str) -> Result<f64, SourceError>;

    async fn derivative_price(&self, symbol: &str) -> Result<f64, SourceError>;

    /// Raw fractional funding rate (e.g. 0.0001), not a percentage.
    async fn funding_rate(&self, symbol: &str) -> Result<f64, SourceError>;

    async fn open_interest(&self, symbol: &str) -> Result<f64, SourceError>;

    /// Close-price candles for the trailing `window`, oldest first.
    async fn historical_candles(
        &self,
        market: Market,
        symbol: &str,
        window: Duration,
    ) -> Result<Vec<Candle>, SourceError>;

    /// Funding rate settlement events for the trailing `window`, raw
    /// fractional rates, oldest first.
    async fn historical_funding_rates(
        &self,
        symbol: &str,
        window: Duration,
    ) -> Result<Vec<TimedSample>, SourceError>;

    /// Open interest samples for the trailing `window`, oldest first.
    async fn historical_open_interest(
        &self,
        symbol: &str,
        window: Duration,
    ) -> Result<Vec<TimedSample>, SourceError>;
}
