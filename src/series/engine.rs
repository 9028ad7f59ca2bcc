use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::errors::{EngineError, SourceError};
use crate::models::{AlignedPoint, LivePoint, premium_pct};
use crate::series::{SymbolSeries, nearest_sample};
use crate::source::{Market, MarketSource, TimedSample};

/// Per-slot series engine. Slots are fixed at construction; each one holds
/// an independently mutable `SymbolSeries` behind its own lock, so
/// operations on different slots never contend while operations on the
/// same slot (backfill, tick, toggle) are serialized.
pub struct SeriesEngine {
    source: Arc<dyn MarketSource>,
    window: Duration,
    slots: DashMap<usize, Arc<Mutex<SymbolSeries>>>,
}

impl SeriesEngine {
    pub fn new(source: Arc<dyn MarketSource>, window: Duration, symbols: &[String]) -> Self {
        let slots = DashMap::new();
        for (slot, symbol) in symbols.iter().enumerate() {
            slots.insert(slot, Arc::new(Mutex::new(SymbolSeries::new(symbol))));
        }

        Self {
            source,
            window,
            slots,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn cell(&self, slot: usize) -> Result<Arc<Mutex<SymbolSeries>>, EngineError> {
        self.slots
            .get(&slot)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(EngineError::UnknownSlot(slot))
    }

    /// Points the slot at a new symbol. Whatever was accumulated for the
    /// old symbol is discarded wholesale; the slot comes back stopped and
    /// unloaded.
    pub async fn select_symbol(&self, slot: usize, symbol: &str) -> Result<(), EngineError> {
        let cell = self.cell(slot)?;
        let mut series = cell.lock().await;
        *series = SymbolSeries::new(symbol);
        tracing::info!("slot {slot} now monitoring {symbol}");
        Ok(())
    }

    /// Flips the slot's running state. The first start triggers a
    /// historical backfill; a failed backfill leaves the slot stopped and
    /// surfaces the error. Stopping never discards accumulated data.
    pub async fn toggle_running(&self, slot: usize) -> Result<bool, EngineError> {
        let cell = self.cell(slot)?;
        let mut series = cell.lock().await;

        series.is_running = !series.is_running;

        if series.is_running && !series.historical_loaded {
            if let Err(source) = self.backfill(&mut series).await {
                series.is_running = false;
                return Err(EngineError::Backfill {
                    symbol: series.symbol.clone(),
                    source,
                });
            }
        }

        Ok(series.is_running)
    }

    /// Seeds the series from the trailing window of history. Spot and
    /// derivative candles are paired by ordinal index (both are sampled on
    /// the same requested interval and bounds); funding rate and open
    /// interest are resolved per candle by nearest-timestamp lookup, or
    /// zero-filled when their series is unobtainable. Either candle fetch
    /// failing fails the whole backfill.
    async fn backfill(&self, series: &mut SymbolSeries) -> Result<(), SourceError> {
        let symbol = series.symbol.clone();

        let (spot, derivative, funding, open_interest) = tokio::join!(
            self.source
                .historical_candles(Market::Spot, &symbol, self.window),
            self.source
                .historical_candles(Market::Derivative, &symbol, self.window),
            self.source.historical_funding_rates(&symbol, self.window),
            self.source.historical_open_interest(&symbol, self.window),
        );

        let spot = spot?;
        let derivative = derivative?;
        let funding = optional_samples(funding);
        let open_interest = optional_samples(open_interest);

        let count = spot.len().min(derivative.len());
        let mut points = Vec::with_capacity(count);

        for i in 0..count {
            let ts = spot[i].open_time_ms;

            // Exchange funding rates are fractional; series points carry
            // percentages to match the premium convention.
            let funding_rate_pct = funding
                .as_deref()
                .and_then(|samples| nearest_sample(samples, ts))
                .map(|rate| rate * 100.0)
                .unwrap_or(0.0);

            let oi = open_interest
                .as_deref()
                .and_then(|samples| nearest_sample(samples, ts))
                .unwrap_or(0.0);

            points.push(AlignedPoint {
                timestamp_ms: ts,
                spot_price: spot[i].close,
                derivative_price: derivative[i].close,
                premium_pct: premium_pct(spot[i].close, derivative[i].close),
                funding_rate_pct,
                open_interest: oi,
            });
        }

        series.points = points;
        if let Ok(rate) = self.source.funding_rate(&symbol).await {
            series.last_funding_rate = Some(rate);
        }
        series.historical_loaded = true;

        tracing::info!(
            "backfilled {symbol}: {} points over the trailing window",
            series.points.len()
        );
        Ok(())
    }

    /// One live extension of the slot's series. A stopped slot is a no-op.
    /// The four point-in-time reads run concurrently; a missing price
    /// skips the whole update, while a missing funding rate or open
    /// interest forward-fills from the previous point (zero with no
    /// history). Appending always re-enforces the retention window.
    pub async fn tick(&self, slot: usize) -> Result<Option<LivePoint>, EngineError> {
        let cell = self.cell(slot)?;
        let mut series = cell.lock().await;

        if !series.is_running {
            return Ok(None);
        }

        let symbol = series.symbol.clone();
        let (spot, derivative, funding, open_interest) = tokio::join!(
            self.source.spot_price(&symbol),
            self.source.derivative_price(&symbol),
            self.source.funding_rate(&symbol),
            self.source.open_interest(&symbol),
        );

        // Both prices are load-bearing for the premium; without them there
        // is nothing worth appending.
        let (Ok(spot), Ok(derivative)) = (spot, derivative) else {
            tracing::debug!("skipping {symbol} update: price unavailable");
            return Ok(None);
        };

        let funding = funding.ok();
        let funding_rate_pct = funding
            .map(|rate| rate * 100.0)
            .or_else(|| series.last_point().map(|p| p.funding_rate_pct))
            .unwrap_or(0.0);

        let oi = open_interest
            .ok()
            .or_else(|| series.last_point().map(|p| p.open_interest))
            .unwrap_or(0.0);

        let now_ms = Utc::now().timestamp_millis();
        let point = AlignedPoint {
            timestamp_ms: now_ms,
            spot_price: spot,
            derivative_price: derivative,
            premium_pct: premium_pct(spot, derivative),
            funding_rate_pct,
            open_interest: oi,
        };

        series.points.push(point);
        if let Some(rate) = funding {
            series.last_funding_rate = Some(rate);
        }
        series.trim_before(now_ms - self.window.as_millis() as i64);

        Ok(Some(LivePoint {
            spot_price: point.spot_price,
            derivative_price: point.derivative_price,
            premium_pct: point.premium_pct,
            funding_rate_pct: point.funding_rate_pct,
            open_interest: point.open_interest,
        }))
    }

    pub async fn series(&self, slot: usize) -> Result<SymbolSeries, EngineError> {
        let cell = self.cell(slot)?;
        let series = cell.lock().await;
        Ok(series.clone())
    }
}

/// A failed or empty historical series degrades to `None`; the caller
/// zero-fills instead of aborting.
fn optional_samples(result: Result<Vec<TimedSample>, SourceError>) -> Option<Vec<(i64, f64)>> {
    let samples = result.ok()?;
    if samples.is_empty() {
        return None;
    }
    Some(
        samples
            .into_iter()
            .map(|s| (s.timestamp_ms, s.value))
            .collect(),
    )
}
