use serde::{Deserialize, Serialize};

/// One synchronized sample for a symbol. Premium is computed at alignment
/// time from the two prices, never fetched on its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlignedPoint {
    pub timestamp_ms: i64,
    pub spot_price: f64,
    pub derivative_price: f64,
    pub premium_pct: f64,
    pub funding_rate_pct: f64,
    pub open_interest: f64,
}

/// The freshly computed values one successful tick hands back to the
/// caller, independent of what got stored in the series.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LivePoint {
    pub spot_price: f64,
    pub derivative_price: f64,
    pub premium_pct: f64,
    pub funding_rate_pct: f64,
    pub open_interest: f64,
}

/// Percentage by which the derivative trades above (positive) or below
/// (negative) spot.
pub fn premium_pct(spot: f64, derivative: f64) -> f64 {
    (derivative - spot) / spot * 100.0
}

/// Point-in-time capture of every symbol's funding rate, in the order the
/// exchange returned them. Immutable once taken.
#[derive(Debug, Clone)]
pub struct FundingSnapshot {
    pub timestamp_ms: i64,
    pub rates: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateEntry {
    pub symbol: String,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEntry {
    pub symbol: String,
    pub change: f64,
}

/// Derived ranking tables for one snapshot cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RankingResult {
    pub timestamp_ms: i64,
    pub highest: Vec<RateEntry>,
    pub lowest: Vec<RateEntry>,
    pub increases: Vec<ChangeEntry>,
    pub decreases: Vec<ChangeEntry>,
}

/// What survives a restart: the last snapshot's rate map, used only as the
/// "previous" baseline for change ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedRates {
    pub timestamp_ms: i64,
    pub rates: std::collections::HashMap<String, f64>,
}
