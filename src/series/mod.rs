pub mod engine;

use serde::Serialize;

use crate::models::AlignedPoint;

pub use engine::SeriesEngine;

/// Aligned, bounded time series for one monitored symbol.
///
/// Timestamps are strictly increasing and the span never exceeds the
/// retention window once historical data is loaded; the window is enforced
/// by trimming from the head only.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolSeries {
    pub symbol: String,
    pub points: Vec<AlignedPoint>,
    /// Raw (fractional) funding rate from the most recent successful read.
    /// Tracked independently of the series, so it may be fresher.
    pub last_funding_rate: Option<f64>,
    pub is_running: bool,
    pub historical_loaded: bool,
}

impl SymbolSeries {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            points: Vec::new(),
            last_funding_rate: None,
            is_running: false,
            historical_loaded: false,
        }
    }

    pub fn last_point(&self) -> Option<&AlignedPoint> {
        self.points.last()
    }

    /// Drops every point older than `cutoff_ms`, keeping order intact.
    /// If every stored point has expired, only the newest one survives.
    pub fn trim_before(&mut self, cutoff_ms: i64) {
        if self.points.len() < 2 {
            return;
        }
        if self.points[0].timestamp_ms >= cutoff_ms {
            return;
        }

        match self.points.iter().position(|p| p.timestamp_ms >= cutoff_ms) {
            Some(first_valid) => {
                self.points.drain(..first_valid);
            }
            None => {
                // Pathological: everything expired. Keep the freshest point
                // so the series degrades to length one instead of zero.
                let last = self.points.len() - 1;
                self.points.drain(..last);
            }
        }
    }
}

/// Value of the sample whose timestamp is nearest to `ts_ms`.
///
/// Left-to-right scan, strictly-smaller difference wins, so an exact
/// midpoint tie resolves to the earlier sample. `None` for an empty series.
pub fn nearest_sample(samples: &[(i64, f64)], ts_ms: i64) -> Option<f64> {
    let mut best: Option<(i64, f64)> = None;

    for &(t, value) in samples {
        let diff = (ts_ms - t).abs();
        match best {
            Some((best_diff, _)) if diff >= best_diff => {}
            _ => best = Some((diff, value)),
        }
    }

    best.map(|(_, value)| value)
}
