use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::errors::EngineError;
use crate::models::{ChangeEntry, FundingSnapshot, PersistedRates, RankingResult, RateEntry};
use crate::source::MarketSource;
use crate::storage::{PREVIOUS_RATES_KEY, SnapshotStore};

/// Table depth for every ranking list.
const TOP_N: usize = 5;

struct RankState {
    /// Rate map of the previous successful snapshot; comparison baseline
    /// for change ranking. `None` until one cycle has completed (or a
    /// persisted baseline was recovered at startup).
    previous: Option<HashMap<String, f64>>,
    latest: Option<RankingResult>,
}

/// Owns the full-universe funding-rate snapshot cycle: fetch, rank against
/// the previous snapshot, persist the new baseline.
pub struct RankingEngine {
    source: Arc<dyn MarketSource>,
    store: Arc<dyn SnapshotStore>,
    state: Mutex<RankState>,
}

impl RankingEngine {
    /// Recovers the persisted baseline, if any, so the first refresh after
    /// a restart can already rank changes.
    pub fn new(source: Arc<dyn MarketSource>, store: Arc<dyn SnapshotStore>) -> Self {
        let previous = store.get(PREVIOUS_RATES_KEY).map(|p| {
            tracing::info!("recovered previous funding snapshot ({} symbols)", p.rates.len());
            p.rates
        });

        Self {
            source,
            store,
            state: Mutex::new(RankState {
                previous,
                latest: None,
            }),
        }
    }

    /// One full snapshot-and-rank cycle. An empty or unreachable batch
    /// skips the cycle: the prior result and baseline stay untouched.
    pub async fn refresh(&self) -> Result<RankingResult, EngineError> {
        let rates = self.source.current_funding_rates().await?;
        if rates.is_empty() {
            return Err(EngineError::EmptySnapshot);
        }

        let snapshot = FundingSnapshot {
            timestamp_ms: Utc::now().timestamp_millis(),
            rates,
        };

        let mut state = self.state.lock().await;
        let result = rank(&snapshot, state.previous.as_ref());

        let current_map: HashMap<String, f64> = snapshot.rates.iter().cloned().collect();
        if let Err(e) = self.store.put(
            PREVIOUS_RATES_KEY,
            &PersistedRates {
                timestamp_ms: snapshot.timestamp_ms,
                rates: current_map.clone(),
            },
        ) {
            // Persistence only matters across restarts; ranking goes on.
            tracing::warn!("failed to persist funding snapshot: {e}");
        }

        state.previous = Some(current_map);
        state.latest = Some(result.clone());

        Ok(result)
    }

    pub async fn latest(&self) -> Option<RankingResult> {
        self.state.lock().await.latest.clone()
    }
}

/// Derives the four ranking tables from one snapshot. With no previous
/// baseline the change tables stay empty; a synthetic zero baseline would
/// rank every symbol as a mover.
fn rank(snapshot: &FundingSnapshot, previous: Option<&HashMap<String, f64>>) -> RankingResult {
    let (increases, decreases) = match previous {
        Some(previous) => (
            rate_changes(&snapshot.rates, previous, true),
            rate_changes(&snapshot.rates, previous, false),
        ),
        None => (Vec::new(), Vec::new()),
    };

    RankingResult {
        timestamp_ms: snapshot.timestamp_ms,
        highest: top_rates(&snapshot.rates, true),
        lowest: top_rates(&snapshot.rates, false),
        increases,
        decreases,
    }
}

/// Top entries by rate. Stable sort over the batch-ordered pairs, so equal
/// rates keep the exchange's original ordering.
fn top_rates(rates: &[(String, f64)], descending: bool) -> Vec<RateEntry> {
    let mut sorted = rates.to_vec();
    if descending {
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    } else {
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));
    }

    sorted
        .into_iter()
        .take(TOP_N)
        .map(|(symbol, rate)| RateEntry { symbol, rate })
        .collect()
}

/// Largest period-over-period moves in one direction. Only symbols present
/// in both snapshots qualify; a symbol new to (or gone from) the universe
/// is not a change from zero.
fn rate_changes(
    current: &[(String, f64)],
    previous: &HashMap<String, f64>,
    increasing: bool,
) -> Vec<ChangeEntry> {
    let mut changes: Vec<ChangeEntry> = current
        .iter()
        .filter_map(|(symbol, rate)| {
            let prior = previous.get(symbol)?;
            let change = rate - prior;
            let qualifies = if increasing { change > 0.0 } else { change < 0.0 };
            qualifies.then(|| ChangeEntry {
                symbol: symbol.clone(),
                change,
            })
        })
        .collect();

    if increasing {
        changes.sort_by(|a, b| b.change.total_cmp(&a.change));
    } else {
        changes.sort_by(|a, b| a.change.total_cmp(&b.change));
    }

    changes.truncate(TOP_N);
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceError;
    use crate::source::{Candle, Market, TimedSample};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::time::Duration;

    fn pairs(entries: &[(&str, f64)]) -> Vec<(String, f64)> {
        entries
            .iter()
            .map(|(s, r)| (s.to_string(), *r))
            .collect()
    }

    fn snapshot(entries: &[(&str, f64)]) -> FundingSnapshot {
        FundingSnapshot {
            timestamp_ms: 1_700_000_000_000,
            rates: pairs(entries),
        }
    }

    fn symbols(entries: &[RateEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.symbol.as_str()).collect()
    }

    #[test]
    fn highest_and_lowest_sort_by_rate() {
        let snap = snapshot(&[("A", 0.01), ("B", -0.02), ("C", 0.005)]);
        let result = rank(&snap, None);

        assert_eq!(symbols(&result.highest[..2]), vec!["A", "C"]);
        assert_eq!(symbols(&result.lowest[..2]), vec!["B", "C"]);
    }

    #[test]
    fn tables_cap_at_five_entries() {
        let snap = snapshot(&[
            ("A", 0.01),
            ("B", 0.02),
            ("C", 0.03),
            ("D", 0.04),
            ("E", 0.05),
            ("F", 0.06),
            ("G", 0.07),
        ]);
        let result = rank(&snap, None);

        assert_eq!(result.highest.len(), 5);
        assert_eq!(symbols(&result.highest), vec!["G", "F", "E", "D", "C"]);
    }

    #[test]
    fn equal_rates_keep_batch_order() {
        let snap = snapshot(&[("B", 0.01), ("A", 0.01), ("C", 0.01)]);
        let result = rank(&snap, None);

        assert_eq!(symbols(&result.highest), vec!["B", "A", "C"]);
    }

    #[test]
    fn small_universe_yields_short_tables() {
        let snap = snapshot(&[("A", 0.01), ("B", 0.02)]);
        let result = rank(&snap, None);

        assert_eq!(result.highest.len(), 2);
        assert_eq!(result.lowest.len(), 2);
    }

    #[test]
    fn no_previous_snapshot_means_no_change_tables() {
        let snap = snapshot(&[("A", 0.05), ("B", -0.05)]);
        let result = rank(&snap, None);

        assert!(result.increases.is_empty());
        assert!(result.decreases.is_empty());
    }

    #[test]
    fn changes_only_rank_symbols_present_in_both_snapshots() {
        let previous: HashMap<String, f64> =
            [("A".to_string(), 0.01), ("B".to_string(), 0.02)].into();
        let snap = snapshot(&[("A", 0.03), ("B", 0.01), ("C", 0.05)]);

        let result = rank(&snap, Some(&previous));

        assert_eq!(result.increases.len(), 1);
        assert_eq!(result.increases[0].symbol, "A");
        assert!((result.increases[0].change - 0.02).abs() < 1e-12);

        assert_eq!(result.decreases.len(), 1);
        assert_eq!(result.decreases[0].symbol, "B");
        assert!((result.decreases[0].change + 0.01).abs() < 1e-12);
    }

    #[test]
    fn unchanged_symbols_appear_in_neither_change_table() {
        let previous: HashMap<String, f64> = [("A".to_string(), 0.01)].into();
        let snap = snapshot(&[("A", 0.01)]);

        let result = rank(&snap, Some(&previous));

        assert!(result.increases.is_empty());
        assert!(result.decreases.is_empty());
    }

    #[test]
    fn decreases_sort_most_negative_first() {
        let previous: HashMap<String, f64> = [
            ("A".to_string(), 0.05),
            ("B".to_string(), 0.05),
            ("C".to_string(), 0.05),
        ]
        .into();
        let snap = snapshot(&[("A", 0.04), ("B", 0.01), ("C", 0.03)]);

        let result = rank(&snap, Some(&previous));

        let order: Vec<&str> = result.decreases.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(order, vec!["B", "C", "A"]);
    }

    /// Source stub whose batch response is settable between refreshes.
    struct StubSource {
        rates: std::sync::Mutex<Vec<(String, f64)>>,
    }

    impl StubSource {
        fn new(entries: &[(&str, f64)]) -> Self {
            Self {
                rates: std::sync::Mutex::new(pairs(entries)),
            }
        }

        fn set(&self, entries: &[(&str, f64)]) {
            *self.rates.lock().unwrap() = pairs(entries);
        }
    }

    #[async_trait]
    impl MarketSource for StubSource {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn list_perpetual_symbols(&self) -> Result<Vec<String>, SourceError> {
            Ok(self
                .rates
                .lock()
                .unwrap()
                .iter()
                .map(|(s, _)| s.clone())
                .collect())
        }

        async fn current_funding_rates(&self) -> Result<Vec<(String, f64)>, SourceError> {
            Ok(self.rates.lock().unwrap().clone())
        }

        async fn spot_price(&self, _symbol: &str) -> Result<f64, SourceError> {
            Err(SourceError::UnexpectedData("not wired".to_string()))
        }

        async fn derivative_price(&self, _symbol: &str) -> Result<f64, SourceError> {
            Err(SourceError::UnexpectedData("not wired".to_string()))
        }

        async fn funding_rate(&self, _symbol: &str) -> Result<f64, SourceError> {
            Err(SourceError::UnexpectedData("not wired".to_string()))
        }

        async fn open_interest(&self, _symbol: &str) -> Result<f64, SourceError> {
            Err(SourceError::UnexpectedData("not wired".to_string()))
        }

        async fn historical_candles(
            &self,
            _market: Market,
            _symbol: &str,
            _window: Duration,
        ) -> Result<Vec<Candle>, SourceError> {
            Err(SourceError::UnexpectedData("not wired".to_string()))
        }

        async fn historical_funding_rates(
            &self,
            _symbol: &str,
            _window: Duration,
        ) -> Result<Vec<TimedSample>, SourceError> {
            Err(SourceError::UnexpectedData("not wired".to_string()))
        }

        async fn historical_open_interest(
            &self,
            _symbol: &str,
            _window: Duration,
        ) -> Result<Vec<TimedSample>, SourceError> {
            Err(SourceError::UnexpectedData("not wired".to_string()))
        }
    }

    #[tokio::test]
    async fn first_refresh_has_empty_change_tables() {
        let source = Arc::new(StubSource::new(&[("A", 0.01), ("B", 0.02)]));
        let engine = RankingEngine::new(source, Arc::new(MemoryStore::new()));

        let result = engine.refresh().await.unwrap();

        assert_eq!(result.highest.len(), 2);
        assert!(result.increases.is_empty());
        assert!(result.decreases.is_empty());
    }

    #[tokio::test]
    async fn second_refresh_ranks_changes_against_the_first() {
        let source = Arc::new(StubSource::new(&[("A", 0.01), ("B", 0.02)]));
        let engine = RankingEngine::new(source.clone(), Arc::new(MemoryStore::new()));

        engine.refresh().await.unwrap();
        source.set(&[("A", 0.03), ("B", 0.01), ("C", 0.05)]);
        let result = engine.refresh().await.unwrap();

        assert_eq!(result.increases.len(), 1);
        assert_eq!(result.increases[0].symbol, "A");
        assert_eq!(result.decreases.len(), 1);
        assert_eq!(result.decreases[0].symbol, "B");
    }

    #[tokio::test]
    async fn baseline_survives_an_engine_restart_via_the_store() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StubSource::new(&[("A", 0.01)]));

        let engine = RankingEngine::new(source.clone(), store.clone());
        engine.refresh().await.unwrap();
        drop(engine);

        source.set(&[("A", 0.02)]);
        let restarted = RankingEngine::new(source, store);
        let result = restarted.refresh().await.unwrap();

        assert_eq!(result.increases.len(), 1);
        assert_eq!(result.increases[0].symbol, "A");
    }

    #[tokio::test]
    async fn empty_batch_skips_the_cycle_and_keeps_prior_result() {
        let source = Arc::new(StubSource::new(&[("A", 0.01)]));
        let engine = RankingEngine::new(source.clone(), Arc::new(MemoryStore::new()));

        engine.refresh().await.unwrap();
        source.set(&[]);

        assert!(matches!(
            engine.refresh().await,
            Err(EngineError::EmptySnapshot)
        ));
        assert!(engine.latest().await.is_some());
    }
}
