mod api;
mod config;
mod errors;
mod models;
mod ranking;
mod series;
mod source;
mod storage;

use std::sync::Arc;

use api::ApiServer;
use config::Config;
use ranking::RankingEngine;
use series::SeriesEngine;
use source::{Binance, MarketSource};
use storage::{FileStore, SnapshotStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();

    let source: Arc<dyn MarketSource> = Arc::new(Binance::new());

    tracing::info!(
        "Fundwatch starting — [{}] monitoring {:?} over a {:?} window on port {}",
        source.name(),
        config.symbols,
        config.window,
        config.api_port
    );

    let store: Arc<dyn SnapshotStore> = Arc::new(FileStore::new(&config.data_dir));

    let series = Arc::new(SeriesEngine::new(
        Arc::clone(&source),
        config.window,
        &config.symbols,
    ));
    let rankings = Arc::new(RankingEngine::new(Arc::clone(&source), store));

    // ── 1. Start every configured slot (backfills the window) ──────
    for slot in 0..series.slot_count() {
        match series.toggle_running(slot).await {
            Ok(_) => {}
            Err(e) => tracing::error!("slot {slot} stays stopped: {e}"),
        }
    }

    // ── 2. One tick loop per slot ──────────────────────────────────
    for slot in 0..series.slot_count() {
        let series = Arc::clone(&series);
        let period = config.tick_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match series.tick(slot).await {
                    Ok(Some(live)) => tracing::debug!(
                        "slot {slot}: spot={:.2} deriv={:.2} premium={:.4}% funding={:.4}% oi={:.0}",
                        live.spot_price,
                        live.derivative_price,
                        live.premium_pct,
                        live.funding_rate_pct,
                        live.open_interest
                    ),
                    Ok(None) => {}
                    Err(e) => tracing::error!("slot {slot} tick failed: {e}"),
                }
            }
        });
    }

    // ── 3. Ranking refresh loop ────────────────────────────────────
    {
        let rankings = Arc::clone(&rankings);
        let period = config.ranking_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match rankings.refresh().await {
                    Ok(result) => {
                        tracing::info!("=== TOP FUNDING RATES ===");
                        for entry in &result.highest {
                            tracing::info!("{}: {:.4}%", entry.symbol, entry.rate * 100.0);
                        }
                    }
                    // prior tables stay visible; just skip this cycle
                    Err(e) => tracing::error!("ranking refresh skipped: {e}"),
                }
            }
        });
    }

    // ── 4. HTTP API ────────────────────────────────────────────────
    let api = ApiServer::new(
        Arc::clone(&series),
        Arc::clone(&rankings),
        Arc::clone(&source),
    );
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api.run(api_port).await {
            tracing::error!("API server failed: {e}");
        }
    });

    // ── 5. Keep main alive until Ctrl+C ───────────────────────────
    tokio::signal::ctrl_c().await.unwrap();
    tracing::info!("Shutting down...");
}
