pub mod handlers;
pub mod models;
pub mod router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::ranking::RankingEngine;
use crate::series::SeriesEngine;
use crate::source::MarketSource;

/// Shared handler state: both engines and the raw source behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub series: Arc<SeriesEngine>,
    pub rankings: Arc<RankingEngine>,
    pub source: Arc<dyn MarketSource>,
}

pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    pub fn new(
        series: Arc<SeriesEngine>,
        rankings: Arc<RankingEngine>,
        source: Arc<dyn MarketSource>,
    ) -> Self {
        Self {
            state: AppState {
                series,
                rankings,
                source,
            },
        }
    }

    /// Binds the server to the given port and serves until the process
    /// shuts down.
    pub async fn run(self, port: u16) -> anyhow::Result<()> {
        let app = router::build(self.state);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("API server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
