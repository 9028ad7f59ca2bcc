use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

/// Builds the full Axum router with all routes and shared state.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/slots/{slot}", get(handlers::get_slot))
        .route("/slots/{slot}/symbol/{symbol}", post(handlers::select_symbol))
        .route("/slots/{slot}/toggle", post(handlers::toggle_slot))
        .route("/rankings", get(handlers::get_rankings))
        .route("/symbols", get(handlers::get_symbols))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
