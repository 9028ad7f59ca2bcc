use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::AppState;
use super::models::{SlotResponse, ToggleResponse};
use crate::errors::EngineError;
use crate::models::RankingResult;

/// GET /health — simple liveness check
pub async fn health() -> &'static str {
    "OK"
}

/// GET /slots/{slot} — current series for one monitored slot
pub async fn get_slot(
    State(state): State<AppState>,
    Path(slot): Path<usize>,
) -> Result<Json<SlotResponse>, StatusCode> {
    let series = state
        .series
        .series(slot)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;

    Ok(Json(SlotResponse { slot, series }))
}

/// POST /slots/{slot}/symbol/{symbol} — point a slot at a new symbol,
/// discarding whatever it accumulated for the old one
pub async fn select_symbol(
    State(state): State<AppState>,
    Path((slot, symbol)): Path<(usize, String)>,
) -> Result<Json<SlotResponse>, StatusCode> {
    let symbol = symbol.to_uppercase();
    state
        .series
        .select_symbol(slot, &symbol)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;

    let series = state
        .series
        .series(slot)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;

    Ok(Json(SlotResponse { slot, series }))
}

/// POST /slots/{slot}/toggle — start or stop live monitoring; the first
/// start backfills the trailing window
pub async fn toggle_slot(
    State(state): State<AppState>,
    Path(slot): Path<usize>,
) -> Result<Json<ToggleResponse>, (StatusCode, String)> {
    match state.series.toggle_running(slot).await {
        Ok(running) => Ok(Json(ToggleResponse { slot, running })),
        Err(EngineError::UnknownSlot(_)) => {
            Err((StatusCode::NOT_FOUND, format!("no such slot: {slot}")))
        }
        Err(e) => Err((StatusCode::BAD_GATEWAY, e.to_string())),
    }
}

/// GET /symbols — every tradable perpetual symbol (for symbol pickers)
pub async fn get_symbols(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, StatusCode> {
    state
        .source
        .list_perpetual_symbols()
        .await
        .map(Json)
        .map_err(|_| StatusCode::BAD_GATEWAY)
}

/// GET /rankings — latest funding-rate ranking tables
pub async fn get_rankings(
    State(state): State<AppState>,
) -> Result<Json<RankingResult>, StatusCode> {
    state
        .rankings
        .latest()
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
