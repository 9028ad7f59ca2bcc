use serde::Serialize;

use crate::series::SymbolSeries;

/// Response for GET /slots/{slot}
#[derive(Serialize)]
pub struct SlotResponse {
    pub slot: usize,
    pub series: SymbolSeries,
}

/// Response for POST /slots/{slot}/toggle
#[derive(Serialize)]
pub struct ToggleResponse {
    pub slot: usize,
    pub running: bool,
}
