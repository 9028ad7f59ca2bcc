use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unexpected data from exchange: {0}")]
    UnexpectedData(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to load historical data for {symbol}: {source}")]
    Backfill {
        symbol: String,
        source: SourceError,
    },

    #[error("Funding rate snapshot unreachable: {0}")]
    Snapshot(#[from] SourceError),

    #[error("Funding rate snapshot was empty")]
    EmptySnapshot,

    #[error("No such slot: {0}")]
    UnknownSlot(usize),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
