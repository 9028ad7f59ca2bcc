use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// One monitored slot per symbol, in order.
    pub symbols: Vec<String>,
    /// Retention window for each symbol series.
    pub window: Duration,
    /// Cadence of live series extension.
    pub tick_interval: Duration,
    /// Cadence of funding-rate ranking refreshes.
    pub ranking_interval: Duration,
    pub data_dir: PathBuf,
    pub api_port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        // default to BTCUSDT and ETHUSDT if SYMBOLS is not set
        let symbols = env::var("SYMBOLS")
            .unwrap_or_else(|_| "BTCUSDT,ETHUSDT".to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        let window_hours = env::var("WINDOW_HOURS")
            .unwrap_or_else(|_| "4".to_string())
            .parse::<u64>()
            .expect("WINDOW_HOURS must be a whole number of hours");

        let tick_secs = env::var("TICK_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .expect("TICK_SECS must be a whole number of seconds");

        let ranking_secs = env::var("RANKING_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .expect("RANKING_SECS must be a whole number of seconds");

        let data_dir = env::var("DATA_DIR")
            .unwrap_or_else(|_| "data".to_string())
            .into();

        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .expect("API_PORT must be a valid port number (1-65535)");

        Self {
            symbols,
            window: Duration::from_secs(window_hours * 60 * 60),
            tick_interval: Duration::from_secs(tick_secs),
            ranking_interval: Duration::from_secs(ranking_secs),
            data_dir,
            api_port,
        }
    }
}
