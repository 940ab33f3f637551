/// Dashboard configuration
///
/// Read from environment variables with sensible defaults; builder methods
/// allow overrides (tests use them to shorten delays).

use crate::shared::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_SYMBOL: &str = "BTCUSDT";
pub const DEFAULT_CANDLE_LIMIT: u32 = 300;
pub const DEFAULT_ORDERS_LIMIT: u32 = 50;
pub const DEFAULT_TRADES_LIMIT: u32 = 50;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1500);

/// Limits accepted by the backend's query validation
const CANDLE_LIMIT_RANGE: (u32, u32) = (10, 1000);
const ROWS_LIMIT_RANGE: (u32, u32) = (1, 200);

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// REST base url, eg/ http://127.0.0.1:8000
    pub base_url: Url,
    /// Streaming url derived from `base_url` (`/ws`, ws or wss)
    pub ws_url: Url,
    /// Used when the symbol list is empty or unavailable
    pub default_symbol: String,
    pub candle_limit: u32,
    pub orders_limit: u32,
    pub trades_limit: u32,
    /// Fixed delay between a lost connection and the next attempt
    pub reconnect_delay: Duration,
    pub ping_interval: Duration,
    pub request_timeout: Duration,
    /// Capacity of the feed event channel
    pub channel_buffer_size: usize,
    pub log_file: PathBuf,
}

impl DashboardConfig {
    /// Create a configuration for the given backend with default settings
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidUrl {
            var: "DASHBOARD_URL",
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let ws_url = websocket_url(&base_url)?;

        Ok(Self {
            base_url,
            ws_url,
            default_symbol: DEFAULT_SYMBOL.to_string(),
            candle_limit: DEFAULT_CANDLE_LIMIT,
            orders_limit: DEFAULT_ORDERS_LIMIT,
            trades_limit: DEFAULT_TRADES_LIMIT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            ping_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            channel_buffer_size: 256,
            log_file: PathBuf::from("dashboard.log"),
        })
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("DASHBOARD_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(&base_url)?;

        if let Ok(symbol) = std::env::var("DASHBOARD_SYMBOL") {
            let symbol = symbol.trim().to_uppercase();
            if !symbol.is_empty() {
                config.default_symbol = symbol;
            }
        }
        if let Some(limit) = env_parse::<u32>("CANDLE_LIMIT") {
            config = config.with_candle_limit(limit);
        }
        if let Some(limit) = env_parse::<u32>("ORDERS_LIMIT") {
            config = config.with_orders_limit(limit);
        }
        if let Some(limit) = env_parse::<u32>("TRADES_LIMIT") {
            config = config.with_trades_limit(limit);
        }
        if let Some(ms) = env_parse::<u64>("RECONNECT_DELAY_MS") {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = env_parse::<u64>("PING_INTERVAL_SECS") {
            config.ping_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = env_parse::<u64>("REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }
        if let Ok(path) = std::env::var("DASHBOARD_LOG") {
            config.log_file = PathBuf::from(path);
        }

        Ok(config)
    }

    /// Set the candle window, clamped to what the backend accepts
    pub fn with_candle_limit(mut self, limit: u32) -> Self {
        self.candle_limit = limit.clamp(CANDLE_LIMIT_RANGE.0, CANDLE_LIMIT_RANGE.1);
        self
    }

    pub fn with_orders_limit(mut self, limit: u32) -> Self {
        self.orders_limit = limit.clamp(ROWS_LIMIT_RANGE.0, ROWS_LIMIT_RANGE.1);
        self
    }

    pub fn with_trades_limit(mut self, limit: u32) -> Self {
        self.trades_limit = limit.clamp(ROWS_LIMIT_RANGE.0, ROWS_LIMIT_RANGE.1);
        self
    }

    /// Set reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set ping interval
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_default_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.default_symbol = symbol.into();
        self
    }
}

/// Derive the streaming endpoint from the REST base: secure base, secure socket.
pub fn websocket_url(base_url: &Url) -> Result<Url, ConfigError> {
    let scheme = match base_url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    };

    let mut ws_url = base_url.clone();
    ws_url
        .set_scheme(scheme)
        .map_err(|_| ConfigError::UnsupportedScheme(base_url.scheme().to_string()))?;
    ws_url.set_path("/ws");
    ws_url.set_query(None);
    ws_url.set_fragment(None);
    Ok(ws_url)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.trim().parse().ok())
}
