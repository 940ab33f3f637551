//! REST read client and snapshot loader.
//!
//! Every read call returns `Result<T, FetchError>`; the loader degrades each
//! call on its own through [`OrDefault`], so a partial backend outage still
//! produces a complete (if sparse) first view.

use crate::shared::config::DashboardConfig;
use crate::shared::error::{FetchError, OrDefault};
use crate::shared::types::{Candle, Order, Position, Summary, Trade};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Thin typed wrapper over the backend's `/api/*` endpoints
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            timeout,
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(config.base_url.clone(), config.request_timeout)
    }

    /// `GET /api/symbols`
    pub async fn symbols(&self) -> Result<Vec<String>, FetchError> {
        self.get_json("/api/symbols", &[]).await
    }

    /// `GET /api/summary`
    pub async fn summary(&self) -> Result<Summary, FetchError> {
        self.get_json("/api/summary", &[]).await
    }

    /// `GET /api/candles?symbol=S&limit=N`, ascending by timestamp
    pub async fn candles(&self, symbol: &str, limit: u32) -> Result<Vec<Candle>, FetchError> {
        self.get_json(
            "/api/candles",
            &[("symbol", symbol.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    /// `GET /api/orders?limit=N`, most recent first
    pub async fn orders(&self, limit: u32) -> Result<Vec<Order>, FetchError> {
        self.get_json("/api/orders", &[("limit", limit.to_string())])
            .await
    }

    /// `GET /api/trades?limit=N`, most recent first
    pub async fn trades(&self, limit: u32) -> Result<Vec<Trade>, FetchError> {
        self.get_json("/api/trades", &[("limit", limit.to_string())])
            .await
    }

    /// `GET /api/positions`
    pub async fn positions(&self) -> Result<Vec<Position>, FetchError> {
        self.get_json("/api/positions", &[]).await
    }

    async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        debug!(%url, ?query, "GET");

        let response = self
            .http
            .get(url)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Result of the initial batch of reads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub symbols: Vec<String>,
    /// Symbol the candle window was fetched for
    pub symbol: String,
    pub summary: Summary,
    pub candles: Vec<Candle>,
    pub orders: Vec<Order>,
    pub trades: Vec<Trade>,
    pub positions: Vec<Position>,
}

/// Performs the boot-time batch of read calls
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    api: ApiClient,
    default_symbol: String,
    candle_limit: u32,
    orders_limit: u32,
    trades_limit: u32,
}

impl SnapshotLoader {
    pub fn new(api: ApiClient, config: &DashboardConfig) -> Self {
        Self {
            api,
            default_symbol: config.default_symbol.clone(),
            candle_limit: config.candle_limit,
            orders_limit: config.orders_limit,
            trades_limit: config.trades_limit,
        }
    }

    /// Symbol list, falling back to the single default symbol when the call
    /// fails or returns nothing.
    pub async fn load_symbols(&self) -> Vec<String> {
        let symbols = self.api.symbols().await.or_default_logged("symbols");
        if symbols.is_empty() {
            vec![self.default_symbol.clone()]
        } else {
            symbols
        }
    }

    /// Load every section. The candle window is fetched for `preferred` when it
    /// is a listed symbol, otherwise for the first listed symbol.
    ///
    /// The five section reads run concurrently and all of them settle before
    /// this returns; each failure degrades only its own section.
    pub async fn load(&self, preferred: Option<&str>) -> Snapshot {
        let symbols = self.load_symbols().await;
        let symbol = preferred
            .filter(|preferred| symbols.iter().any(|s| s.as_str() == *preferred))
            .unwrap_or(symbols[0].as_str())
            .to_string();

        let (summary, candles, orders, trades, positions) = tokio::join!(
            self.api.summary(),
            self.api.candles(&symbol, self.candle_limit),
            self.api.orders(self.orders_limit),
            self.api.trades(self.trades_limit),
            self.api.positions(),
        );

        let snapshot = Snapshot {
            summary: summary.or_default_logged("summary"),
            candles: candles.or_default_logged("candles"),
            orders: orders.or_default_logged("orders"),
            trades: trades.or_default_logged("trades"),
            positions: positions.or_default_logged("positions"),
            symbols,
            symbol,
        };

        info!(
            symbol = %snapshot.symbol,
            symbols = snapshot.symbols.len(),
            candles = snapshot.candles.len(),
            orders = snapshot.orders.len(),
            trades = snapshot.trades.len(),
            positions = snapshot.positions.len(),
            "snapshot loaded"
        );
        snapshot
    }

    /// Re-fetch only the chart window (used on symbol change)
    pub async fn load_candles(&self, symbol: &str) -> Result<Vec<Candle>, FetchError> {
        self.api.candles(symbol, self.candle_limit).await
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}
