//! View coordinator: root of the dashboard.
//!
//! Owns the current symbol, the latest copy of every section, the chart
//! projector and the connection manager. Snapshot data and live ticks are
//! applied through the same [`ViewCoordinator::render`] path.
//!
//! All mutation happens on the task that owns the coordinator; background
//! work (the feed connection, candle re-fetches) reports back through
//! channels and is applied in arrival order.

use crate::shared::api::{ApiClient, Snapshot, SnapshotLoader};
use crate::shared::chart::{ChartModel, ChartProjector};
use crate::shared::config::DashboardConfig;
use crate::shared::error::{FetchError, OrDefault};
use crate::shared::format::{kpi_panel, KpiPanel};
use crate::shared::types::{Candle, Order, Position, Summary, TickEnvelope, Trade};
use crate::shared::websocket::{ConnectionConfig, ConnectionManager, ConnectionStatus, FeedEvent};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Client-owned view state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub current_symbol: String,
    pub connection_status: ConnectionStatus,
    /// Message of the last server error envelope, cleared once live again
    pub last_server_error: Option<String>,
}

/// Latest instance of every rendered section
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardView {
    pub symbols: Vec<String>,
    pub summary: Summary,
    pub orders: Vec<Order>,
    pub trades: Vec<Trade>,
    pub positions: Vec<Position>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Sections to render, independent of where they came from
#[derive(Debug)]
struct ViewUpdate {
    summary: Summary,
    orders: Vec<Order>,
    trades: Vec<Trade>,
    /// None keeps the last known positions
    positions: Option<Vec<Position>>,
    chart_symbol: String,
    candles: Vec<Candle>,
}

impl From<Snapshot> for ViewUpdate {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            summary: snapshot.summary,
            orders: snapshot.orders,
            trades: snapshot.trades,
            positions: Some(snapshot.positions),
            chart_symbol: snapshot.symbol,
            candles: snapshot.candles,
        }
    }
}

impl From<TickEnvelope> for ViewUpdate {
    fn from(tick: TickEnvelope) -> Self {
        Self {
            summary: tick.summary,
            orders: tick.orders,
            trades: tick.trades,
            positions: tick.positions,
            chart_symbol: tick.symbol,
            candles: tick.candles,
        }
    }
}

/// Result of a candle re-fetch, tagged with the selection it was made for
#[derive(Debug)]
pub struct CandleWindow {
    pub generation: u64,
    pub symbol: String,
    pub result: Result<Vec<Candle>, FetchError>,
}

#[derive(Debug)]
pub enum CoordinatorEvent {
    Feed(FeedEvent),
    Candles(CandleWindow),
}

pub struct ViewCoordinator {
    loader: SnapshotLoader,
    state: ViewState,
    view: DashboardView,
    chart: ChartProjector,
    connection: ConnectionManager,
    feed_rx: mpsc::Receiver<FeedEvent>,
    candle_tx: mpsc::UnboundedSender<CandleWindow>,
    candle_rx: mpsc::UnboundedReceiver<CandleWindow>,
    /// Incremented on every selection; only the latest window is rendered
    candle_generation: u64,
}

impl ViewCoordinator {
    pub fn new(config: &DashboardConfig) -> Self {
        let loader = SnapshotLoader::new(ApiClient::from_config(config), config);
        let (connection, feed_rx) = ConnectionManager::new(ConnectionConfig::from_dashboard(config));
        let (candle_tx, candle_rx) = mpsc::unbounded_channel();

        Self {
            loader,
            state: ViewState {
                current_symbol: config.default_symbol.clone(),
                connection_status: ConnectionStatus::Connecting,
                last_server_error: None,
            },
            view: DashboardView::default(),
            chart: ChartProjector::new(),
            connection,
            feed_rx,
            candle_tx,
            candle_rx,
            candle_generation: 0,
        }
    }

    /// Boot: load the snapshot, render every section once, then open the feed
    pub async fn start(&mut self) {
        let snapshot = self.loader.load(None).await;

        self.view.symbols = snapshot.symbols.clone();
        self.state.current_symbol = snapshot.symbol.clone();
        self.render(ViewUpdate::from(snapshot));

        info!(symbol = %self.state.current_symbol, "initial render complete, opening feed");
        self.connection.open(self.state.current_symbol.clone());
    }

    /// Switch the dashboard to `symbol`. Returns false if already selected.
    ///
    /// Only the candle window is re-fetched; the feed is reopened for the new
    /// symbol, which closes the previous subscription.
    pub fn select_symbol(&mut self, symbol: &str) -> bool {
        if symbol == self.state.current_symbol {
            return false;
        }

        info!(from = %self.state.current_symbol, to = %symbol, "symbol selected");
        self.state.current_symbol = symbol.to_string();
        self.candle_generation = self.candle_generation.wrapping_add(1);

        let generation = self.candle_generation;
        let loader = self.loader.clone();
        let candle_tx = self.candle_tx.clone();
        let symbol_owned = symbol.to_string();
        tokio::spawn(async move {
            let result = loader.load_candles(&symbol_owned).await;
            let _ = candle_tx.send(CandleWindow {
                generation,
                symbol: symbol_owned,
                result,
            });
        });

        self.connection.open(symbol);
        true
    }

    /// Select the listed symbol at `index`
    pub fn select_symbol_at(&mut self, index: usize) -> bool {
        match self.view.symbols.get(index).cloned() {
            Some(symbol) => self.select_symbol(&symbol),
            None => false,
        }
    }

    /// Cycle through the symbol list, `step` may be negative
    pub fn cycle_symbol(&mut self, step: isize) -> bool {
        let count = self.view.symbols.len();
        if count == 0 {
            return false;
        }
        let current = self
            .view
            .symbols
            .iter()
            .position(|s| *s == self.state.current_symbol)
            .unwrap_or(0);
        let next = (current as isize + step).rem_euclid(count as isize) as usize;
        self.select_symbol_at(next)
    }

    /// Wait for the next feed event or candle window
    pub async fn next_event(&mut self) -> Option<CoordinatorEvent> {
        tokio::select! {
            Some(event) = self.feed_rx.recv() => Some(CoordinatorEvent::Feed(event)),
            Some(window) = self.candle_rx.recv() => Some(CoordinatorEvent::Candles(window)),
            else => None,
        }
    }

    /// Apply everything already queued without waiting; returns the count
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.feed_rx.try_recv() {
            self.apply(CoordinatorEvent::Feed(event));
            applied += 1;
        }
        while let Ok(window) = self.candle_rx.try_recv() {
            self.apply(CoordinatorEvent::Candles(window));
            applied += 1;
        }
        applied
    }

    pub fn apply(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Feed(FeedEvent::Status(status)) => {
                debug!(status = status.as_str(), "connection status");
                if status == ConnectionStatus::Live {
                    self.state.last_server_error = None;
                }
                self.state.connection_status = status;
            }
            CoordinatorEvent::Feed(FeedEvent::Tick(tick)) => {
                self.render(ViewUpdate::from(*tick));
            }
            CoordinatorEvent::Feed(FeedEvent::ServerError { message }) => {
                self.state.last_server_error = message;
            }
            CoordinatorEvent::Candles(window) => self.apply_candle_window(window),
        }
    }

    fn apply_candle_window(&mut self, window: CandleWindow) {
        if window.generation != self.candle_generation {
            debug!(
                symbol = %window.symbol,
                generation = window.generation,
                latest = self.candle_generation,
                "discarding stale candle window"
            );
            return;
        }

        let candles = window.result.or_default_logged("candles");
        self.chart.render(&window.symbol, &candles);
        self.view.last_update = Some(Utc::now());
    }

    /// The single rendering path for snapshot and tick data
    fn render(&mut self, update: ViewUpdate) {
        self.view.summary = update.summary;
        self.view.orders = update.orders;
        self.view.trades = update.trades;
        if let Some(positions) = update.positions {
            self.view.positions = positions;
        }
        self.chart.render(&update.chart_symbol, &update.candles);
        self.view.last_update = Some(Utc::now());
    }

    /// Stop the feed and wait for its socket to close; the coordinator keeps
    /// its last rendered view
    pub async fn dispose(&mut self) {
        info!("disposing view coordinator");
        if !self.connection.dispose().await {
            warn!("feed connection was aborted during dispose");
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn view(&self) -> &DashboardView {
        &self.view
    }

    pub fn chart(&self) -> &ChartModel {
        self.chart.model()
    }

    pub fn kpis(&self) -> KpiPanel {
        kpi_panel(&self.view.summary)
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }
}
