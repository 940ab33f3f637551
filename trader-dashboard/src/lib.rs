/// Trader Dashboard - Shared Library
///
/// Read-only live view over a trading bot backend:
/// - snapshot loading from the REST read endpoints
/// - a single live tick subscription with fixed-delay reconnect
/// - candle chart projection and display formatting
/// - the view coordinator that ties them together for the `dashboard` TUI
pub mod shared;

// Re-export commonly used types for convenience
pub use shared::types::{
    Candle, FeedEnvelope, Order, OrderStatus, Position, Side, SubscribeMessage, Summary,
    TickEnvelope, Trade,
};

pub use shared::api::{ApiClient, Snapshot, SnapshotLoader};
pub use shared::chart::{vertical_range, ChartModel, ChartProjector, OhlcPoint, VerticalRange};
pub use shared::config::DashboardConfig;
pub use shared::coordinator::{CoordinatorEvent, DashboardView, ViewCoordinator, ViewState};
pub use shared::error::{ConfigError, FetchError, OrDefault};
pub use shared::websocket::{
    ConnectionConfig, ConnectionManager, ConnectionMachine, ConnectionState, ConnectionStatus,
    FeedEvent,
};
