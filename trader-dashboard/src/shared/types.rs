/// Core record types for the dashboard
///
/// These types match the JSON produced by the trader backend, both by the
/// REST read endpoints (`/api/*`) and by the `/ws` tick stream. They are
/// value objects: received, rendered, discarded.

use serde::{Deserialize, Serialize};

/// Order / trade side
///
/// The backend stores sides as free text, so anything other than BUY/SELL is
/// kept verbatim instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Side {
    Buy,
    Sell,
    Other(String),
}

impl Side {
    /// Convert to display string
    pub fn as_str(&self) -> &str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
            Side::Other(raw) => raw.as_str(),
        }
    }

    /// Check if this is a buy
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    /// Check if this is a sell
    pub fn is_sell(&self) -> bool {
        matches!(self, Side::Sell)
    }
}

impl From<String> for Side {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" => Side::Buy,
            "SELL" => Side::Sell,
            _ => Side::Other(raw),
        }
    }
}

impl From<Side> for String {
    fn from(side: Side) -> Self {
        side.as_str().to_string()
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order lifecycle status
///
/// Open set: unrecognised values are preserved in [`OrderStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Other(raw) => raw.as_str(),
        }
    }

    /// Order still resting on the book
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NEW" => OrderStatus::New,
            "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
            "FILLED" => OrderStatus::Filled,
            "CANCELED" | "CANCELLED" => OrderStatus::Canceled,
            "REJECTED" => OrderStatus::Rejected,
            "EXPIRED" => OrderStatus::Expired,
            _ => OrderStatus::Other(raw),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One OHLCV candle
///
/// Accepts both the full record and the backend's compact chart shape
/// `{x, o, h, l, c}`. Not validated client-side.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Candle {
    /// Trading symbol (absent in the compact shape)
    #[serde(default)]
    pub symbol: String,
    /// Candle open time, ISO-8601
    #[serde(alias = "x", alias = "ts")]
    pub timestamp: String,
    #[serde(alias = "o")]
    pub open: f64,
    #[serde(alias = "h")]
    pub high: f64,
    #[serde(alias = "l")]
    pub low: f64,
    #[serde(alias = "c")]
    pub close: f64,
    #[serde(default, alias = "v")]
    pub volume: f64,
}

/// Order as stored by the trader
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Order {
    #[serde(default)]
    pub id: Option<i64>,
    pub symbol: String,
    pub side: Side,
    /// LIMIT / MARKET
    #[serde(rename = "type", default)]
    pub order_type: String,
    /// None for market orders
    #[serde(default)]
    pub price: Option<f64>,
    pub qty: f64,
    pub status: OrderStatus,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default)]
    pub exch_order_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Settled execution
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Trade {
    #[serde(default)]
    pub id: Option<i64>,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub qty: f64,
    #[serde(default)]
    pub fee: Option<f64>,
    #[serde(default)]
    pub fee_asset: Option<String>,
    /// Client id of the order that produced this fill
    #[serde(default)]
    pub order_client_id: Option<String>,
    #[serde(default, alias = "ts")]
    pub timestamp: String,
}

/// Current exposure in one symbol
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Position {
    pub symbol: String,
    pub qty: f64,
    #[serde(default)]
    pub avg_entry: f64,
    #[serde(default)]
    pub unrealized_pnl_pct: f64,
}

/// Account-level KPIs
///
/// Field aliases accept the backend's short names (`usdt`, `open_orders`,
/// `last_trade`). An empty object decodes to the default summary.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Summary {
    /// Latest free USDT balance
    #[serde(alias = "usdt")]
    pub usdt_balance: f64,
    /// Time of the balance row the figure was taken from
    pub usdt_ts: Option<String>,
    /// Balance change over the last 24h (None without a day-old sample)
    pub delta_24h: Option<f64>,
    pub positions_value: Option<f64>,
    #[serde(alias = "open_orders")]
    pub open_orders_count: u64,
    #[serde(alias = "last_trade")]
    pub last_trade_label: Option<String>,
}

/// Full replacement view pushed by the stream for the subscribed symbol
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TickEnvelope {
    /// Symbol the server is actually streaming
    pub symbol: String,
    pub summary: Summary,
    pub orders: Vec<Order>,
    pub trades: Vec<Trade>,
    pub candles: Vec<Candle>,
    /// Absent when the server does not stream positions
    #[serde(default)]
    pub positions: Option<Vec<Position>>,
}

/// Server -> client envelope, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEnvelope {
    Tick(TickEnvelope),
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    /// Any other `type` (eg/ welcome messages)
    #[serde(other)]
    Ignored,
}

impl FeedEnvelope {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Client -> server subscribe message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubscribeMessage {
    pub symbol: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_side_parsing() {
        struct TestCase {
            input: &'static str,
            expected: Side,
        }

        let tests = vec![
            TestCase {
                // TC0: upper case buy
                input: "BUY",
                expected: Side::Buy,
            },
            TestCase {
                // TC1: lower case sell
                input: "sell",
                expected: Side::Sell,
            },
            TestCase {
                // TC2: unknown kept verbatim
                input: "SHORT",
                expected: Side::Other("SHORT".to_string()),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = Side::from(test.input.to_string());
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_order_status_open_set() {
        assert_eq!(OrderStatus::from("CANCELLED".to_string()), OrderStatus::Canceled);
        assert!(OrderStatus::PartiallyFilled.is_open());
        assert!(!OrderStatus::Filled.is_open());

        let unknown = OrderStatus::from("PENDING_CANCEL".to_string());
        assert_eq!(unknown, OrderStatus::Other("PENDING_CANCEL".to_string()));
        assert_eq!(unknown.as_str(), "PENDING_CANCEL");
    }

    #[test]
    fn test_candle_compact_shape() {
        let candle: Candle = serde_json::from_value(json!({
            "x": "2025-01-01T00:00:00+00:00",
            "o": 1.0, "h": 2.0, "l": 0.5, "c": 1.5
        }))
        .unwrap();

        assert_eq!(candle.timestamp, "2025-01-01T00:00:00+00:00");
        assert_eq!(candle.high, 2.0);
        assert_eq!(candle.symbol, "");
        assert_eq!(candle.volume, 0.0);
    }

    #[test]
    fn test_summary_backend_aliases() {
        let summary: Summary = serde_json::from_value(json!({
            "usdt": 1000.0,
            "delta_24h": -12.5,
            "open_orders": 2,
            "last_trade": "BTCUSDT BUY"
        }))
        .unwrap();

        assert_eq!(summary.usdt_balance, 1000.0);
        assert_eq!(summary.delta_24h, Some(-12.5));
        assert_eq!(summary.open_orders_count, 2);
        assert_eq!(summary.last_trade_label.as_deref(), Some("BTCUSDT BUY"));

        let empty: Summary = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty, Summary::default());
    }

    #[test]
    fn test_order_market_price_is_nullable() {
        let order: Order = serde_json::from_value(json!({
            "symbol": "BTCUSDT", "side": "BUY", "type": "MARKET",
            "price": null, "qty": 0.01, "status": "SOMETHING_NEW",
            "created_at": "2025-01-01T00:00:00+00:00"
        }))
        .unwrap();

        assert_eq!(order.price, None);
        assert_eq!(order.order_type, "MARKET");
        assert_eq!(order.status, OrderStatus::Other("SOMETHING_NEW".to_string()));
    }

    #[test]
    fn test_envelope_discriminator() {
        let tick = FeedEnvelope::parse(
            &json!({
                "type": "tick", "symbol": "ETHUSDT", "summary": {},
                "orders": [], "trades": [], "candles": []
            })
            .to_string(),
        )
        .unwrap();
        match tick {
            FeedEnvelope::Tick(tick) => {
                assert_eq!(tick.symbol, "ETHUSDT");
                assert_eq!(tick.positions, None);
            }
            other => panic!("expected tick, got {:?}", other),
        }

        let error = FeedEnvelope::parse(r#"{"type":"error","message":"db down"}"#).unwrap();
        assert_eq!(
            error,
            FeedEnvelope::Error {
                message: Some("db down".to_string())
            }
        );

        let welcome = FeedEnvelope::parse(r#"{"type":"welcome"}"#).unwrap();
        assert_eq!(welcome, FeedEnvelope::Ignored);

        assert!(FeedEnvelope::parse("{not json").is_err());
        assert!(FeedEnvelope::parse(r#"{"type":"tick","symbol":"X"}"#).is_err());
    }
}
