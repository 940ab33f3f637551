//! Formatter / presenter: pure functions from records to display fragments.
//!
//! Snapshot data and live ticks both go through these functions, so there is
//! exactly one formatting rule per field regardless of where the data came
//! from. Nothing here can fail: unknown statuses and sides map to
//! [`StyleClass::Default`], unparseable timestamps are shown verbatim.

use crate::shared::types::{Order, OrderStatus, Position, Side, Summary, Trade};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

pub const PLACEHOLDER: &str = "--";

/// Visual class of a fragment, mapped to colours by the widget layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleClass {
    Default,
    Muted,
    Positive,
    Negative,
    Buy,
    Sell,
    StatusNew,
    StatusPartial,
    StatusFilled,
    StatusCanceled,
    StatusRejected,
}

/// A piece of display text plus its style
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub class: StyleClass,
}

impl Fragment {
    pub fn new(text: impl Into<String>, class: StyleClass) -> Self {
        Self {
            text: text.into(),
            class,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, StyleClass::Default)
    }

    pub fn muted(text: impl Into<String>) -> Self {
        Self::new(text, StyleClass::Muted)
    }
}

/// Format with `dp` decimals and thousands separators, eg/ `1,000.00`
pub fn format_grouped(value: f64, dp: u32) -> String {
    if !value.is_finite() {
        return PLACEHOLDER.to_string();
    }
    let Some(decimal) = Decimal::from_f64(value) else {
        return format!("{:.*}", dp as usize, value);
    };

    let mut rounded = decimal.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    group_thousands(&format!("{:.*}", dp as usize, rounded))
}

fn group_thousands(text: &str) -> String {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };

    let mut out = String::with_capacity(text.len() + int_part.len() / 3);
    out.push_str(sign);
    for (index, digit) in int_part.chars().enumerate() {
        if index > 0 && (int_part.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    if let Some(frac_part) = frac_part {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

/// Money / price amount, 2 decimals
pub fn format_amount(value: f64) -> String {
    format_grouped(value, 2)
}

/// Base-asset quantity, 6 decimals
pub fn format_quantity(value: f64) -> String {
    format_grouped(value, 6)
}

/// Positive / negative / neutral class of a signed value
pub fn signed_class(value: f64) -> StyleClass {
    if value > 0.0 {
        StyleClass::Positive
    } else if value < 0.0 {
        StyleClass::Negative
    } else {
        StyleClass::Muted
    }
}

pub fn side_class(side: &Side) -> StyleClass {
    match side {
        Side::Buy => StyleClass::Buy,
        Side::Sell => StyleClass::Sell,
        Side::Other(_) => StyleClass::Default,
    }
}

pub fn status_class(status: &OrderStatus) -> StyleClass {
    match status {
        OrderStatus::New => StyleClass::StatusNew,
        OrderStatus::PartiallyFilled => StyleClass::StatusPartial,
        OrderStatus::Filled => StyleClass::StatusFilled,
        OrderStatus::Canceled => StyleClass::StatusCanceled,
        OrderStatus::Rejected | OrderStatus::Expired => StyleClass::StatusRejected,
        OrderStatus::Other(_) => StyleClass::Default,
    }
}

/// `MM-DD HH:MM:SS` (UTC) for RFC 3339 input, otherwise the raw text
pub fn format_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.with_timezone(&Utc).format("%m-%d %H:%M:%S").to_string(),
        Err(_) if raw.is_empty() => PLACEHOLDER.to_string(),
        Err(_) => raw.to_string(),
    }
}

fn format_optional_timestamp(raw: Option<&str>) -> String {
    raw.map(format_timestamp)
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Headline account metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KpiPanel {
    pub balance: Fragment,
    pub balance_time: Fragment,
    pub delta_24h: Fragment,
    pub positions_value: Fragment,
    pub open_orders: Fragment,
    pub last_trade: Fragment,
}

pub fn kpi_panel(summary: &Summary) -> KpiPanel {
    let delta_24h = match summary.delta_24h {
        Some(delta) => Fragment::new(format!("24h: {}", format_amount(delta)), signed_class(delta)),
        None => Fragment::muted(format!("24h: {}", PLACEHOLDER)),
    };

    let positions_value = match summary.positions_value {
        Some(value) => Fragment::plain(format!("Positions: {}", format_amount(value))),
        None => Fragment::muted(format!("Positions: {}", PLACEHOLDER)),
    };

    let last_trade = match summary.last_trade_label.as_deref() {
        Some(label) if !label.is_empty() => Fragment::plain(label),
        _ => Fragment::muted(PLACEHOLDER),
    };

    KpiPanel {
        balance: Fragment::plain(format!("USDT {}", format_amount(summary.usdt_balance))),
        balance_time: Fragment::muted(format_optional_timestamp(summary.usdt_ts.as_deref())),
        delta_24h,
        positions_value,
        open_orders: Fragment::plain(format!("Open orders: {}", summary.open_orders_count)),
        last_trade,
    }
}

pub const ORDER_COLUMNS: [&str; 7] = ["Time", "Symbol", "Side", "Type", "Price", "Qty", "Status"];

pub fn order_row(order: &Order) -> Vec<Fragment> {
    let price = match order.price {
        Some(price) => Fragment::plain(format_amount(price)),
        None if order.order_type.eq_ignore_ascii_case("MARKET") => Fragment::muted("MKT"),
        None => Fragment::muted(PLACEHOLDER),
    };

    vec![
        Fragment::muted(format_optional_timestamp(order.created_at.as_deref())),
        Fragment::plain(order.symbol.as_str()),
        Fragment::new(order.side.as_str(), side_class(&order.side)),
        Fragment::plain(order.order_type.as_str()),
        price,
        Fragment::plain(format_quantity(order.qty)),
        Fragment::new(order.status.as_str(), status_class(&order.status)),
    ]
}

pub const TRADE_COLUMNS: [&str; 6] = ["Time", "Symbol", "Side", "Price", "Qty", "Fee"];

pub fn trade_row(trade: &Trade) -> Vec<Fragment> {
    let fee = match (trade.fee, trade.fee_asset.as_deref()) {
        (Some(fee), Some(asset)) if fee != 0.0 => {
            Fragment::plain(format!("{} {}", format_quantity(fee), asset))
        }
        (Some(fee), None) if fee != 0.0 => Fragment::plain(format_quantity(fee)),
        _ => Fragment::muted(PLACEHOLDER),
    };

    vec![
        Fragment::muted(format_timestamp(&trade.timestamp)),
        Fragment::plain(trade.symbol.as_str()),
        Fragment::new(trade.side.as_str(), side_class(&trade.side)),
        Fragment::plain(format_amount(trade.price)),
        Fragment::plain(format_quantity(trade.qty)),
        fee,
    ]
}

pub const POSITION_COLUMNS: [&str; 4] = ["Symbol", "Qty", "Avg entry", "uPnL"];

pub fn position_row(position: &Position) -> Vec<Fragment> {
    let pnl = position.unrealized_pnl_pct;
    let sign = if pnl > 0.0 { "+" } else { "" };

    vec![
        Fragment::plain(position.symbol.as_str()),
        Fragment::plain(format_quantity(position.qty)),
        Fragment::plain(format_amount(position.avg_entry)),
        Fragment::new(format!("{}{}%", sign, format_amount(pnl)), signed_class(pnl)),
    ]
}
