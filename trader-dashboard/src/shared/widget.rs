//! Ratatui rendering for the dashboard panels.
//!
//! Widgets only read from the coordinator; formatting decisions live in
//! [`crate::shared::format`] and are mapped to colours here.

use crate::shared::chart::ChartModel;
use crate::shared::coordinator::{DashboardView, ViewCoordinator, ViewState};
use crate::shared::format::{
    order_row, position_row, trade_row, Fragment, KpiPanel, StyleClass, ORDER_COLUMNS,
    POSITION_COLUMNS, TRADE_COLUMNS,
};
use crate::shared::websocket::ConnectionStatus;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Rectangle},
        Block, Borders, Cell, Paragraph, Row, Table, Tabs,
    },
    Frame,
};

const C_BUY: Color = Color::Rgb(100, 220, 100);
const C_SELL: Color = Color::Rgb(220, 100, 100);
const C_NEUTRAL: Color = Color::Rgb(180, 180, 100);
const C_DIM: Color = Color::Rgb(120, 120, 120);
const C_BRIGHT: Color = Color::Rgb(220, 220, 220);
const C_ACCENT: Color = Color::Rgb(100, 180, 220);

pub fn class_style(class: StyleClass) -> Style {
    match class {
        StyleClass::Default => Style::default().fg(C_BRIGHT),
        StyleClass::Muted => Style::default().fg(C_DIM),
        StyleClass::Positive | StyleClass::Buy => Style::default().fg(C_BUY),
        StyleClass::Negative | StyleClass::Sell => Style::default().fg(C_SELL),
        StyleClass::StatusNew => Style::default().fg(C_ACCENT),
        StyleClass::StatusPartial => Style::default().fg(C_NEUTRAL),
        StyleClass::StatusFilled => Style::default().fg(C_BUY).add_modifier(Modifier::BOLD),
        StyleClass::StatusCanceled => Style::default().fg(C_DIM).add_modifier(Modifier::CROSSED_OUT),
        StyleClass::StatusRejected => Style::default().fg(C_SELL).add_modifier(Modifier::BOLD),
    }
}

fn span(fragment: &Fragment) -> Span<'_> {
    Span::styled(fragment.text.as_str(), class_style(fragment.class))
}

fn status_color(status: ConnectionStatus) -> Color {
    match status {
        ConnectionStatus::Live => C_BUY,
        ConnectionStatus::Connecting | ConnectionStatus::Reconnecting => C_NEUTRAL,
        ConnectionStatus::Error => C_SELL,
    }
}

/// Full dashboard layout
pub fn render_dashboard(f: &mut Frame, coordinator: &ViewCoordinator) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(10),
            Constraint::Length(12),
        ])
        .split(f.area());

    render_status_bar(f, rows[0], coordinator.state(), coordinator.view(), &coordinator.chart().title);
    render_symbol_selector(f, rows[1], &coordinator.view().symbols, &coordinator.state().current_symbol);
    render_kpi_panel(f, rows[2], &coordinator.kpis());

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(rows[3]);
    render_candle_chart(f, middle[0], coordinator.chart());
    render_positions(f, middle[1], coordinator.view());

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[4]);
    render_orders(f, bottom[0], coordinator.view());
    render_trades(f, bottom[1], coordinator.view());
}

pub fn render_status_bar(
    f: &mut Frame,
    area: Rect,
    state: &ViewState,
    view: &DashboardView,
    chart_symbol: &str,
) {
    let color = status_color(state.connection_status);
    let updated = view
        .last_update
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--".to_string());

    let mut spans = vec![
        Span::styled(
            format!("● {} ", state.connection_status.as_str()),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {} ", state.current_symbol),
            Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" chart {} ", chart_symbol), Style::default().fg(C_DIM)),
        Span::styled(format!(" updated {} ", updated), Style::default().fg(C_DIM)),
    ];
    if let Some(message) = &state.last_server_error {
        spans.push(Span::styled(format!(" server: {} ", message), Style::default().fg(C_SELL)));
    }
    spans.push(Span::styled(
        " [←/→] symbol  [1-9] jump  [q] quit",
        Style::default().fg(C_DIM),
    ));

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

pub fn render_symbol_selector(f: &mut Frame, area: Rect, symbols: &[String], current: &str) {
    let titles: Vec<Line> = symbols
        .iter()
        .enumerate()
        .map(|(index, symbol)| Line::from(format!("{} {}", index + 1, symbol)))
        .collect();
    let selected = symbols.iter().position(|s| s == current).unwrap_or(0);

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .title(" SYMBOL ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(C_ACCENT)),
        )
        .select(selected)
        .style(Style::default().fg(C_DIM))
        .highlight_style(Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD | Modifier::REVERSED));

    f.render_widget(tabs, area);
}

pub fn render_kpi_panel(f: &mut Frame, area: Rect, kpis: &KpiPanel) {
    let block = Block::default()
        .title(" ACCOUNT ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_ACCENT));

    let lines = vec![
        Line::from(vec![
            Span::styled(kpis.balance.text.as_str(), class_style(kpis.balance.class).add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            span(&kpis.balance_time),
            Span::raw("   "),
            span(&kpis.delta_24h),
        ]),
        Line::from(vec![
            span(&kpis.positions_value),
            Span::raw("   "),
            span(&kpis.open_orders),
            Span::raw("   "),
            Span::styled("Last: ", Style::default().fg(C_DIM)),
            span(&kpis.last_trade),
        ]),
    ];

    f.render_widget(Paragraph::new(lines).block(block), area);
}

pub fn render_candle_chart(f: &mut Frame, area: Rect, chart: &ChartModel) {
    let title = match chart.last_close() {
        Some(close) => format!(" {} {:.2} ", chart.title, close),
        None => format!(" {} ", chart.title),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_ACCENT));

    if chart.points.is_empty() {
        let placeholder = Paragraph::new(Line::from(Span::styled("No candles", Style::default().fg(C_DIM))))
            .block(block);
        f.render_widget(placeholder, area);
        return;
    }

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds(chart.x_bounds())
        .y_bounds(chart.range.as_bounds())
        .paint(|ctx| {
            for point in &chart.points {
                let color = if point.is_bullish() { C_BUY } else { C_SELL };
                ctx.draw(&CanvasLine {
                    x1: point.x,
                    y1: point.low,
                    x2: point.x,
                    y2: point.high,
                    color,
                });
                let (bottom, top) = if point.open <= point.close {
                    (point.open, point.close)
                } else {
                    (point.close, point.open)
                };
                ctx.draw(&Rectangle {
                    x: point.x - 0.3,
                    y: bottom,
                    width: 0.6,
                    height: top - bottom,
                    color,
                });
            }
        });

    f.render_widget(canvas, area);
}

fn render_rows(f: &mut Frame, area: Rect, title: &str, columns: &[&str], rows: Vec<Vec<Fragment>>, widths: &[Constraint]) {
    let header = Row::new(
        columns
            .iter()
            .map(|c| Cell::from(Span::styled(*c, Style::default().fg(C_DIM).add_modifier(Modifier::BOLD)))),
    );
    let body = rows.iter().map(|row| Row::new(row.iter().map(|fragment| Cell::from(span(fragment)))));

    let table = Table::new(body, widths.to_vec()).header(header).block(
        Block::default()
            .title(format!(" {} ({}) ", title, rows.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(C_ACCENT)),
    );

    f.render_widget(table, area);
}

pub fn render_orders(f: &mut Frame, area: Rect, view: &DashboardView) {
    let rows = view.orders.iter().map(order_row).collect();
    render_rows(
        f,
        area,
        "ORDERS",
        &ORDER_COLUMNS,
        rows,
        &[
            Constraint::Length(14),
            Constraint::Length(9),
            Constraint::Length(4),
            Constraint::Length(6),
            Constraint::Length(11),
            Constraint::Length(11),
            Constraint::Min(8),
        ],
    );
}

pub fn render_trades(f: &mut Frame, area: Rect, view: &DashboardView) {
    let rows = view.trades.iter().map(trade_row).collect();
    render_rows(
        f,
        area,
        "TRADES",
        &TRADE_COLUMNS,
        rows,
        &[
            Constraint::Length(14),
            Constraint::Length(9),
            Constraint::Length(4),
            Constraint::Length(11),
            Constraint::Length(11),
            Constraint::Min(8),
        ],
    );
}

pub fn render_positions(f: &mut Frame, area: Rect, view: &DashboardView) {
    let rows = view.positions.iter().map(position_row).collect();
    render_rows(
        f,
        area,
        "POSITIONS",
        &POSITION_COLUMNS,
        rows,
        &[
            Constraint::Length(9),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Min(7),
        ],
    );
}
