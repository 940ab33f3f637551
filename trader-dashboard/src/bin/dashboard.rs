/// Trader Dashboard
///
/// Read-only live view of the trading bot: account KPIs, candle chart,
/// recent orders, trades and open positions for one selected symbol.
use std::{
    error::Error,
    fs::File,
    io,
    sync::Mutex,
    time::{Duration, Instant},
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use rustls::crypto::ring::default_provider;
use tracing::{info, warn};
use trader_dashboard::{shared::widget::render_dashboard, DashboardConfig, ViewCoordinator};

/// Redraw at most every 100ms
const DRAW_INTERVAL: Duration = Duration::from_millis(100);

/// Log to a file; stdout belongs to the terminal UI
fn init_logging(config: &DashboardConfig) -> io::Result<()> {
    let file = File::create(&config.log_file)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = default_provider().install_default();

    let config = DashboardConfig::from_env()?;
    init_logging(&config)?;
    info!(base_url = %config.base_url, ws_url = %config.ws_url, "starting dashboard");

    // Snapshot first so the first frame is already populated
    let mut coordinator = ViewCoordinator::new(&config);
    coordinator.start().await;

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut last_draw: Option<Instant> = None;
    let result: Result<(), Box<dyn Error>> = loop {
        let applied = coordinator.drain_pending();

        if applied > 0 || last_draw.map_or(true, |at| at.elapsed() >= DRAW_INTERVAL) {
            if let Err(e) = terminal.draw(|f| render_dashboard(f, &coordinator)) {
                break Err(e.into());
            }
            last_draw = Some(Instant::now());
        }

        match event::poll(Duration::from_millis(20)) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => break Err(e.into()),
        }

        let key = match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
            Ok(_) => continue,
            Err(e) => break Err(e.into()),
        };

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break Ok(()),
            KeyCode::Right | KeyCode::Tab => {
                coordinator.cycle_symbol(1);
            }
            KeyCode::Left | KeyCode::BackTab => {
                coordinator.cycle_symbol(-1);
            }
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                if index >= coordinator.view().symbols.len() {
                    warn!(index, "no symbol at position");
                }
                coordinator.select_symbol_at(index);
            }
            _ => {}
        }
    };

    // Close the feed socket before the runtime shuts down
    coordinator.dispose().await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("dashboard closed");
    result
}
