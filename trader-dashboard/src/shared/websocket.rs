/// Streaming connection manager for the `/ws` tick feed
///
/// Owns at most one live subscription. The connection lifecycle is modelled
/// by [`ConnectionMachine`]; the async loop only performs I/O and feeds the
/// machine. Reconnects use a fixed delay and always target the symbol that is
/// designated *at attempt time*, read from a `watch` channel rather than a
/// value captured when the loop started.

use crate::shared::config::DashboardConfig;
use crate::shared::types::{FeedEnvelope, SubscribeMessage, TickEnvelope};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

type FeedStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lower bound for the keep-alive period; `interval` rejects zero
const MIN_PING_INTERVAL: Duration = Duration::from_millis(1);

/// Connection manager configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket server URL
    pub url: Url,
    /// Fixed delay between a lost connection and the next attempt
    pub reconnect_delay: Duration,
    /// Ping interval to keep connection alive. A session with no inbound
    /// frame for two intervals is treated as lost.
    pub ping_interval: Duration,
    /// Upper bound on the TCP connect plus websocket upgrade
    pub connect_timeout: Duration,
    /// Maximum channel buffer size for feed events
    pub channel_buffer_size: usize,
}

impl ConnectionConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            reconnect_delay: Duration::from_millis(1500),
            ping_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            channel_buffer_size: 256,
        }
    }

    pub fn from_dashboard(config: &DashboardConfig) -> Self {
        Self {
            url: config.ws_url.clone(),
            reconnect_delay: config.reconnect_delay,
            ping_interval: config.ping_interval.max(MIN_PING_INTERVAL),
            connect_timeout: config.request_timeout,
            channel_buffer_size: config.channel_buffer_size,
        }
    }

    /// Set reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set ping interval
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval.max(MIN_PING_INTERVAL);
        self
    }

    /// Set handshake timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set channel buffer size
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }
}

/// Connection status shown by the status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Live,
    Reconnecting,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "CONNECTING",
            ConnectionStatus::Live => "LIVE",
            ConnectionStatus::Reconnecting => "RECONNECTING",
            ConnectionStatus::Error => "ERROR",
        }
    }
}

/// Lifecycle of the single logical subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting { symbol: String },
    Subscribed { symbol: String },
    Closed { symbol: String },
    Disposed,
}

impl ConnectionState {
    pub fn symbol(&self) -> Option<&str> {
        match self {
            ConnectionState::Connecting { symbol }
            | ConnectionState::Subscribed { symbol }
            | ConnectionState::Closed { symbol } => Some(symbol.as_str()),
            ConnectionState::Idle | ConnectionState::Disposed => None,
        }
    }
}

/// Classified inbound text frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Tick(Box<TickEnvelope>),
    ServerError(Option<String>),
    /// Well-formed envelope of a type this client does not handle
    Ignored,
    /// Failed to parse; dropped without touching state
    Malformed,
}

/// Typed transitions of the connection lifecycle.
///
/// Each transition returns `Some(status)` only when the visible status
/// changed, so the caller publishes exactly the edges.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    status: ConnectionStatus,
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMachine {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
            status: ConnectionStatus::Connecting,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Start an attempt for `symbol`. After a loss the indicator keeps
    /// showing "reconnecting" until the subscription is re-established.
    pub fn begin_connect(&mut self, symbol: &str) -> Option<ConnectionStatus> {
        let status = match self.state {
            ConnectionState::Closed { .. } => ConnectionStatus::Reconnecting,
            _ => ConnectionStatus::Connecting,
        };
        self.state = ConnectionState::Connecting {
            symbol: symbol.to_string(),
        };
        self.set_status(status)
    }

    /// Subscribe message sent on an open socket
    pub fn subscribed(&mut self) -> Option<ConnectionStatus> {
        match std::mem::replace(&mut self.state, ConnectionState::Idle) {
            ConnectionState::Connecting { symbol } => {
                self.state = ConnectionState::Subscribed { symbol };
                self.set_status(ConnectionStatus::Live)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Classify an inbound text frame. A tick restores `Live` after a server
    /// error; an error envelope flips the status but keeps the subscription.
    pub fn receive(&mut self, text: &str) -> (Inbound, Option<ConnectionStatus>) {
        match FeedEnvelope::parse(text) {
            Ok(FeedEnvelope::Tick(tick)) => {
                (Inbound::Tick(Box::new(tick)), self.set_status(ConnectionStatus::Live))
            }
            Ok(FeedEnvelope::Error { message }) => (
                Inbound::ServerError(message),
                self.set_status(ConnectionStatus::Error),
            ),
            Ok(FeedEnvelope::Ignored) => (Inbound::Ignored, None),
            Err(_) => (Inbound::Malformed, None),
        }
    }

    /// Socket closed or failed, intentionally or not
    pub fn lost(&mut self) -> Option<ConnectionStatus> {
        let symbol = self.state.symbol().unwrap_or_default().to_string();
        self.state = ConnectionState::Closed { symbol };
        self.set_status(ConnectionStatus::Reconnecting)
    }

    /// Socket closed because another symbol was designated
    pub fn superseded(&mut self) {
        self.state = ConnectionState::Idle;
    }

    pub fn dispose(&mut self) {
        self.state = ConnectionState::Disposed;
    }

    fn set_status(&mut self, status: ConnectionStatus) -> Option<ConnectionStatus> {
        if self.status == status {
            None
        } else {
            self.status = status;
            Some(status)
        }
    }
}

/// Events delivered to the view coordinator, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Status(ConnectionStatus),
    Tick(Box<TickEnvelope>),
    ServerError { message: Option<String> },
}

/// Owns the background connection task for exactly one current symbol
pub struct ConnectionManager {
    config: ConnectionConfig,
    event_tx: mpsc::Sender<FeedEvent>,
    symbol_tx: Option<watch::Sender<String>>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Create a manager and the receiver its feed events are delivered to
    pub fn new(config: ConnectionConfig) -> (Self, mpsc::Receiver<FeedEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer_size.max(1));
        let manager = Self {
            config,
            event_tx,
            symbol_tx: None,
            task: None,
        };
        (manager, event_rx)
    }

    /// Subscribe to `symbol`, superseding any current connection.
    ///
    /// The running task closes its socket and reconnects for the new symbol;
    /// a pending reconnect will target the new symbol as well.
    pub fn open(&mut self, symbol: impl Into<String>) {
        let symbol = symbol.into();

        if let (Some(symbol_tx), Some(task)) = (&self.symbol_tx, &self.task) {
            if !task.is_finished() {
                debug!(%symbol, "designating new feed symbol");
                symbol_tx.send_replace(symbol);
                return;
            }
        }

        let (symbol_tx, symbol_rx) = watch::channel(symbol);
        let config = self.config.clone();
        let event_tx = self.event_tx.clone();
        self.task = Some(tokio::spawn(async move {
            run_connection_loop(config, symbol_rx, event_tx).await;
        }));
        self.symbol_tx = Some(symbol_tx);
    }

    /// Currently designated symbol, if opened
    pub fn current_symbol(&self) -> Option<String> {
        self.symbol_tx.as_ref().map(|tx| tx.borrow().clone())
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the connection task and wait for it to close its socket.
    ///
    /// Returns false if the task did not stop within the grace period and
    /// had to be aborted.
    pub async fn dispose(&mut self) -> bool {
        self.symbol_tx.take();
        let Some(task) = self.task.take() else {
            return true;
        };

        let grace = self.config.reconnect_delay.max(Duration::from_millis(500));
        let abort = task.abort_handle();
        match tokio::time::timeout(grace, task).await {
            Ok(_) => true,
            Err(_) => {
                warn!(grace_ms = grace.as_millis() as u64, "feed task did not stop in time, aborting");
                abort.abort();
                false
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.symbol_tx.take();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

enum SessionEnd {
    /// Connection lost or failed: retry after the fixed delay
    Lost,
    /// Another symbol was designated: reconnect immediately
    Superseded,
    /// Manager disposed or event receiver dropped
    Shutdown,
}

/// Main connection loop with fixed-delay auto-reconnect
async fn run_connection_loop(
    config: ConnectionConfig,
    mut symbol_rx: watch::Receiver<String>,
    event_tx: mpsc::Sender<FeedEvent>,
) {
    info!(url = %config.url, "starting feed connection manager");
    let mut machine = ConnectionMachine::new();

    loop {
        let symbol = symbol_rx.borrow_and_update().clone();
        if !publish(&event_tx, machine.begin_connect(&symbol)).await {
            break;
        }

        info!(%symbol, url = %config.url, "connecting to feed");
        let end = match connect(&config, &symbol, &mut symbol_rx).await {
            Ok(ws_stream) => {
                run_session(&config, ws_stream, &symbol, &mut machine, &mut symbol_rx, &event_tx)
                    .await
            }
            Err(end) => end,
        };

        match end {
            SessionEnd::Shutdown => break,
            SessionEnd::Superseded => {
                machine.superseded();
            }
            SessionEnd::Lost => {
                if !publish(&event_tx, machine.lost()).await {
                    break;
                }
                warn!(
                    %symbol,
                    delay_ms = config.reconnect_delay.as_millis() as u64,
                    "feed connection lost, will reconnect"
                );

                tokio::select! {
                    _ = tokio::time::sleep(config.reconnect_delay) => {}
                    changed = symbol_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        debug!("new symbol designated during reconnect delay");
                    }
                }
            }
        }
    }

    machine.dispose();
    info!("feed connection manager stopped");
}

/// Open the socket, bounded by the connect timeout. A new designation (or
/// disposal) abandons the handshake at once.
async fn connect(
    config: &ConnectionConfig,
    symbol: &str,
    symbol_rx: &mut watch::Receiver<String>,
) -> Result<FeedStream, SessionEnd> {
    let handshake = tokio::time::timeout(config.connect_timeout, connect_async(config.url.as_str()));

    tokio::select! {
        changed = symbol_rx.changed() => {
            debug!(%symbol, "abandoning handshake");
            Err(if changed.is_ok() {
                SessionEnd::Superseded
            } else {
                SessionEnd::Shutdown
            })
        }
        result = handshake => match result {
            Ok(Ok((ws_stream, _))) => Ok(ws_stream),
            Ok(Err(e)) => {
                error!(%symbol, error = %e, "failed to connect to feed");
                Err(SessionEnd::Lost)
            }
            Err(_) => {
                warn!(
                    %symbol,
                    timeout_ms = config.connect_timeout.as_millis() as u64,
                    "feed handshake timed out"
                );
                Err(SessionEnd::Lost)
            }
        },
    }
}

async fn run_session(
    config: &ConnectionConfig,
    ws_stream: FeedStream,
    symbol: &str,
    machine: &mut ConnectionMachine,
    symbol_rx: &mut watch::Receiver<String>,
    event_tx: &mpsc::Sender<FeedEvent>,
) -> SessionEnd {
    let (mut write, mut read) = ws_stream.split();

    let end = 'session: {
        // The designated symbol may have moved on during the handshake
        match symbol_rx.has_changed() {
            Ok(false) => {}
            Ok(true) => break 'session SessionEnd::Superseded,
            Err(_) => break 'session SessionEnd::Shutdown,
        }

        let subscribe = match serde_json::to_string(&SubscribeMessage {
            symbol: symbol.to_string(),
        }) {
            Ok(subscribe) => subscribe,
            Err(e) => {
                error!(%symbol, error = %e, "failed to encode subscribe message");
                break 'session SessionEnd::Lost;
            }
        };
        if let Err(e) = write.send(Message::Text(subscribe.into())).await {
            warn!(%symbol, error = %e, "failed to send subscribe message");
            break 'session SessionEnd::Lost;
        }
        info!(%symbol, "subscribed to feed");
        if !publish(event_tx, machine.subscribed()).await {
            break 'session SessionEnd::Shutdown;
        }

        let ping_interval = config.ping_interval.max(MIN_PING_INTERVAL);
        let silence_limit = ping_interval * 2;
        let mut ping = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                biased;

                changed = symbol_rx.changed() => {
                    break 'session if changed.is_ok() {
                        SessionEnd::Superseded
                    } else {
                        SessionEnd::Shutdown
                    };
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        last_inbound = Instant::now();
                        let (inbound, status) = machine.receive(text.as_str());
                        if !publish(event_tx, status).await {
                            break 'session SessionEnd::Shutdown;
                        }

                        let event = match inbound {
                            Inbound::Tick(tick) => Some(FeedEvent::Tick(tick)),
                            Inbound::ServerError(message) => {
                                warn!(%symbol, ?message, "feed server signalled an error");
                                Some(FeedEvent::ServerError { message })
                            }
                            Inbound::Ignored => None,
                            Inbound::Malformed => {
                                debug!(%symbol, len = text.len(), "dropping malformed frame");
                                None
                            }
                        };

                        if let Some(event) = event {
                            if event_tx.send(event).await.is_err() {
                                warn!("Event receiver dropped, stopping feed");
                                break 'session SessionEnd::Shutdown;
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(%symbol, ?frame, "feed server closed connection");
                        break 'session SessionEnd::Lost;
                    }
                    Some(Ok(_)) => {
                        // Binary and heartbeat frames; tungstenite answers pings itself
                        last_inbound = Instant::now();
                    }
                    Some(Err(e)) => {
                        error!(%symbol, error = %e, "feed socket error");
                        break 'session SessionEnd::Lost;
                    }
                    None => {
                        info!(%symbol, "feed stream ended");
                        break 'session SessionEnd::Lost;
                    }
                },
                _ = ping.tick() => {
                    let silent = last_inbound.elapsed();
                    if silent > silence_limit {
                        warn!(%symbol, silent_ms = silent.as_millis() as u64, "feed went silent");
                        break 'session SessionEnd::Lost;
                    }
                    if write.send(Message::Ping(Vec::new().into())).await.is_err() {
                        debug!(%symbol, "failed to send ping, connection likely dead");
                        break 'session SessionEnd::Lost;
                    }
                }
            }
        }
    };

    // Closing an already-closed socket only yields an error, which is ignored
    if let Err(e) = write.close().await {
        debug!(%symbol, error = %e, "socket already closed");
    }
    end
}

/// Forward a status edge; false once the receiver is gone
async fn publish(event_tx: &mpsc::Sender<FeedEvent>, status: Option<ConnectionStatus>) -> bool {
    match status {
        Some(status) => event_tx.send(FeedEvent::Status(status)).await.is_ok(),
        None => true,
    }
}
