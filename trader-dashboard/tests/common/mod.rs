//! In-process feed server used by the integration tests.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use trader_dashboard::SubscribeMessage;
use url::Url;

pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Connected { conn: usize, at: Instant },
    Subscribed { conn: usize, symbol: String },
    Closed { conn: usize },
}

#[derive(Debug, Clone)]
enum ServerCommand {
    Broadcast(String),
    DropAll,
    /// Stop reading frames, so pings go unanswered
    Stall,
}

/// Accepts any number of feed connections on `127.0.0.1:0`.
///
/// Each connection answers a subscribe message with one tick for that symbol
/// when `tick_on_subscribe` is set, and otherwise only sends what the test
/// broadcasts.
pub struct FeedServer {
    pub url: Url,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    commands: broadcast::Sender<ServerCommand>,
    active: Arc<AtomicUsize>,
}

impl FeedServer {
    pub async fn start(tick_on_subscribe: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (commands, _) = broadcast::channel(64);
        let active = Arc::new(AtomicUsize::new(0));

        let accept_commands = commands.clone();
        let accept_active = Arc::clone(&active);
        tokio::spawn(async move {
            let mut next_conn = 0;
            while let Ok((stream, _)) = listener.accept().await {
                let conn = next_conn;
                next_conn += 1;
                let event_tx = event_tx.clone();
                let commands = accept_commands.subscribe();
                let active = Arc::clone(&accept_active);

                tokio::spawn(async move {
                    let Ok(ws) = accept_async(stream).await else {
                        return;
                    };
                    active.fetch_add(1, Ordering::SeqCst);
                    let _ = event_tx.send(ServerEvent::Connected {
                        conn,
                        at: Instant::now(),
                    });
                    handle_connection(ws, conn, tick_on_subscribe, commands, &event_tx).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    let _ = event_tx.send(ServerEvent::Closed { conn });
                });
            }
        });

        Self {
            url: Url::parse(&format!("ws://{}/ws", addr)).unwrap(),
            events,
            commands,
            active,
        }
    }

    pub fn broadcast(&self, text: impl Into<String>) {
        let _ = self.commands.send(ServerCommand::Broadcast(text.into()));
    }

    /// Drop every connection without a close handshake
    pub fn drop_all(&self) {
        let _ = self.commands.send(ServerCommand::DropAll);
    }

    /// Keep every current connection open but stop answering it
    pub fn stall(&self) {
        let _ = self.commands.send(ServerCommand::Stall);
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub async fn next_event(&mut self) -> ServerEvent {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for feed server event")
            .expect("feed server stopped")
    }

    /// Wait for the next subscribe message and return its symbol
    pub async fn next_subscription(&mut self) -> String {
        loop {
            if let ServerEvent::Subscribed { symbol, .. } = self.next_event().await {
                return symbol;
            }
        }
    }

    /// Everything reported so far, without waiting
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

async fn handle_connection(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    conn: usize,
    tick_on_subscribe: bool,
    mut commands: broadcast::Receiver<ServerCommand>,
    event_tx: &mpsc::UnboundedSender<ServerEvent>,
) {
    let (mut write, mut read) = ws.split();
    let mut stalled = false;

    loop {
        tokio::select! {
            frame = read.next(), if !stalled => match frame {
                Some(Ok(Message::Text(text))) => {
                    let Ok(subscribe) = serde_json::from_str::<SubscribeMessage>(text.as_str()) else {
                        continue;
                    };
                    let _ = event_tx.send(ServerEvent::Subscribed {
                        conn,
                        symbol: subscribe.symbol.clone(),
                    });
                    if tick_on_subscribe {
                        let tick = tick_json(&subscribe.symbol, 1000.0);
                        if write.send(Message::Text(tick.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            command = commands.recv() => match command {
                Ok(ServerCommand::Broadcast(text)) => {
                    if write.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(ServerCommand::DropAll) => break,
                Ok(ServerCommand::Stall) => stalled = true,
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

/// Accepts TCP connections and never completes the websocket upgrade
pub struct SilentListener {
    pub url: Url,
    accepted: mpsc::UnboundedReceiver<usize>,
}

impl SilentListener {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted_tx, accepted) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            // Held open so the client stays in its handshake
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
                if accepted_tx.send(held.len()).is_err() {
                    break;
                }
            }
        });

        Self {
            url: Url::parse(&format!("ws://{}/ws", addr)).unwrap(),
            accepted,
        }
    }

    /// Wait for the next accepted connection and return the running count
    pub async fn next_accept(&mut self) -> usize {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .expect("timed out waiting for a connection attempt")
            .expect("listener stopped")
    }
}

/// A tick envelope as the backend sends it
pub fn tick_json(symbol: &str, usdt: f64) -> String {
    json!({
        "type": "tick",
        "symbol": symbol,
        "summary": {
            "usdt": usdt,
            "usdt_ts": "2025-01-01T12:00:00+00:00",
            "delta_24h": -12.5,
            "open_orders": 1,
            "last_trade": format!("{} BUY 0.01 @ 100.00", symbol)
        },
        "orders": [{
            "id": 7,
            "symbol": symbol,
            "side": "BUY",
            "type": "LIMIT",
            "price": 100.0,
            "qty": 0.01,
            "status": "NEW",
            "created_at": "2025-01-01T11:59:00+00:00"
        }],
        "trades": [],
        "candles": [
            {"x": "2025-01-01T11:58:00+00:00", "o": 100.0, "h": 101.0, "l": 99.0, "c": 100.5},
            {"x": "2025-01-01T11:59:00+00:00", "o": 100.5, "h": 102.0, "l": 100.0, "c": 101.5}
        ]
    })
    .to_string()
}
