/// Shared modules for the trader dashboard
pub mod api;
pub mod chart;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod format;
pub mod types;
pub mod websocket;
pub mod widget;
