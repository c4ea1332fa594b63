//! # Rookery Server
//!
//! HTTP host for the Rookery chat relay. Exposes the WebSocket chat
//! endpoint and a health probe over Axum, and persists relayed messages
//! to a libSQL message log.

pub mod config;
pub mod server;
pub mod storage;
pub mod telemetry;
