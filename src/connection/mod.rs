//! Streaming session lifecycle: connect, probe, reconnect, teardown.

pub mod backoff;
mod manager;
mod ws;

pub use manager::{Connect, ConnectionError, ConnectionManager, ConnectionState};
pub use ws::WsConnector;
