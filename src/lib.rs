pub mod abis;
pub mod cache;
pub mod config;
pub mod connection;
pub mod models;
pub mod pubsub;
pub mod utils;
pub mod worker;

pub use cache::BlockTimestampCache;
pub use config::Settings;
pub use connection::{ConnectionManager, WsConnector};
pub use models::TokenRegistry;
pub use pubsub::RedpandaPublisher;
pub use worker::{EventDispatcher, Monitor, RpcChainReader};
