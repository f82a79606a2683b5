//! Canonical event records published to the bus.
//!
//! The normalized, schema-version-independent representation of launchpad
//! activity. All on-chain quantities are decimal strings to avoid
//! floating-point precision loss; `kafka_timestamp` is ISO-8601 and
//! `block_time` is unix seconds.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Buy,
    Sell,
}

/// A token launched on the bonding curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenCreateRecord {
    pub chain_id: u64,
    pub signature: String,
    pub slot: u64,
    pub kafka_timestamp: String,
    pub token: String,
    pub name: String,
    pub symbol: String,
    pub creator: String,
    pub initial_supply: String,
    pub uri: String,
    pub block_time: i64,
}

/// A purchase or sale against the curve (or a third-party pair swap for a
/// migrated token). Purchases and sales share the record, distinguished
/// by `direction`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenTradeRecord {
    pub chain_id: u64,
    pub signature: String,
    pub slot: u64,
    pub kafka_timestamp: String,
    pub direction: TradeDirection,
    pub account: String,
    pub token: String,
    pub token_amount: String,
    pub decimals: u8,
    pub quote_amount: String,
    pub market_cap: f64,
    pub block_time: i64,
}

/// A token that graduated off the curve into an external liquidity pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenMigrationRecord {
    pub chain_id: u64,
    pub signature: String,
    pub slot: u64,
    pub kafka_timestamp: String,
    pub token: String,
    pub founder: String,
    pub pool: String,
    pub migration_fee: String,
    pub block_time: i64,
}

/// Trading halted for a token. Logged only, never published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeStopRecord {
    pub chain_id: u64,
    pub signature: String,
    pub slot: u64,
    pub kafka_timestamp: String,
    pub token: String,
}

/// Tagged union over the four canonical record shapes. Values are
/// transient: created and consumed within a single dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalEvent {
    Create(TokenCreateRecord),
    Trade(TokenTradeRecord),
    Migration(TokenMigrationRecord),
    Stop(TradeStopRecord),
}

impl CanonicalEvent {
    pub fn signature(&self) -> &str {
        match self {
            CanonicalEvent::Create(r) => &r.signature,
            CanonicalEvent::Trade(r) => &r.signature,
            CanonicalEvent::Migration(r) => &r.signature,
            CanonicalEvent::Stop(r) => &r.signature,
        }
    }

    pub fn token(&self) -> &str {
        match self {
            CanonicalEvent::Create(r) => &r.token,
            CanonicalEvent::Trade(r) => &r.token,
            CanonicalEvent::Migration(r) => &r.token,
            CanonicalEvent::Stop(r) => &r.token,
        }
    }
}
