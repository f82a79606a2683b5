pub mod canonical;
pub mod registry;

pub use canonical::{
    CanonicalEvent, TokenCreateRecord, TokenMigrationRecord, TokenTradeRecord, TradeDirection,
    TradeStopRecord,
};
pub use registry::{CreatedTokenRecord, TokenRegistry};
