mod config;

pub use config::{
    CacheSettings, ConnectionSettings, ContractSettings, MonitorSettings, NodeSettings,
    RedpandaSettings, Settings,
};
