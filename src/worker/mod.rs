pub mod decoder;
pub mod dispatch;
pub mod monitor;
pub mod reader;

pub use decoder::{decode_log, DecodedEvent, LogOrigin, SchemaVersion};
pub use dispatch::{DispatchContext, DispatchStatus, EventDispatcher};
pub use monitor::Monitor;
pub use reader::{ChainReader, RpcChainReader};
