//! Production connector: a WebSocket session to the chain node.

use std::time::Duration;

use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};

use crate::config::NodeSettings;
use crate::connection::manager::{Connect, ConnectionError};

/// Opens WebSocket sessions and probes them with `eth_blockNumber`.
pub struct WsConnector {
    ws_url: String,
    request_timeout: Duration,
}

impl WsConnector {
    pub fn new(settings: &NodeSettings) -> Self {
        Self {
            ws_url: settings.ws_url.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }
}

impl Connect for WsConnector {
    type Session = DynProvider;

    async fn open(&self) -> Result<DynProvider, ConnectionError> {
        let ws = WsConnect::new(self.ws_url.clone());

        let provider = ProviderBuilder::new()
            .connect_ws(ws)
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;

        Ok(DynProvider::new(provider))
    }

    async fn probe(&self, session: &DynProvider) -> Result<(), ConnectionError> {
        let probe = async { session.get_block_number().await };
        match tokio::time::timeout(self.request_timeout, probe).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Transport(e.to_string())),
            Err(_) => Err(ConnectionError::Transport("health probe timed out".into())),
        }
    }
}
