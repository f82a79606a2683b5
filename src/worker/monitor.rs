//! Subscription router.
//!
//! Installs log filters against the live session exposed by the
//! connection manager and fans matched logs out to the decoder and
//! dispatcher. Every successful reconnect replaces the session, so the
//! router watches the manager's epoch channel and re-installs all filters
//! whenever it bumps. Re-subscription is an explicit step here, not a
//! side effect of setup code.

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::providers::{DynProvider, Provider};
use alloy::pubsub::SubscriptionStream;
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use log::{info, warn};
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use crate::abis::{amm, v1, v2};
use crate::config::MonitorSettings;
use crate::connection::{Connect, ConnectionError, ConnectionManager};
use crate::worker::decoder::{self, LogOrigin, SchemaVersion};
use crate::worker::dispatch::{DispatchContext, DispatchStatus, EventDispatcher};
use crate::worker::reader::ChainReader;

fn launchpad_signatures(schema: SchemaVersion) -> [B256; 5] {
    match schema {
        SchemaVersion::V1 => [
            v1::TokenCreated::SIGNATURE_HASH,
            v1::TokenPurchased::SIGNATURE_HASH,
            v1::TokenSold::SIGNATURE_HASH,
            v1::TokenMigrated::SIGNATURE_HASH,
            v1::TradingHalted::SIGNATURE_HASH,
        ],
        SchemaVersion::V2 => [
            v2::TokenCreated::SIGNATURE_HASH,
            v2::TokenPurchased::SIGNATURE_HASH,
            v2::TokenSold::SIGNATURE_HASH,
            v2::TokenMigrated::SIGNATURE_HASH,
            v2::TradingHalted::SIGNATURE_HASH,
        ],
    }
}

/// Routes matched logs from the live subscription session to the
/// dispatcher, re-installing filters across session replacements.
pub struct Monitor<C, R>
where
    C: Connect<Session = DynProvider>,
    R: ChainReader,
{
    connection: Arc<ConnectionManager<C>>,
    dispatcher: Arc<EventDispatcher<R>>,
    origins: FxHashMap<Address, LogOrigin>,
    filters: Vec<Filter>,
}

impl<C, R> Monitor<C, R>
where
    C: Connect<Session = DynProvider> + 'static,
    R: ChainReader + 'static,
{
    pub fn new(
        connection: Arc<ConnectionManager<C>>,
        dispatcher: Arc<EventDispatcher<R>>,
        settings: &MonitorSettings,
    ) -> Result<Self> {
        let mut origins = FxHashMap::default();
        let mut filters = Vec::new();

        // One filter per (contract, event signature) pair
        for contract in &settings.contracts {
            let address: Address = contract
                .address
                .parse()
                .with_context(|| format!("Invalid contract address {}", contract.address))?;

            origins.insert(address, LogOrigin::Launchpad(contract.schema));

            for signature in launchpad_signatures(contract.schema) {
                filters.push(Filter::new().address(address).event_signature(signature));
            }
        }

        // One filter per monitored external pair
        for pair in &settings.pairs {
            let address: Address = pair
                .parse()
                .with_context(|| format!("Invalid pair address {}", pair))?;

            origins.insert(address, LogOrigin::Amm);
            filters.push(
                Filter::new()
                    .address(address)
                    .event_signature(amm::Swap::SIGNATURE_HASH),
            );
        }

        anyhow::ensure!(!filters.is_empty(), "No contracts or pairs configured");

        Ok(Self {
            connection,
            dispatcher,
            origins,
            filters,
        })
    }

    /// Consume the log stream until cancelled.
    ///
    /// Returns `Err` only when the connection is unrecoverable; the
    /// binary treats that as a fatal exit.
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        let mut epoch_rx = self.connection.subscribe_epoch();

        loop {
            if cancellation_token.is_cancelled() {
                return Ok(());
            }

            // Mark the current epoch seen before grabbing its session, so
            // a replacement arriving in between is never missed.
            let _ = epoch_rx.borrow_and_update();

            let session = match self.connection.session() {
                Ok(session) => session,
                Err(ConnectionError::Unrecoverable) => {
                    anyhow::bail!("chain connection unrecoverable");
                },
                Err(_) => {
                    // Between sessions: wait for the next epoch
                    tokio::select! {
                        _ = cancellation_token.cancelled() => return Ok(()),
                        changed = epoch_rx.changed() => {
                            if changed.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    continue;
                },
            };

            let streams = match self.install_filters(&session).await {
                Ok(streams) => streams,
                Err(e) => {
                    warn!("Failed to install log filters: {:#}", e);
                    self.connection
                        .reconnect()
                        .await
                        .context("reconnect after filter installation failure")?;
                    continue;
                },
            };

            info!("Installed {} log filters", streams.len());
            let mut merged = stream::select_all(streams);

            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => return Ok(()),
                    changed = epoch_rx.changed() => {
                        if changed.is_err() {
                            return Ok(());
                        }
                        info!("Session replaced, reinstalling log filters");
                        break;
                    }
                    item = merged.next() => match item {
                        Some(log) => self.handle_log(log),
                        None => {
                            warn!("Log stream ended, transport lost");
                            self.connection
                                .reconnect()
                                .await
                                .context("reconnect after transport loss")?;
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn install_filters(
        &self,
        session: &DynProvider,
    ) -> Result<Vec<SubscriptionStream<Log>>> {
        let mut streams = Vec::with_capacity(self.filters.len());

        for filter in &self.filters {
            let subscription = session
                .subscribe_logs(filter)
                .await
                .context("subscribe_logs failed")?;
            streams.push(subscription.into_stream());
        }

        Ok(streams)
    }

    /// Hand one matched log to the dispatcher on its own task, so
    /// enrichment of one event never blocks the next. Handler failures
    /// are logged per-log and never terminate the subscription.
    fn handle_log(&self, log: Log) {
        let Some(origin) = self.origins.get(&log.address()).copied() else {
            return;
        };

        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            let ctx = DispatchContext::from_log(&log);

            match decoder::decode_log(origin, &log) {
                Some(event) => match dispatcher.handle(event, ctx).await {
                    DispatchStatus::Published { .. } | DispatchStatus::LoggedOnly => {},
                    DispatchStatus::Degraded { reason } => {
                        warn!(
                            "Degraded dispatch for log in block {}: {}",
                            log.block_number.unwrap_or(0),
                            reason
                        );
                    },
                },
                None => {
                    warn!(
                        "Skipping undecodable log from {} in block {}",
                        log.address(),
                        log.block_number.unwrap_or(0)
                    );
                },
            }
        });
    }
}
