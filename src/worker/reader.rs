//! Read-only chain access for enrichment.
//!
//! [`ChainReader`] is the capability consumed by the block cache and the
//! dispatcher: block header timestamps plus the auxiliary contract reads
//! (total supply for market cap, founder/pool resolution for migrations).
//! [`RpcChainReader`] implements it over an HTTP provider; tests substitute
//! mocks.

use std::future::Future;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use anyhow::{anyhow, Context, Result};
use moka::future::Cache;
use url::Url;

use crate::abis::{IERC20, ILaunchpad};
use crate::config::NodeSettings;

pub trait ChainReader: Send + Sync {
    /// Block header timestamp in milliseconds since epoch, or `None` when
    /// the node has no record of the block.
    fn block_timestamp(&self, number: u64) -> impl Future<Output = Result<Option<u64>>> + Send;

    /// `totalSupply()` on the token contract.
    fn total_supply(&self, token: Address) -> impl Future<Output = Result<U256>> + Send;

    /// Founder address of a migrated token, read from the launchpad that
    /// emitted the migration.
    fn founder_of(
        &self,
        launchpad: Address,
        token: Address,
    ) -> impl Future<Output = Result<Address>> + Send;

    /// Liquidity pool address a migrated token graduated into.
    fn pair_of(
        &self,
        launchpad: Address,
        token: Address,
    ) -> impl Future<Output = Result<Address>> + Send;
}

/// Chain reader over an HTTP provider.
///
/// Kept separate from the WebSocket streaming session so enrichment reads
/// survive a reconnect of the subscription transport.
pub struct RpcChainReader {
    provider: DynProvider,
    request_timeout: Duration,
    /// Tokens whose supply read keeps failing (selfdestructed or
    /// non-standard contracts). Prevents hammering the node with reads
    /// that will never succeed; the TTL lets us retry eventually.
    unreadable_tokens: Cache<Address, ()>,
}

impl RpcChainReader {
    pub fn new(settings: &NodeSettings) -> Result<Self> {
        let url: Url = settings.rpc_url.parse().context("Invalid RPC URL")?;

        let client = ProviderBuilder::new().connect_http(url);
        let provider = DynProvider::new(client);

        let unreadable_tokens = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(3600))
            .build();

        Ok(Self {
            provider,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            unreadable_tokens,
        })
    }
}

impl ChainReader for RpcChainReader {
    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>> {
        let block = tokio::time::timeout(self.request_timeout, async {
            self.provider.get_block_by_number(number.into()).await
        })
        .await
        .context("Block fetch timeout")?
        .context("Block fetch failed")?;

        Ok(block.map(|b| b.header.timestamp * 1000))
    }

    async fn total_supply(&self, token: Address) -> Result<U256> {
        if self.unreadable_tokens.contains_key(&token) {
            return Err(anyhow!("supply read recently failed for {token}"));
        }

        let contract = IERC20::new(token, &self.provider);

        match tokio::time::timeout(self.request_timeout, contract.totalSupply().call()).await {
            Ok(Ok(supply)) => Ok(supply),
            Ok(Err(e)) => {
                self.unreadable_tokens.insert(token, ()).await;
                Err(e).context("totalSupply call failed")
            },
            Err(_) => {
                self.unreadable_tokens.insert(token, ()).await;
                Err(anyhow!("totalSupply call timeout for {token}"))
            },
        }
    }

    async fn founder_of(&self, launchpad: Address, token: Address) -> Result<Address> {
        let contract = ILaunchpad::new(launchpad, &self.provider);

        tokio::time::timeout(self.request_timeout, contract.founderOf(token).call())
            .await
            .context("founderOf call timeout")?
            .context("founderOf call failed")
    }

    async fn pair_of(&self, launchpad: Address, token: Address) -> Result<Address> {
        let contract = ILaunchpad::new(launchpad, &self.provider);

        tokio::time::timeout(self.request_timeout, contract.pairOf(token).call())
            .await
            .context("pairOf call timeout")?
            .context("pairOf call failed")
    }
}
