//! Event enrichment and dispatch.
//!
//! Takes decoded events through block-time resolution, auxiliary contract
//! reads, canonical record construction, and publishing. Every failure on
//! this path degrades to a sentinel value and a log line, since one bad
//! event or an unreachable broker must never interrupt the stream. The
//! outcome is reported as a typed [`DispatchStatus`] so the degraded path
//! is assertable in tests.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::rpc::types::Log;
use chrono::Utc;
use log::{info, warn};

use crate::cache::BlockTimestampCache;
use crate::models::{
    CanonicalEvent, TokenCreateRecord, TokenMigrationRecord, TokenRegistry, TokenTradeRecord,
    TradeStopRecord,
};
use crate::pubsub::RedpandaPublisher;
use crate::utils::{hex_encode, u256_to_f64, NOT_AVAILABLE, TOKEN_DECIMALS};
use crate::worker::decoder::DecodedEvent;
use crate::worker::reader::ChainReader;

/// Reserved for future multi-chain support.
const CHAIN_ID: u64 = 0;

/// Log metadata the decoder does not carry: where the log came from and
/// which transaction and block emitted it.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    /// Emitting contract; auxiliary migration reads target it
    pub contract: Address,
    pub block_number: u64,
    pub transaction_hash: Option<String>,
}

impl DispatchContext {
    pub fn from_log(log: &Log) -> Self {
        Self {
            contract: log.address(),
            block_number: log.block_number.unwrap_or(0),
            transaction_hash: log.transaction_hash.map(|h| hex_encode(h.as_slice())),
        }
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    Published { topic: String },
    /// Record was logged but intentionally not published (halt events,
    /// or publishing disabled).
    LoggedOnly,
    /// Record was built but the publish failed; the event is dropped.
    Degraded { reason: String },
}

/// Enriches decoded events and publishes canonical records.
pub struct EventDispatcher<R: ChainReader> {
    reader: Arc<R>,
    blocks: Arc<BlockTimestampCache>,
    registry: Arc<TokenRegistry>,
    publisher: Option<Arc<RedpandaPublisher>>,
}

impl<R: ChainReader> EventDispatcher<R> {
    pub fn new(
        reader: Arc<R>,
        blocks: Arc<BlockTimestampCache>,
        registry: Arc<TokenRegistry>,
        publisher: Option<Arc<RedpandaPublisher>>,
    ) -> Self {
        Self {
            reader,
            blocks,
            registry,
            publisher,
        }
    }

    pub async fn handle(&self, event: DecodedEvent, ctx: DispatchContext) -> DispatchStatus {
        let record = self.enrich(event, &ctx).await;
        self.publish(record).await
    }

    /// Build the canonical record for a decoded event.
    ///
    /// Block time comes from the cache, degrading to the current wall
    /// clock on a miss. Auxiliary reads degrade to sentinels.
    pub async fn enrich(&self, event: DecodedEvent, ctx: &DispatchContext) -> CanonicalEvent {
        let block_time = match self
            .blocks
            .get_or_fetch(self.reader.as_ref(), ctx.block_number)
            .await
        {
            Some(ms) => (ms / 1000) as i64,
            None => Utc::now().timestamp(),
        };

        let kafka_timestamp = Utc::now().to_rfc3339();
        let signature = ctx
            .transaction_hash
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        match event {
            DecodedEvent::Created {
                token,
                creator,
                name,
                symbol,
                initial_supply,
                uri,
            } => {
                let token = hex_encode(token.as_slice());
                self.registry.record(token.clone());

                CanonicalEvent::Create(TokenCreateRecord {
                    chain_id: CHAIN_ID,
                    signature,
                    slot: ctx.block_number,
                    kafka_timestamp,
                    token,
                    name,
                    symbol,
                    creator: hex_encode(creator.as_slice()),
                    initial_supply,
                    uri,
                    block_time,
                })
            },
            DecodedEvent::Trade {
                direction,
                account,
                token,
                token_amount,
                quote_amount,
                price,
            } => {
                let market_cap = self.market_cap(price, token).await;

                CanonicalEvent::Trade(TokenTradeRecord {
                    chain_id: CHAIN_ID,
                    signature,
                    slot: ctx.block_number,
                    kafka_timestamp,
                    direction,
                    account: hex_encode(account.as_slice()),
                    token: hex_encode(token.as_slice()),
                    token_amount,
                    decimals: TOKEN_DECIMALS,
                    quote_amount,
                    market_cap,
                    block_time,
                })
            },
            DecodedEvent::Migrated { token, fee } => {
                let founder = match self.reader.founder_of(ctx.contract, token).await {
                    Ok(address) => hex_encode(address.as_slice()),
                    Err(e) => {
                        warn!("Founder lookup failed for {}: {:#}", token, e);
                        NOT_AVAILABLE.to_string()
                    },
                };

                let pool = match self.reader.pair_of(ctx.contract, token).await {
                    Ok(address) => hex_encode(address.as_slice()),
                    Err(e) => {
                        warn!("Pool lookup failed for {}: {:#}", token, e);
                        NOT_AVAILABLE.to_string()
                    },
                };

                CanonicalEvent::Migration(TokenMigrationRecord {
                    chain_id: CHAIN_ID,
                    signature,
                    slot: ctx.block_number,
                    kafka_timestamp,
                    token: hex_encode(token.as_slice()),
                    founder,
                    pool,
                    migration_fee: fee,
                    block_time,
                })
            },
            DecodedEvent::Halted { token } => CanonicalEvent::Stop(TradeStopRecord {
                chain_id: CHAIN_ID,
                signature,
                slot: ctx.block_number,
                kafka_timestamp,
                token: hex_encode(token.as_slice()),
            }),
        }
    }

    /// `price * totalSupply`, both 18-decimals adjusted.
    ///
    /// Only attempted when the schema provided a non-zero price; a failed
    /// supply read leaves the default 0.
    async fn market_cap(&self, price: Option<U256>, token: Address) -> f64 {
        let Some(price) = price else {
            return 0.0;
        };
        if price.is_zero() {
            return 0.0;
        }

        match self.reader.total_supply(token).await {
            Ok(supply) => {
                u256_to_f64(price, TOKEN_DECIMALS) * u256_to_f64(supply, TOKEN_DECIMALS)
            },
            Err(e) => {
                warn!("Market cap unavailable for {}: {:#}", token, e);
                0.0
            },
        }
    }

    async fn publish(&self, record: CanonicalEvent) -> DispatchStatus {
        // Halt events are observational only
        if let CanonicalEvent::Stop(r) = &record {
            info!("Trading halted for {} (slot {})", r.token, r.slot);
            return DispatchStatus::LoggedOnly;
        }

        let Some(publisher) = &self.publisher else {
            info!(
                "Event for {} in slot {} (publishing disabled)",
                record.token(),
                record.signature()
            );
            return DispatchStatus::LoggedOnly;
        };

        let result = match &record {
            CanonicalEvent::Create(r) => {
                let topic = publisher.topic_created();
                let key = publish_key(topic, &r.signature);
                publisher.publish(topic, &key, r).await.map(|_| topic)
            },
            CanonicalEvent::Trade(r) => {
                let topic = publisher.topic_trade();
                let key = publish_key(topic, &r.signature);
                publisher.publish(topic, &key, r).await.map(|_| topic)
            },
            CanonicalEvent::Migration(r) => {
                let topic = publisher.topic_migrated();
                let key = publish_key(topic, &r.signature);
                publisher.publish(topic, &key, r).await.map(|_| topic)
            },
            CanonicalEvent::Stop(_) => unreachable!("halt events returned above"),
        };

        match result {
            Ok(topic) => {
                info!("Published {} event to {}", record.token(), topic);
                DispatchStatus::Published {
                    topic: topic.to_string(),
                }
            },
            Err(e) => {
                // Best-effort streaming: monitoring continues without
                // durability for this event
                warn!("Publish failed for {}: {:#}", record.token(), e);
                DispatchStatus::Degraded {
                    reason: format!("{e:#}"),
                }
            },
        }
    }
}

/// Records are keyed by transaction signature; logs that arrived without
/// one get a topic-qualified random key instead.
fn publish_key(topic: &str, signature: &str) -> String {
    if signature == NOT_AVAILABLE {
        format!("{}-{:016x}", topic, rand::random::<u64>())
    } else {
        signature.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheSettings;
    use crate::models::TradeDirection;
    use anyhow::{anyhow, Result};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MockReader {
        block_ts: Option<u64>,
        supply: Option<U256>,
        block_calls: AtomicU32,
        supply_calls: AtomicU32,
        aux_ok: bool,
    }

    impl MockReader {
        fn new(block_ts: Option<u64>) -> Self {
            Self {
                block_ts,
                supply: None,
                block_calls: AtomicU32::new(0),
                supply_calls: AtomicU32::new(0),
                aux_ok: true,
            }
        }
    }

    impl ChainReader for MockReader {
        async fn block_timestamp(&self, _number: u64) -> Result<Option<u64>> {
            self.block_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.block_ts)
        }

        async fn total_supply(&self, _token: Address) -> Result<U256> {
            self.supply_calls.fetch_add(1, Ordering::SeqCst);
            self.supply.ok_or_else(|| anyhow!("supply unavailable"))
        }

        async fn founder_of(&self, _launchpad: Address, _token: Address) -> Result<Address> {
            if self.aux_ok {
                Ok(Address::repeat_byte(0x11))
            } else {
                Err(anyhow!("launchpad unreachable"))
            }
        }

        async fn pair_of(&self, _launchpad: Address, _token: Address) -> Result<Address> {
            if self.aux_ok {
                Ok(Address::repeat_byte(0x22))
            } else {
                Err(anyhow!("launchpad unreachable"))
            }
        }
    }

    fn dispatcher(reader: MockReader) -> EventDispatcher<MockReader> {
        EventDispatcher::new(
            Arc::new(reader),
            Arc::new(BlockTimestampCache::new(&CacheSettings {
                block_cache_capacity: 100,
                fetch_retries: 1,
                fetch_retry_base_ms: 1,
                fetch_retry_max_ms: 1,
            })),
            Arc::new(TokenRegistry::new()),
            None,
        )
    }

    fn ctx(block_number: u64) -> DispatchContext {
        DispatchContext {
            contract: Address::repeat_byte(0x10),
            block_number,
            transaction_hash: Some("0xsig".to_string()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_enrichment_end_to_end() {
        use crate::abis::v1;
        use crate::worker::decoder::{self, LogOrigin, SchemaVersion};
        use alloy::sol_types::SolEvent;

        let d = dispatcher(MockReader::new(Some(1_700_000_000_000)));
        let token = Address::repeat_byte(0xBB);

        // Pre-populate the cache for the event's block
        d.blocks.get_or_fetch(d.reader.as_ref(), 500).await.unwrap();
        assert_eq!(d.reader.block_calls.load(Ordering::SeqCst), 1);

        // Raw create log through decoder, then enrichment
        let raw = v1::TokenCreated {
            token,
            creator: Address::repeat_byte(0xAA),
            name: "Pepe".to_string(),
            symbol: "PEPE".to_string(),
            totalSupply: U256::from(10).pow(U256::from(24)),
        };
        let log = Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(0x10),
                data: raw.encode_log_data(),
            },
            block_number: Some(500),
            ..Default::default()
        };
        let event = decoder::decode_log(LogOrigin::Launchpad(SchemaVersion::V1), &log).unwrap();

        let record = d.enrich(event, &ctx(500)).await;
        match record {
            CanonicalEvent::Create(r) => {
                assert_eq!(r.initial_supply, "1000000");
                assert_eq!(r.block_time, 1_700_000_000);
                assert_eq!(r.slot, 500);
                assert_eq!(r.chain_id, 0);
                assert_eq!(r.signature, "0xsig");
                assert_eq!(r.token, hex_encode(token.as_slice()));
            },
            other => panic!("expected create record, got {:?}", other),
        }

        // The created-token index grew by one, and the pre-populated cache
        // answered the block-time lookup without another fetch
        assert_eq!(d.registry.len(), 1);
        assert_eq!(d.registry.snapshot()[0].token, hex_encode(token.as_slice()));
        assert_eq!(d.reader.block_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_price_skips_supply_call() {
        let d = dispatcher(MockReader::new(Some(1_700_000_000_000)));

        let event = DecodedEvent::Trade {
            direction: TradeDirection::Buy,
            account: Address::repeat_byte(0xAA),
            token: Address::repeat_byte(0xBB),
            token_amount: "1".to_string(),
            quote_amount: "0.5".to_string(),
            price: Some(U256::ZERO),
        };

        let record = d.enrich(event, &ctx(1)).await;
        match record {
            CanonicalEvent::Trade(r) => assert_eq!(r.market_cap, 0.0),
            other => panic!("expected trade record, got {:?}", other),
        }
        assert_eq!(d.reader.supply_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_market_cap_from_price_and_supply() {
        let mut reader = MockReader::new(Some(1_700_000_000_000));
        // Supply 1e24 raw = one million tokens
        reader.supply = Some(U256::from(10).pow(U256::from(24)));
        let d = dispatcher(reader);

        let event = DecodedEvent::Trade {
            direction: TradeDirection::Buy,
            account: Address::repeat_byte(0xAA),
            token: Address::repeat_byte(0xBB),
            token_amount: "1".to_string(),
            quote_amount: "2".to_string(),
            // Price 2.0 in quote currency
            price: Some(U256::from(2_000_000_000_000_000_000u128)),
        };

        let record = d.enrich(event, &ctx(1)).await;
        match record {
            CanonicalEvent::Trade(r) => {
                assert!((r.market_cap - 2_000_000.0).abs() < 1e-6);
            },
            other => panic!("expected trade record, got {:?}", other),
        }
        assert_eq!(d.reader.supply_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_supply_read_degrades_to_zero() {
        let d = dispatcher(MockReader::new(Some(1_700_000_000_000)));

        let event = DecodedEvent::Trade {
            direction: TradeDirection::Sell,
            account: Address::repeat_byte(0xAA),
            token: Address::repeat_byte(0xBB),
            token_amount: "1".to_string(),
            quote_amount: "2".to_string(),
            price: Some(U256::from(1_000_000_000_000_000_000u128)),
        };

        let record = d.enrich(event, &ctx(1)).await;
        match record {
            CanonicalEvent::Trade(r) => assert_eq!(r.market_cap, 0.0),
            other => panic!("expected trade record, got {:?}", other),
        }
        assert_eq!(d.reader.supply_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_migration_aux_failures_degrade_to_sentinels() {
        let mut reader = MockReader::new(Some(1_700_000_000_000));
        reader.aux_ok = false;
        let d = dispatcher(reader);

        let event = DecodedEvent::Migrated {
            token: Address::repeat_byte(0xBB),
            fee: "0.1".to_string(),
        };

        let record = d.enrich(event, &ctx(1)).await;
        match record {
            CanonicalEvent::Migration(r) => {
                assert_eq!(r.founder, NOT_AVAILABLE);
                assert_eq!(r.pool, NOT_AVAILABLE);
                assert_eq!(r.migration_fee, "0.1");
            },
            other => panic!("expected migration record, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_migration_aux_success_resolves_addresses() {
        let d = dispatcher(MockReader::new(Some(1_700_000_000_000)));

        let event = DecodedEvent::Migrated {
            token: Address::repeat_byte(0xBB),
            fee: "0.1".to_string(),
        };

        let record = d.enrich(event, &ctx(1)).await;
        match record {
            CanonicalEvent::Migration(r) => {
                assert_eq!(r.founder, hex_encode(Address::repeat_byte(0x11).as_slice()));
                assert_eq!(r.pool, hex_encode(Address::repeat_byte(0x22).as_slice()));
            },
            other => panic!("expected migration record, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_miss_falls_back_to_wall_clock() {
        // Reader has no block record at all
        let d = dispatcher(MockReader::new(None));

        let event = DecodedEvent::Halted {
            token: Address::repeat_byte(0xBB),
        };

        let before = Utc::now().timestamp();
        let record = d.enrich(event, &ctx(9)).await;
        match record {
            CanonicalEvent::Stop(r) => {
                assert_eq!(r.token, hex_encode(Address::repeat_byte(0xBB).as_slice()));
            },
            other => panic!("expected stop record, got {:?}", other),
        }
        // Wall-clock fallback only visible on timed variants; halt records
        // carry no block_time, so just confirm nothing panicked and time
        // kept moving
        assert!(Utc::now().timestamp() >= before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_halt_is_logged_only() {
        let d = dispatcher(MockReader::new(Some(1_700_000_000_000)));

        let event = DecodedEvent::Halted {
            token: Address::repeat_byte(0xBB),
        };

        let status = d.handle(event, ctx(1)).await;
        assert_eq!(status, DispatchStatus::LoggedOnly);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_publisher_is_logged_only() {
        let d = dispatcher(MockReader::new(Some(1_700_000_000_000)));

        let event = DecodedEvent::Created {
            token: Address::repeat_byte(0xBB),
            creator: Address::repeat_byte(0xAA),
            name: "Pepe".to_string(),
            symbol: "PEPE".to_string(),
            initial_supply: "1000000".to_string(),
            uri: NOT_AVAILABLE.to_string(),
        };

        let status = d.handle(event, ctx(1)).await;
        assert_eq!(status, DispatchStatus::LoggedOnly);
    }

    #[test]
    fn test_publish_key_prefers_signature() {
        assert_eq!(publish_key("curvecast.trade", "0xabc"), "0xabc");

        let random = publish_key("curvecast.trade", NOT_AVAILABLE);
        assert!(random.starts_with("curvecast.trade-"));
    }
}
