//! Bounded block-timestamp cache with retrying fetch-on-miss.
//!
//! Every published record carries the wall-clock time of its emitting
//! block; this cache keeps the lookups off the hot path. Capacity is
//! bounded and eviction removes the numerically smallest block number:
//! block numbers rise monotonically with chain time, so smallest-key
//! eviction approximates age-based eviction for the live log stream.

use std::collections::BTreeMap;
use std::sync::Mutex;

use log::warn;

use crate::config::CacheSettings;
use crate::connection::backoff;
use crate::worker::reader::ChainReader;

/// Bounded mapping from block number to timestamp (ms since epoch).
///
/// Entries are immutable once inserted; the only mutations are
/// insert-if-absent, eviction, and bulk clear. The inner map lives behind
/// a synchronous mutex that is never held across an await, so the
/// capacity invariant is enforced in the same task step as the insert.
pub struct BlockTimestampCache {
    capacity: usize,
    fetch_retries: u32,
    retry_base_ms: u64,
    retry_max_ms: u64,
    entries: Mutex<BTreeMap<u64, u64>>,
}

impl BlockTimestampCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            capacity: settings.block_cache_capacity.max(1),
            fetch_retries: settings.fetch_retries.max(1),
            retry_base_ms: settings.fetch_retry_base_ms,
            retry_max_ms: settings.fetch_retry_max_ms,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Timestamp of `number` in ms since epoch.
    ///
    /// A hit returns immediately without touching the reader. A miss
    /// drives up to `fetch_retries` reads with backoff between failed
    /// attempts (none after the last); exhaustion returns `None` and the
    /// caller substitutes the current wall clock. Concurrent callers for
    /// the same block each drive their own fetch loop; reads and inserts
    /// are idempotent, so this costs efficiency, not correctness.
    pub async fn get_or_fetch<R: ChainReader>(&self, reader: &R, number: u64) -> Option<u64> {
        if let Some(ts) = self.entries.lock().unwrap().get(&number) {
            return Some(*ts);
        }

        for attempt in 1..=self.fetch_retries {
            match reader.block_timestamp(number).await {
                Ok(Some(timestamp)) => {
                    self.insert_bounded(number, timestamp);
                    return Some(timestamp);
                },
                Ok(None) => {
                    warn!(
                        "Block {} not found (attempt {}/{})",
                        number, attempt, self.fetch_retries
                    );
                },
                Err(e) => {
                    warn!(
                        "Block {} fetch failed (attempt {}/{}): {:#}",
                        number, attempt, self.fetch_retries, e
                    );
                },
            }

            if attempt < self.fetch_retries {
                tokio::time::sleep(backoff::delay(
                    attempt,
                    self.retry_base_ms,
                    self.retry_max_ms,
                ))
                .await;
            }
        }

        None
    }

    /// Remove all entries (shutdown path).
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn contains(&self, number: u64) -> bool {
        self.entries.lock().unwrap().contains_key(&number)
    }

    fn insert_bounded(&self, number: u64, timestamp: u64) {
        let mut entries = self.entries.lock().unwrap();
        entries.entry(number).or_insert(timestamp);
        while entries.len() > self.capacity {
            entries.pop_first();
        }
    }
}
