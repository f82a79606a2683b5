//! Redpanda (Kafka-compatible) publisher implementation.
//!
//! Publishes canonical token events to Redpanda topics for external
//! consumers. Uses fire-and-forget semantics to avoid blocking the
//! monitor: a publish failure is reported to the caller, logged there,
//! and never interrupts the log stream.

use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use serde::Serialize;

use crate::config::RedpandaSettings;

/// Redpanda publisher for canonical token events.
///
/// One topic per event category; purchases and sales share the trade
/// topic, distinguished by the record's `direction` field.
pub struct RedpandaPublisher {
    producer: FutureProducer,
    brokers: String,
    topic_created: String,
    topic_trade: String,
    topic_migrated: String,
}

impl RedpandaPublisher {
    /// Create a new Redpanda publisher.
    ///
    /// Returns None if Redpanda is disabled in settings or connection fails.
    pub fn new(settings: &RedpandaSettings) -> Option<Self> {
        if !settings.enabled {
            info!("Redpanda publishing is disabled");
            return None;
        }

        info!("Connecting to Redpanda brokers: {}", settings.brokers);

        let producer: FutureProducer = match ClientConfig::new()
            .set("bootstrap.servers", &settings.brokers)
            .set("message.timeout.ms", "5000")
            .set("queue.buffering.max.messages", "100000")
            .set("queue.buffering.max.kbytes", "1048576") // 1GB buffer
            .set("batch.num.messages", "10000")
            .set("linger.ms", "5") // Small delay to batch messages
            .create()
        {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to create Redpanda producer: {}", e);
                return None;
            },
        };

        info!(
            "Redpanda publisher initialized with topic prefix: {}",
            settings.topic_prefix
        );

        Some(Self {
            producer,
            brokers: settings.brokers.clone(),
            topic_created: format!("{}.created", settings.topic_prefix),
            topic_trade: format!("{}.trade", settings.topic_prefix),
            topic_migrated: format!("{}.migrated", settings.topic_prefix),
        })
    }

    pub fn topic_created(&self) -> &str {
        &self.topic_created
    }

    pub fn topic_trade(&self) -> &str {
        &self.topic_trade
    }

    pub fn topic_migrated(&self) -> &str {
        &self.topic_migrated
    }

    /// Create the output topics if the cluster does not have them yet.
    ///
    /// Best-effort: an unreachable admin API at startup is logged by the
    /// caller and the monitor runs anyway, relying on broker-side topic
    /// auto-creation or pre-provisioning.
    pub async fn ensure_topics(&self) -> Result<()> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .create()
            .context("Failed to create Redpanda admin client")?;

        let names = [
            self.topic_created.as_str(),
            self.topic_trade.as_str(),
            self.topic_migrated.as_str(),
        ];
        let topics: Vec<NewTopic> = names
            .iter()
            .map(|name| NewTopic::new(*name, 1, TopicReplication::Fixed(1)))
            .collect();

        let results = admin
            .create_topics(topics.iter(), &AdminOptions::new())
            .await
            .context("Topic creation request failed")?;

        for result in results {
            match result {
                Ok(topic) => info!("Created topic {}", topic),
                Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => {},
                Err((topic, code)) => warn!("Failed to create topic {}: {}", topic, code),
            }
        }

        Ok(())
    }

    /// Publish a single JSON message to a topic.
    pub async fn publish<T: Serialize>(&self, topic: &str, key: &str, value: &T) -> Result<()> {
        let payload =
            serde_json::to_string(value).with_context(|| format!("Serialize for {}", topic))?;

        let record = FutureRecord::to(topic).key(key).payload(&payload);

        // Short timeout: the monitor must not stall behind a slow broker
        self.producer
            .send(record, Duration::from_millis(100))
            .await
            .map_err(|(e, _)| anyhow::anyhow!(e))
            .with_context(|| format!("Send to {} failed", topic))?;

        Ok(())
    }

    /// Flush any pending messages (call on shutdown).
    pub fn flush(&self) {
        self.producer.flush(Duration::from_secs(5)).ok();
    }
}

impl Drop for RedpandaPublisher {
    fn drop(&mut self) {
        self.flush();
    }
}
