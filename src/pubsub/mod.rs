//! Pub/Sub messaging module for real-time event streaming.
//!
//! Provides Redpanda (Kafka-compatible) integration for publishing
//! canonical token events to downstream consumers.

mod redpanda;

pub use redpanda::RedpandaPublisher;
