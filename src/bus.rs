//! Message bus integration: publishes canonical `deal.events` and consumes
//! them back into the deal cache, on `rdkafka`'s producer/consumer types
//! with an explicit retry loop at startup rather than decorator magic.

use crate::deal_cache::DealCache;
use crate::metrics;
use crate::models::DealEvent;
use anyhow::{Context, Result};
use futures::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Publishes `DealEvent`s to a topic. Connects lazily (the `rdkafka`
/// producer handle is created without blocking on broker reachability);
/// publish failures are logged and skipped, never propagated.
pub struct DealEventProducer {
    producer: FutureProducer,
    topic: String,
}

impl DealEventProducer {
    pub fn new(bootstrap_servers: &str, topic: impl Into<String>) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("message.timeout.ms", "5000")
            .create()
            .context("failed to create Kafka producer")?;
        Ok(Self {
            producer,
            topic: topic.into(),
        })
    }

    /// Publishes one event. Failures are logged and swallowed — the
    /// ingestion pipeline's persistence step must never be blocked or
    /// aborted by a publish failure.
    pub async fn publish(&self, event: &DealEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("failed to encode deal event {}: {}", event.deal_id, e);
                return;
            }
        };

        let record = FutureRecord::to(&self.topic)
            .key(&event.deal_id)
            .payload(&payload);

        match self.producer.send(record, Duration::from_secs(5)).await {
            Ok(_) => metrics::increment_bus_publish(&self.topic),
            Err((e, _)) => {
                log::warn!("failed to publish deal event {}: {}", event.deal_id, e);
            }
        }
    }
}

/// Consumes `deal.events` under a fixed consumer group, applying every
/// message as an upsert into the deal cache. Per-message deserialization
/// failures are logged and skipped; the consumer keeps running.
pub struct DealEventConsumer {
    deal_cache: DealCache,
    bootstrap_servers: String,
    topic: String,
    group_id: String,
}

impl DealEventConsumer {
    pub fn new(
        deal_cache: DealCache,
        bootstrap_servers: impl Into<String>,
        topic: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            deal_cache,
            bootstrap_servers: bootstrap_servers.into(),
            topic: topic.into(),
            group_id: group_id.into(),
        }
    }

    /// Connects with retry (5 attempts, exponential backoff) and spawns
    /// the consume loop. On exhaustion the service continues without
    /// ingress rather than failing startup, per the bus-unavailable error
    /// policy.
    pub async fn start(self, mut shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
        let mut delay = Duration::from_secs(1);
        let consumer: StreamConsumer = loop {
            let built = ClientConfig::new()
                .set("bootstrap.servers", &self.bootstrap_servers)
                .set("group.id", &self.group_id)
                .set("enable.auto.commit", "true")
                .set("session.timeout.ms", "6000")
                .create::<StreamConsumer>();

            match built {
                Ok(consumer) => match consumer.subscribe(&[self.topic.as_str()]) {
                    Ok(()) => break consumer,
                    Err(e) => log::warn!("failed to subscribe to {}: {}", self.topic, e),
                },
                Err(e) => log::warn!("failed to create Kafka consumer: {}", e),
            }

            if delay >= Duration::from_secs(16) {
                log::error!("deal event consumer exhausted retries, continuing without bus ingress");
                return None;
            }
            tokio::time::sleep(delay).await;
            delay *= 2;
        };

        log::info!("deal event consumer subscribed to {}", self.topic);
        let deal_cache = self.deal_cache.clone();
        let topic = self.topic.clone();

        Some(tokio::spawn(async move {
            let mut stream = consumer.stream();
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            log::info!("deal event consumer stopping");
                            break;
                        }
                    }
                    msg = stream.next() => {
                        match msg {
                            Some(Ok(borrowed)) => {
                                let Some(bytes) = borrowed.payload() else { continue };
                                match serde_json::from_slice::<DealEvent>(bytes) {
                                    Ok(event) => {
                                        if let Err(e) = deal_cache.upsert_deal_event(event).await {
                                            log::warn!("failed to upsert consumed deal event: {}", e);
                                        }
                                    }
                                    Err(e) => {
                                        log::warn!("failed to deserialize deal event: {}", e);
                                        metrics::increment_bus_consume_error(&topic);
                                    }
                                }
                            }
                            Some(Err(e)) => {
                                log::warn!("kafka stream error: {}", e);
                                metrics::increment_bus_consume_error(&topic);
                            }
                            None => break,
                        }
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deal_event_roundtrips_through_json() {
        use crate::models::{DealKind, EventPrice};
        use chrono::Utc;

        let event = DealEvent {
            event_type: "deal_created".to_string(),
            deal_id: "deal_1".to_string(),
            kind: DealKind::Hotel,
            destination: "LAX".to_string(),
            route: None,
            summary: "Test Hotel".to_string(),
            price: EventPrice {
                original: 200.0,
                deal: 150.0,
                discount: 25.0,
            },
            score: 72.0,
            tags: vec!["good_value".to_string()],
            valid_until: Utc::now(),
            inventory: Some(4),
            timestamp: Utc::now(),
        };

        let encoded = serde_json::to_vec(&event).unwrap();
        let decoded: DealEvent = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(decoded.deal_id, event.deal_id);
        assert_eq!(decoded.destination, event.destination);
    }
}
