use async_trait::async_trait;
use common::config::KafkaConfig;
use domain::InventoryEvent;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Failed to create Kafka consumer: {0}")]
    Creation(rdkafka::error::KafkaError),

    #[error("Failed to subscribe to {topic}: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: rdkafka::error::KafkaError,
    },

    #[error("Kafka error while consuming: {0}")]
    Receive(rdkafka::error::KafkaError),

    #[error("Event source closed")]
    Closed,
}

/// Anything the invalidator can pull inventory events from
#[async_trait]
pub trait EventSource: Send {
    async fn next_event(&mut self) -> Result<InventoryEvent, ConsumerError>;
}

/// Kafka consumer for the inventory topic
pub struct InventoryConsumer {
    consumer: StreamConsumer,
    topic: String,
}

impl InventoryConsumer {
    /// Create the consumer client; no broker round-trip happens yet
    pub fn new(config: &KafkaConfig) -> Result<Self, ConsumerError> {
        info!(
            brokers = %config.brokers,
            group_id = %config.consumer_group,
            topic = %config.topic,
            "Creating Kafka consumer"
        );

        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", &config.consumer_group)
            .set("bootstrap.servers", &config.brokers)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "latest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "10000")
            .create()
            .map_err(ConsumerError::Creation)?;

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Subscribe to the topic and confirm the broker knows about it.
    ///
    /// The metadata fetch blocks, so it runs on a blocking-capable thread.
    pub fn subscribe(&self, probe_timeout: Duration) -> Result<(), ConsumerError> {
        self.consumer
            .subscribe(&[self.topic.as_str()])
            .map_err(|source| ConsumerError::Subscribe {
                topic: self.topic.clone(),
                source,
            })?;

        tokio::task::block_in_place(|| {
            self.consumer
                .fetch_metadata(Some(self.topic.as_str()), probe_timeout)
                .map(|_| ())
        })
        .map_err(|source| ConsumerError::Subscribe {
            topic: self.topic.clone(),
            source,
        })?;

        info!(topic = %self.topic, "Subscribed to Kafka topic");
        Ok(())
    }

    /// Leave the consumer group and release the client
    pub fn disconnect(self) {
        self.consumer.unsubscribe();
        info!(topic = %self.topic, "Kafka consumer disconnected");
    }
}

#[async_trait]
impl EventSource for InventoryConsumer {
    async fn next_event(&mut self) -> Result<InventoryEvent, ConsumerError> {
        let message = self.consumer.recv().await.map_err(ConsumerError::Receive)?;

        debug!(
            topic = %message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            "Received message"
        );

        Ok(InventoryEvent::new(
            message.topic(),
            message.partition(),
            message.offset(),
            message.payload().map(|p| p.to_vec()),
        ))
    }
}

/// In-process feed, e.g. for replaying events without a broker
#[async_trait]
impl EventSource for mpsc::Receiver<Result<InventoryEvent, ConsumerError>> {
    async fn next_event(&mut self) -> Result<InventoryEvent, ConsumerError> {
        self.recv().await.unwrap_or(Err(ConsumerError::Closed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_consumer_creation_invalid_broker() {
        let config = KafkaConfig {
            brokers: "invalid:9092".to_string(),
            ..Default::default()
        };
        // Creation succeeds; connection happens on subscribe/poll
        let consumer = InventoryConsumer::new(&config).unwrap();
        assert_eq!(consumer.topic(), "inventory-events");
    }

    #[tokio::test]
    async fn test_channel_source() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(Ok(InventoryEvent::new("inventory-events", 0, 1, None)))
            .await
            .unwrap();
        drop(tx);

        let event = rx.next_event().await.unwrap();
        assert_eq!(event.offset, 1);
        assert!(matches!(rx.next_event().await, Err(ConsumerError::Closed)));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore] // Requires Kafka to be running
    async fn test_subscribe() {
        let consumer = InventoryConsumer::new(&KafkaConfig::default()).unwrap();
        consumer.subscribe(Duration::from_secs(5)).unwrap();
        consumer.disconnect();
    }
}
