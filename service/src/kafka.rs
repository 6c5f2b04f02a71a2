use std::time::Duration;

use image_toggle_common::config::KafkaConfig;
use image_toggle_common::frame::Frame;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to create Kafka consumer: {0}")]
    ConsumerCreate(KafkaError),
    #[error("failed to subscribe to {topic}: {source}")]
    Subscribe { topic: String, source: KafkaError },
    #[error("failed to create Kafka producer: {0}")]
    ProducerCreate(KafkaError),
    #[error("failed to publish frame {seq}: {source}")]
    Publish { seq: u64, source: KafkaError },
}

/// Consumer for the inbound frame topic. Starts from the latest offset so a
/// restarted service does not replay stale frames.
pub fn create_consumer(config: &KafkaConfig) -> Result<StreamConsumer, TransportError> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .set("group.id", &config.group_id)
        .set("auto.offset.reset", "latest")
        .set("enable.auto.commit", "true")
        .set("auto.commit.interval.ms", "1000")
        .set("max.partition.fetch.bytes", "10485760")
        .create()
        .map_err(TransportError::ConsumerCreate)?;

    consumer
        .subscribe(&[config.input_topic.as_str()])
        .map_err(|source| TransportError::Subscribe {
            topic: config.input_topic.clone(),
            source,
        })?;
    Ok(consumer)
}

pub fn create_producer(brokers: &str, compression: &str) -> Result<FutureProducer, TransportError> {
    ClientConfig::new()
        .set("bootstrap.servers", brokers)
        // Uncompressed 1080p bgr8 is ~6 MB.
        .set("message.max.bytes", "10485760")
        .set("compression.type", compression)
        .set("linger.ms", "5")
        .set("batch.num.messages", "10")
        .set("queue.buffering.max.messages", "1000")
        .set("request.timeout.ms", "5000")
        .create()
        .map_err(TransportError::ProducerCreate)
}

/// Publish one frame, keyed by `{frame_id}:{captured_at_ms}`.
pub async fn publish(
    producer: &FutureProducer,
    topic: &str,
    frame: &Frame,
) -> Result<(), TransportError> {
    let payload = frame.serialize();
    let key = frame.message_key();
    let seq = frame.header().seq;
    debug!(seq, bytes = payload.len(), topic, "publishing frame");

    let record = FutureRecord::to(topic).key(&key).payload(&payload);
    producer
        .send(record, Duration::from_secs(5))
        .await
        .map(|_| ())
        .map_err(|(source, _)| TransportError::Publish { seq, source })
}
