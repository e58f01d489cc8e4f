pub mod events;

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::Serialize;

/// Exchange names from the broker topology. Each maps 1:1 onto a Kafka topic
/// of the same name; the "queue" bound to it is realised as a consumer group
/// subscribed to that topic (see SPEC_FULL.md §4.2).
pub const TOPIC_LIKE_EVENTS: &str = "like.events";
pub const TOPIC_COMMENT_EVENTS: &str = "comment.events";
pub const TOPIC_POPULARITY_EVENTS: &str = "video.popularity.events";

/// Thin wrapper over `FutureProducer` for the three topics this pipeline
/// publishes to. The routing key becomes both a Kafka message key (so all
/// events for one action class share partition ordering) and a header.
#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("retries", "3")
            .set("linger.ms", "5")
            .create()?;
        Ok(EventProducer { producer })
    }

    /// Publishes `payload` to `topic` under `routing_key`, waiting up to
    /// `deadline` for broker acknowledgement. Returns an error on timeout or
    /// broker rejection; the caller (a service, never a handler directly) is
    /// responsible for degrading to the inline fallback on failure.
    pub async fn publish<T: Serialize>(
        &self,
        topic: &str,
        routing_key: &str,
        payload: &T,
        deadline: Duration,
    ) -> anyhow::Result<()> {
        let body = serde_json::to_vec(payload)?;
        let headers = OwnedHeaders::new().insert(rdkafka::message::Header {
            key: "routing_key",
            value: Some(routing_key),
        });
        let record = FutureRecord::to(topic)
            .key(routing_key)
            .payload(&body)
            .headers(headers);

        match self.producer.send(record, deadline).await {
            Ok(_) => Ok(()),
            Err((err, _)) => Err(anyhow::anyhow!("kafka publish to {topic} failed: {err}")),
        }
    }
}

/// One decoded message handed to a worker's processing closure, along with
/// the means to ack (commit) or nack (skip commit, let redelivery happen).
pub struct DeliveredMessage {
    pub payload: Vec<u8>,
    pub routing_key: Option<String>,
}

/// A consumer bound to one topic under a named group, mirroring "one consumer
/// per queue" from the resource model. `run` drives the consume loop until
/// the provided `shutdown` future resolves.
pub struct EventConsumer {
    consumer: StreamConsumer,
}

impl EventConsumer {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .create()?;
        consumer.subscribe(&[topic])?;
        Ok(EventConsumer { consumer })
    }

    /// Consumes messages one at a time, handing each to `handle` and waiting
    /// for it to finish before the next `recv()`. `handle` returns `Ok(true)`
    /// to ack (commit the offset), `Ok(false)` to silently drop without
    /// committing (used by poison-message guards so delivery isn't retried
    /// forever on a payload that will never parse), and `Err` to nack
    /// (skip commit so the broker redelivers on rebalance/restart).
    ///
    /// Strictly sequential: there is no AMQP-style prefetch window here. A
    /// slow `handle` call delays the next `recv()` rather than overlapping
    /// with it.
    pub async fn run<F, Fut>(&self, mut handle: F) -> anyhow::Result<()>
    where
        F: FnMut(DeliveredMessage) -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<bool>>,
    {
        loop {
            match self.consumer.recv().await {
                Ok(msg) => {
                    let payload = msg.payload().unwrap_or_default().to_vec();
                    let routing_key = msg.headers().and_then(|headers| {
                        headers.iter().find_map(|h| {
                            if h.key == "routing_key" {
                                h.value.map(|v| String::from_utf8_lossy(v).to_string())
                            } else {
                                None
                            }
                        })
                    });
                    let delivered = DeliveredMessage { payload, routing_key };
                    match handle(delivered).await {
                        Ok(true) => {
                            self.consumer.commit_message(&msg, CommitMode::Async)?;
                        }
                        Ok(false) => {
                            // poison message: ack by committing without having
                            // applied any effect.
                            self.consumer.commit_message(&msg, CommitMode::Async)?;
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "event processing failed, not committing offset");
                        }
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "kafka recv error");
                }
            }
        }
    }
}
