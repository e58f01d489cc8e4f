use crate::broker::events::PopularityEvent;
use crate::broker::{DeliveredMessage, EventConsumer};
use crate::services::popularity_cache::PopularityCache;

/// Consumes `video.popularity.events` and applies the delta to the bucket of
/// the minute containing `occurred_at`, refreshing its TTL on every write.
pub struct PopularityWorker {
    consumer: EventConsumer,
    popularity: PopularityCache,
}

impl PopularityWorker {
    pub fn new(consumer: EventConsumer, popularity: PopularityCache) -> Self {
        PopularityWorker { consumer, popularity }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        self.consumer
            .run(|msg: DeliveredMessage| async move { self.handle(msg).await })
            .await
    }

    async fn handle(&self, msg: DeliveredMessage) -> anyhow::Result<bool> {
        let event: PopularityEvent = match serde_json::from_slice(&msg.payload) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed popularity event");
                return Ok(false);
            }
        };

        if event.video_id == 0 {
            tracing::debug!("dropping popularity event with zero video id");
            return Ok(false);
        }

        self.popularity
            .apply_delta(event.video_id, event.amount, event.occurred_at)
            .await?;
        Ok(true)
    }
}
