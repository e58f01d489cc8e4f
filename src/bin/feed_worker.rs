use feedpulse::broker::{EventConsumer, TOPIC_COMMENT_EVENTS, TOPIC_LIKE_EVENTS, TOPIC_POPULARITY_EVENTS};
use feedpulse::kv::KvStore;
use feedpulse::repository::{CommentRepository, FeedRepository, LikeRepository};
use feedpulse::services::PopularityCache;
use feedpulse::workers::{CommentWorker, LikeWorker, PopularityWorker};
use feedpulse::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    tracing::info!(?config, "starting feed-worker");

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;

    let kv = KvStore::connect(&config.redis.url).await?;
    let popularity = PopularityCache::new(kv);

    let feed_repo = FeedRepository::new(pool.clone());
    let like_repo = LikeRepository::new(pool.clone());
    let comment_repo = CommentRepository::new(pool.clone());

    let group = |name: &str| format!("{}-{name}", config.kafka.consumer_group_prefix);

    let like_consumer = EventConsumer::new(&config.kafka.brokers, &group("like"), TOPIC_LIKE_EVENTS)?;
    let like_worker = LikeWorker::new(like_consumer, feed_repo, like_repo);

    let comment_consumer =
        EventConsumer::new(&config.kafka.brokers, &group("comment"), TOPIC_COMMENT_EVENTS)?;
    let comment_worker = CommentWorker::new(comment_consumer, comment_repo, pool.clone());

    let popularity_consumer =
        EventConsumer::new(&config.kafka.brokers, &group("popularity"), TOPIC_POPULARITY_EVENTS)?;
    let popularity_worker = PopularityWorker::new(popularity_consumer, popularity);

    let mut shutdown = Box::pin(shutdown_signal());

    tokio::select! {
        res = like_worker.run() => {
            if let Err(err) = res {
                tracing::error!(error = %err, "like worker exited");
            }
        }
        res = comment_worker.run() => {
            if let Err(err) = res {
                tracing::error!(error = %err, "comment worker exited");
            }
        }
        res = popularity_worker.run() => {
            if let Err(err) = res {
                tracing::error!(error = %err, "popularity worker exited");
            }
        }
        _ = &mut shutdown => {
            tracing::info!("shutdown signal received, draining workers");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
