use actix_web::{web, App, HttpServer};
use feedpulse::broker::EventProducer;
use feedpulse::kv::KvStore;
use feedpulse::repository::{CommentRepository, FeedRepository, LikeRepository};
use feedpulse::services::{CommentService, FeedService, LikeService, PopularityCache};
use feedpulse::{handlers, Config};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    tracing::info!(?config, "starting feed-api");

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let kv = KvStore::connect(&config.redis.url).await?;
    let producer = EventProducer::new(&config.kafka.brokers)?;

    let feed_repo = FeedRepository::new(pool.clone());
    let like_repo = LikeRepository::new(pool.clone());
    let comment_repo = CommentRepository::new(pool.clone());
    let popularity = PopularityCache::new(kv.clone());

    let feed_service = web::Data::new(FeedService::new(
        feed_repo.clone(),
        like_repo.clone(),
        kv.clone(),
        popularity.clone(),
    ));
    let like_service = web::Data::new(LikeService::new(
        feed_repo.clone(),
        like_repo,
        producer.clone(),
        popularity.clone(),
    ));
    let comment_service = web::Data::new(CommentService::new(
        feed_repo,
        comment_repo,
        producer,
        popularity,
    ));

    let host = config.server.host.clone();
    let port = config.server.port;

    HttpServer::new(move || {
        App::new()
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(feed_service.clone())
            .app_data(like_service.clone())
            .app_data(comment_service.clone())
            .configure(handlers::feed::configure)
            .configure(handlers::social::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    Ok(())
}
