pub mod comment_service;
pub mod feed_service;
pub mod like_service;
pub mod popularity_cache;

pub use comment_service::CommentService;
pub use feed_service::FeedService;
pub use like_service::LikeService;
pub use popularity_cache::PopularityCache;
