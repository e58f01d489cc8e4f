pub mod comment_repo;
pub mod feed_repo;
pub mod like_repo;

pub use comment_repo::CommentRepository;
pub use feed_repo::FeedRepository;
pub use like_repo::LikeRepository;
