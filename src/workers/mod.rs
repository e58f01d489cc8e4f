pub mod comment_worker;
pub mod like_worker;
pub mod popularity_worker;

pub use comment_worker::CommentWorker;
pub use like_worker::LikeWorker;
pub use popularity_worker::PopularityWorker;
