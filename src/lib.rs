pub mod auth;
pub mod broker;
pub mod config;
pub mod error;
pub mod handlers;
pub mod kv;
pub mod models;
pub mod repository;
pub mod services;
pub mod workers;

pub use config::Config;
pub use error::{AppError, AppResult};
