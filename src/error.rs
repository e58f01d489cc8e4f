use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

/// Crate-wide error type. Each variant maps to exactly one HTTP status at the
/// handler boundary; internal plumbing converts into this at the service layer
/// rather than leaking `sqlx`/`redis`/`rdkafka` errors to callers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    /// Rendered as 500 with a textual message, matching the behaviour of the
    /// system this was ported from rather than introducing a new 404 surface.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal error")]
    Internal(#[from] anyhow::Error),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let body = ErrorBody {
            error: self.to_string(),
        };
        match self {
            AppError::Validation(msg) => {
                tracing::warn!(%msg, "validation error");
                HttpResponse::BadRequest().json(body)
            }
            AppError::Unauthorized => HttpResponse::Unauthorized().json(body),
            AppError::Permission(msg) => {
                tracing::warn!(%msg, "permission denied");
                HttpResponse::Forbidden().json(body)
            }
            AppError::Conflict(msg) => {
                tracing::debug!(%msg, "conflict");
                HttpResponse::Conflict().json(body)
            }
            AppError::NotFound(msg) => {
                // The source system renders not-found as a generic 500; preserved
                // here rather than silently upgrading it to 404.
                tracing::error!(%msg, "not found (rendered as internal error)");
                HttpResponse::InternalServerError().json(body)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                HttpResponse::InternalServerError().json(body)
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                HttpResponse::InternalServerError().json(body)
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
