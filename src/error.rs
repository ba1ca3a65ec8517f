use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid user or advisor id")]
    InvalidIdentifier,
    #[error("free session already used")]
    FreeSessionUsed,
    #[error("not enough credits")]
    InsufficientCredits,
    #[error("no active session found")]
    NoActiveSession,
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::InvalidIdentifier | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::FreeSessionUsed => StatusCode::CONFLICT,
            AppError::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
            AppError::NoActiveSession => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(?self);
        (status, self.to_string()).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
