use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Wire-stable error taxonomy. Every externally visible operation returns
/// either a value or one of these kinds with a human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Unspecified internal failure.
    Error,
    /// Malformed input or a reference to an unknown entity.
    InvalidArgument,
    /// The permission gate denied the operation.
    InsufficientPermissions,
    /// Token absent or expired.
    InvalidToken,
    /// Authentication rejected.
    InvalidPassword,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Error(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    InvalidToken(String),
    #[error("{0}")]
    InvalidPassword(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Error(_) => ErrorKind::Error,
            AppError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AppError::InsufficientPermissions(_) => ErrorKind::InsufficientPermissions,
            AppError::InvalidToken(_) => ErrorKind::InvalidToken,
            AppError::InvalidPassword(_) => ErrorKind::InvalidPassword,
        }
    }

    /// The standard permission-gate rejection.
    pub fn not_allowed() -> AppError {
        AppError::InsufficientPermissions("Not allowed".to_string())
    }

    /// The standard rejection for an absent or expired token.
    pub fn invalid_token() -> AppError {
        AppError::InvalidToken("Invalid token".to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Error => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::InsufficientPermissions => StatusCode::FORBIDDEN,
            ErrorKind::InvalidToken => StatusCode::UNAUTHORIZED,
            ErrorKind::InvalidPassword => StatusCode::UNAUTHORIZED,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: u16,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error: {self}");
        }
        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => {
                AppError::InvalidArgument("Resource not found".to_string())
            }
            _ => AppError::Error(err.to_string()),
        }
    }
}
