use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    auth::{password::HashError, token::TokenError},
    storage::StorageError,
};

/// AppError
///
/// The single error taxonomy surfaced by the HTTP boundary. Repository and auth
/// components return their own typed errors which convert into this enum; the
/// `IntoResponse` implementation maps every variant onto a status code and a
/// stable machine-readable `code` for the frontend.
///
/// Internal and transient details are logged, never returned to the client.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("email address is already registered")]
    EmailTaken,

    #[error("missing bearer credentials")]
    MissingCredentials,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    Token(TokenError),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// ErrorBody
///
/// Wire format of every error response: `{"error": "...", "code": "..."}`.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::EmailTaken => StatusCode::BAD_REQUEST,
            AppError::Token(TokenError::Signing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MissingCredentials | AppError::InvalidCredentials | AppError::Token(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The stable machine-readable code sent alongside the human message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_failed",
            AppError::EmailTaken => "email_taken",
            AppError::MissingCredentials => "missing_credentials",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Token(TokenError::Expired) => "token_expired",
            AppError::Token(TokenError::InvalidSignature) => "invalid_token",
            AppError::Token(TokenError::Malformed) => "malformed_token",
            AppError::Token(TokenError::Signing(_)) => "internal_error",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Transient(_) => "service_unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Classifies a database failure. Timeouts, pool exhaustion and
    /// connection-level faults are transient; constraint violations map onto
    /// the data taxonomy; everything else is internal.
    pub fn from_db(operation: &'static str, err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::WorkerCrashed => {
                tracing::warn!(operation, error = ?err, "transient database failure");
                AppError::Transient("the database is temporarily unavailable".to_string())
            }
            sqlx::Error::RowNotFound => AppError::NotFound("resource not found".to_string()),
            sqlx::Error::Database(db) => {
                // 57014 query_canceled (statement_timeout), 40001 serialization_failure,
                // 40P01 deadlock_detected, 53300 too_many_connections.
                let transient = db
                    .code()
                    .is_some_and(|code| matches!(&*code, "57014" | "40001" | "40P01" | "53300"));
                if transient {
                    tracing::warn!(operation, error = ?err, "transient database failure");
                    AppError::Transient("the database is temporarily unavailable".to_string())
                } else if db.is_unique_violation() {
                    AppError::Conflict("resource already exists".to_string())
                } else if db.is_foreign_key_violation() {
                    AppError::NotFound("referenced resource not found".to_string())
                } else {
                    tracing::error!(operation, error = ?err, "database error");
                    AppError::Internal(format!("{operation} failed"))
                }
            }
            _ => {
                tracing::error!(operation, error = ?err, "database error");
                AppError::Internal(format!("{operation} failed"))
            }
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(reason) => {
                tracing::error!(%reason, "token signing failed");
                AppError::Internal("token signing failed".to_string())
            }
            other => AppError::Token(other),
        }
    }
}

impl From<HashError> for AppError {
    fn from(err: HashError) -> Self {
        tracing::error!(error = %err, "password hasher failure");
        AppError::Internal("credential processing failed".to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "storage failure");
        AppError::Internal("storage request failed".to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "blocking task failed");
        AppError::Internal("background computation failed".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the logs; the client gets a generic message.
        let message = match &self {
            AppError::Internal(_) => "an unexpected error occurred".to_string(),
            _ => self.to_string(),
        };

        let body = Json(ErrorBody {
            error: message,
            code: self.code().to_string(),
        });

        match self {
            AppError::Transient(_) => (status, [(header::RETRY_AFTER, "1")], body).into_response(),
            _ => (status, body).into_response(),
        }
    }
}
