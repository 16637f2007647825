//! Centralized error type for the HTTP layer and its JSON rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

use super::storage::StorageError;
use super::verifier::VerifierError;

const INTERNAL_MSG: &str = "An internal server error occurred";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request format: {0}")]
    RequestFormat(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // Internal Libraries
    #[error("Token verification failed")]
    Verifier(#[from] VerifierError),

    #[error("Storage operation failed")]
    Storage(#[from] StorageError),

    // Third Party Libraries
    #[error("Datastore operation failed")]
    Database(DbErr),

    #[error("Multipart operation failed")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("An internal server error occurred")]
    Internal,
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        // The store's unique key is the only guard against duplicate subjects.
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => AppError::Conflict(detail),
            _ => AppError::Database(err),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, error) = match self {
            AppError::RequestFormat(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),

            // Internal Libraries
            AppError::Verifier(err) => {
                match err {
                    VerifierError::KeyFetch(_) | VerifierError::Credentials(_) | VerifierError::CredentialsFormat(_) => {
                        tracing::error!("Token verifier error: {:?}", err)
                    },
                    _ => tracing::debug!("Token rejected: {}", err),
                }
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string(), Some(err.to_string()))
            },
            AppError::Storage(err) => {
                tracing::error!("Storage error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Error storing uploaded file".to_string(), Some(err.to_string()))
            },

            // Third Party Libraries
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Datastore operation failed".to_string(), Some(err.to_string()))
            },
            AppError::Multipart(err) => {
                tracing::warn!("Multipart request error: {:?}", err);
                (StatusCode::BAD_REQUEST, "Invalid multipart form data".to_string(), Some(err.body_text()))
            },
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MSG.to_string(), None),
        };

        (status, Json(ErrorResponse { message, error })).into_response()
    }
}
