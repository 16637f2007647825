//! Conversions from Axum's extractor rejections into [`AppError`].

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;

use super::error::AppError;

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::RequestFormat(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::RequestFormat(rejection.body_text())
    }
}
