//! API error type and its mapping to HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use super::protocol::{ErrorDetail, InferResponse};
use crate::engine::InferenceError;
use crate::models::LoadError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid request body: {0}")]
    Body(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection.body_text())
    }
}

impl ApiError {
    /// In-body error for the inference endpoint.
    pub fn into_infer_response(self) -> InferResponse {
        InferResponse::error(self.to_string())
    }
}

/// Load and request-shape failures become `400 {"detail": ...}`.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorDetail {
            detail: self.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
