//! HTTP surface.
//!
//! A thin axum layer over [`ModelManager`]: it parses requests, maps errors
//! to responses, and owns no lifecycle logic.

mod error;
mod handlers;
pub mod protocol;

pub use error::ApiError;
pub use protocol::{
    ErrorDetail, InferRequest, InferResponse, LoadRequest, LoadResponse, ModelsResponse,
    StopResponse,
};

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::health::HealthChecker;
use crate::models::ModelManager;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ModelManager>,
    pub health: Arc<HealthChecker>,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/models", get(handlers::list_models))
        .route("/load", post(handlers::load))
        .route("/infer/:model_type/*model_name", post(handlers::infer))
        .route("/stop", post(handlers::stop))
        .with_state(state)
}
