//! HTTP handlers. Each one is a thin adapter over the model manager.

use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use tracing::{info, warn, Instrument};

use super::error::ApiError;
use super::protocol::{
    InferRequest, InferResponse, LoadRequest, LoadResponse, ModelsResponse, StopResponse,
};
use super::AppState;
use crate::engine::{validate_request, Task};
use crate::health::HealthReport;
use crate::telemetry::{infer_span, load_span, SpanExt};

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let model = state.manager.info().await;
    Json(state.health.report(model))
}

pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(state.manager.descriptors().await.into())
}

pub async fn load(
    State(state): State<AppState>,
    body: Result<Json<LoadRequest>, JsonRejection>,
) -> Result<Json<LoadResponse>, ApiError> {
    let Json(request) = body?;
    let resolved = request.resolve()?;
    let kind = resolved.source.kind();

    let span = load_span(kind.label());
    let started = Instant::now();
    let result = state
        .manager
        .load(resolved.source, resolved.task, &resolved.kwargs)
        .instrument(span.clone())
        .await;
    span.record_result(&result);
    span.record_latency(started);

    match result {
        Ok(metadata) => Ok(Json(LoadResponse::loaded(metadata))),
        Err(e) => {
            warn!(source_kind = ?kind, error = %e, "Model load failed");
            Err(e.into())
        }
    }
}

pub async fn infer(
    State(state): State<AppState>,
    Path((model_type, model_name)): Path<(String, String)>,
    body: Result<Json<InferRequest>, JsonRejection>,
) -> Json<InferResponse> {
    let batch_size = body.as_ref().map(|Json(r)| r.texts.len()).unwrap_or(0);
    let span = infer_span(&model_type, &model_name, batch_size);
    let started = Instant::now();

    let outcome = async {
        let Json(request) = body?;
        // Shape problems are reported before anything about the model.
        validate_request(&request.texts, request.top_k)?;
        let task: Task = model_type.parse()?;
        let predictions = state
            .manager
            .predict_for(task, &model_name, &request.texts, request.top_k)
            .await?;
        Ok::<_, ApiError>(predictions)
    }
    .instrument(span.clone())
    .await;
    span.record_result(&outcome);
    span.record_latency(started);

    match outcome {
        Ok(predictions) => Json(InferResponse::Success { predictions }),
        Err(e) => Json(e.into_infer_response()),
    }
}

pub async fn stop(State(state): State<AppState>) -> Json<StopResponse> {
    if state.manager.unload().await {
        info!("Model stopped via API");
    }
    Json(StopResponse::stopped())
}
