//! Inference Server
//!
//! Serves one text-classification model at a time over HTTP. The model can
//! come from a local directory, a model hub, or an MLflow registry; loading a
//! new model replaces the previous one.
//!
//! # Layout
//!
//! - `models`: model lifecycle, sources and the single-slot manager
//! - `engine`: pipeline trait, request validation and the ONNX backend
//! - `api`: axum routes over the manager
//! - `config`, `telemetry`, `health`: ambient server concerns
//! - `cli`: client-side subcommands of the binary

pub mod api;
pub mod cli;
pub mod config;
pub mod engine;
pub mod health;
pub mod models;
pub mod telemetry;

use std::sync::Arc;

use axum::Router;

use api::AppState;
use config::EnvConfig;
use engine::{OnnxPipelineFactory, PipelineFactory};
use health::HealthChecker;
use models::{HttpHub, LoadError, MlflowRegistry, ModelLoader, ModelManager};

/// The server instance: the model manager plus what the HTTP layer needs.
pub struct Runtime {
    pub manager: Arc<ModelManager>,
    pub health: Arc<HealthChecker>,
    /// Name of the pipeline backend models are built with.
    pub backend: &'static str,
}

impl Runtime {
    /// Build a runtime with the ONNX backend and network-backed model sources.
    pub fn new(config: &EnvConfig) -> Result<Self, LoadError> {
        Self::with_factory(config, Arc::new(OnnxPipelineFactory))
    }

    /// Build a runtime around a specific pipeline backend.
    pub fn with_factory(
        config: &EnvConfig,
        factory: Arc<dyn PipelineFactory>,
    ) -> Result<Self, LoadError> {
        let loader = ModelLoader::new(factory, config.device)
            .with_default_kwargs(config.default_model_kwargs());
        let hub = HttpHub::new(
            &config.hub.endpoint,
            &config.cache_dir,
            config.request_timeout,
            config.hub.token.clone(),
        )?;
        let backend = loader.backend();
        let registry = MlflowRegistry::new(config.mlflow_config(), loader.clone())?;
        let manager = ModelManager::new(loader, Arc::new(hub), Arc::new(registry));

        Ok(Self {
            manager: Arc::new(manager),
            health: Arc::new(HealthChecker::new()),
            backend,
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            manager: self.manager.clone(),
            health: self.health.clone(),
        }
    }

    /// HTTP router bound to this runtime.
    pub fn router(&self) -> Router {
        api::router(self.app_state())
    }
}
