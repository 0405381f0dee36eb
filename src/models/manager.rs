//! Single-slot model lifecycle manager.
//!
//! Holds at most one loaded pipeline with its metadata. Every operation,
//! reads included, runs under one async mutex for its full duration, so a
//! prediction never observes a half-replaced model and a load queues behind
//! an in-flight prediction instead of swapping the model out from under it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;
use tracing::info;

use super::hub::{fallback_revision, HubClient, HubRequest};
use super::loader::{LoadError, ModelLoader};
use super::metadata::{ModelDescriptor, ModelMetadata, SourceKind};
use super::registry::{load_with_fallback, RegistryClient, RegistryTier};
use crate::engine::{validate_request, InferenceError, ModelKwargs, Pipeline, Prediction, Task};

/// Registry load parameters.
#[derive(Debug, Clone, Default)]
pub struct RegistryRequest {
    pub model_uri: String,
    pub registered_name: Option<String>,
    pub registered_version: Option<String>,
    /// Caller-supplied revision, recorded verbatim.
    pub revision: Option<String>,
}

/// Where to load a model from.
#[derive(Debug, Clone)]
pub enum ModelSource {
    Local(PathBuf),
    Hub(HubRequest),
    Registry(RegistryRequest),
}

impl ModelSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Local(_) => SourceKind::Local,
            Self::Hub(_) => SourceKind::Hub,
            Self::Registry(_) => SourceKind::Registry,
        }
    }
}

struct ActiveModel {
    pipeline: Arc<dyn Pipeline>,
    metadata: ModelMetadata,
}

#[derive(Default)]
struct ModelSlot {
    active: Option<ActiveModel>,
    last_loaded_at: Option<DateTime<Utc>>,
}

impl ModelSlot {
    /// Strictly increasing load timestamp.
    fn next_loaded_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_loaded_at {
            Some(prev) if now <= prev => prev + ChronoDuration::microseconds(1),
            _ => now,
        };
        self.last_loaded_at = Some(stamp);
        stamp
    }
}

/// Pipeline and metadata fields produced by one loading strategy.
struct Loaded {
    pipeline: Box<dyn Pipeline>,
    source_uri: String,
    revision: Option<String>,
    revision_is_commit: bool,
    registered_name: Option<String>,
    registered_version: Option<String>,
    registry_tier: Option<RegistryTier>,
}

/// Owns the model slot.
pub struct ModelManager {
    slot: Mutex<ModelSlot>,
    loader: ModelLoader,
    hub: Arc<dyn HubClient>,
    registry: Arc<dyn RegistryClient>,
}

impl ModelManager {
    pub fn new(loader: ModelLoader, hub: Arc<dyn HubClient>, registry: Arc<dyn RegistryClient>) -> Self {
        Self {
            slot: Mutex::new(ModelSlot::default()),
            loader,
            hub,
            registry,
        }
    }

    /// Load from any source, replacing the active model on success.
    ///
    /// A failed load leaves the previous model in place.
    pub async fn load(
        &self,
        source: ModelSource,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<ModelMetadata, LoadError> {
        let mut slot = self.slot.lock().await;
        let kind = source.kind();

        let loaded = match source {
            ModelSource::Local(path) => self.resolve_local(&path, task, kwargs).await?,
            ModelSource::Hub(request) => self.resolve_hub(&request, task, kwargs).await?,
            ModelSource::Registry(request) => self.resolve_registry(request, task, kwargs).await?,
        };

        if loaded.pipeline.task() != task {
            return Err(LoadError::UnsupportedTask(format!(
                "pipeline serves {}, requested {}",
                loaded.pipeline.task(),
                task
            )));
        }

        let metadata = ModelMetadata {
            source_uri: loaded.source_uri,
            source_kind: kind,
            task,
            device: self.loader.device(),
            revision: loaded.revision,
            revision_is_commit: loaded.revision_is_commit,
            registered_name: loaded.registered_name,
            registered_version: loaded.registered_version,
            registry_tier: loaded.registry_tier,
            loaded_at: slot.next_loaded_at(),
        };

        let replaced = slot.active.replace(ActiveModel {
            pipeline: Arc::from(loaded.pipeline),
            metadata: metadata.clone(),
        });
        info!(
            source_kind = ?metadata.source_kind,
            source_uri = %metadata.source_uri,
            revision = ?metadata.revision,
            tier = ?metadata.registry_tier,
            replaced = replaced.is_some(),
            "Model loaded"
        );
        Ok(metadata)
    }

    pub async fn load_from_local(
        &self,
        path: impl AsRef<Path>,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<ModelMetadata, LoadError> {
        self.load(ModelSource::Local(path.as_ref().to_path_buf()), task, kwargs)
            .await
    }

    pub async fn load_from_hub(
        &self,
        request: HubRequest,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<ModelMetadata, LoadError> {
        self.load(ModelSource::Hub(request), task, kwargs).await
    }

    pub async fn load_from_registry(
        &self,
        request: RegistryRequest,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<ModelMetadata, LoadError> {
        self.load(ModelSource::Registry(request), task, kwargs).await
    }

    async fn resolve_local(
        &self,
        path: &Path,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<Loaded, LoadError> {
        let pipeline = self.loader.load_directory(path, task, kwargs).await?;
        Ok(Loaded {
            pipeline,
            source_uri: path.display().to_string(),
            revision: None,
            revision_is_commit: false,
            registered_name: None,
            registered_version: None,
            registry_tier: None,
        })
    }

    async fn resolve_hub(
        &self,
        request: &HubRequest,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<Loaded, LoadError> {
        let snapshot = self.hub.fetch(request).await?;
        let pipeline = self
            .loader
            .load_directory(&snapshot.local_dir, task, kwargs)
            .await?;

        let commit = pipeline
            .commit_hash()
            .map(str::to_string)
            .or(snapshot.commit_hash);
        let (revision, revision_is_commit) = match commit {
            Some(hash) => (hash, true),
            None => (fallback_revision(&request.model_id), false),
        };

        Ok(Loaded {
            pipeline,
            source_uri: request.model_id.clone(),
            revision: Some(revision),
            revision_is_commit,
            registered_name: None,
            registered_version: None,
            registry_tier: None,
        })
    }

    async fn resolve_registry(
        &self,
        request: RegistryRequest,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<Loaded, LoadError> {
        let (pipeline, tier) = load_with_fallback(
            self.registry.as_ref(),
            &self.loader,
            &request.model_uri,
            task,
            kwargs,
        )
        .await?;

        Ok(Loaded {
            pipeline,
            source_uri: request.model_uri,
            revision: request.revision,
            revision_is_commit: false,
            registered_name: request.registered_name,
            registered_version: request.registered_version,
            registry_tier: Some(tier),
        })
    }

    /// Classify `texts` with the active model.
    pub async fn predict(
        &self,
        texts: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<Prediction>, InferenceError> {
        validate_request(texts, top_k)?;
        let slot = self.slot.lock().await;
        let active = slot.active.as_ref().ok_or(InferenceError::ModelNotLoaded)?;
        run_pipeline(active, texts, top_k).await
    }

    /// Classify `texts` only if the active model is the one requested.
    ///
    /// Request shape is validated before locking. The load-state check,
    /// the identity check and the prediction share one lock acquisition.
    pub async fn predict_for(
        &self,
        task: Task,
        name: &str,
        texts: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<Prediction>, InferenceError> {
        validate_request(texts, top_k)?;
        let slot = self.slot.lock().await;
        let active = slot.active.as_ref().ok_or(InferenceError::ModelNotLoaded)?;
        if !active.metadata.matches(task, name) {
            return Err(InferenceError::ModelMismatch {
                requested: name.to_string(),
                task: task.to_string(),
                loaded: active.metadata.display_name().to_string(),
            });
        }
        run_pipeline(active, texts, top_k).await
    }

    /// Drop the active model. Returns whether one was loaded.
    pub async fn unload(&self) -> bool {
        let mut slot = self.slot.lock().await;
        match slot.active.take() {
            Some(previous) => {
                info!(source_uri = %previous.metadata.source_uri, "Model unloaded");
                true
            }
            None => false,
        }
    }

    pub async fn is_loaded(&self) -> bool {
        self.slot.lock().await.active.is_some()
    }

    /// Copy of the active model's metadata.
    pub async fn info(&self) -> Option<ModelMetadata> {
        self.slot
            .lock()
            .await
            .active
            .as_ref()
            .map(|a| a.metadata.clone())
    }

    /// Listing entries for the active model (zero or one).
    pub async fn descriptors(&self) -> Vec<ModelDescriptor> {
        self.slot
            .lock()
            .await
            .active
            .as_ref()
            .map(|a| a.metadata.descriptor())
            .into_iter()
            .collect()
    }

    pub fn loader(&self) -> &ModelLoader {
        &self.loader
    }
}

async fn run_pipeline(
    active: &ActiveModel,
    texts: &[String],
    top_k: Option<usize>,
) -> Result<Vec<Prediction>, InferenceError> {
    let pipeline = Arc::clone(&active.pipeline);
    let batch = texts.to_vec();
    let expected = batch.len();

    let predictions = tokio::task::spawn_blocking(move || pipeline.predict(&batch, top_k))
        .await
        .map_err(|e| InferenceError::ModelError(format!("prediction aborted: {}", e)))??;

    if predictions.len() != expected {
        return Err(InferenceError::ModelError(format!(
            "pipeline returned {} predictions for {} inputs",
            predictions.len(),
            expected
        )));
    }
    Ok(predictions)
}
