//! Model directory discovery and validation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use super::manifest::{ModelManifest, CONFIG_FILE};
use crate::engine::{Device, ModelKwargs, Pipeline, PipelineFactory, PipelineSpec, Task};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Model path not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid model format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported task: {0}")]
    UnsupportedTask(String),

    #[error("Invalid model_kwargs: {0}")]
    InvalidKwargs(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Model or revision not found: {0}")]
    RemoteNotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Unsupported model URI: {0}")]
    UnsupportedUri(String),

    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("Inference backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Device placement failed: {0}")]
    Device(String),

    #[error("Pipeline construction failed: {0}")]
    Pipeline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for LoadError {
    fn from(e: reqwest::Error) -> Self {
        LoadError::Network(e.to_string())
    }
}

/// Tokenizer files, in order of preference.
pub const TOKENIZER_FILES: &[&str] = &["tokenizer.json", "vocab.txt", "vocab.json", "spiece.model"];

/// A directory holding a serialized model with a parsed `config.json`.
#[derive(Debug, Clone)]
pub struct ModelDirectory {
    root: PathBuf,
    manifest: ModelManifest,
}

impl ModelDirectory {
    /// Open a model directory. Requires `config.json`.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        if !path.is_dir() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        let config_path = path.join(CONFIG_FILE);
        if !config_path.is_file() {
            return Err(LoadError::InvalidFormat(format!(
                "{} has no {}",
                path.display(),
                CONFIG_FILE
            )));
        }
        let manifest = ModelManifest::from_file(&config_path)?;
        Ok(Self {
            root: path.to_path_buf(),
            manifest,
        })
    }

    /// Open a directory that must hold both the model and its tokenizer.
    pub fn open_with_tokenizer(path: &Path, task: Task) -> Result<Self, LoadError> {
        let dir = Self::open(path)?;
        if find_tokenizer(path).is_none() {
            return Err(LoadError::InvalidFormat(format!(
                "{} has no tokenizer (expected one of {:?})",
                path.display(),
                TOKENIZER_FILES
            )));
        }
        dir.manifest.check_task(task)?;
        Ok(dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &ModelManifest {
        &self.manifest
    }
}

/// Builds pipelines from model directories off the async runtime.
///
/// Binds every pipeline to the configured device and fills in default
/// kwargs the caller did not set.
#[derive(Clone)]
pub struct ModelLoader {
    factory: Arc<dyn PipelineFactory>,
    device: Device,
    default_kwargs: ModelKwargs,
}

impl ModelLoader {
    pub fn new(factory: Arc<dyn PipelineFactory>, device: Device) -> Self {
        Self {
            factory,
            device,
            default_kwargs: ModelKwargs::new(),
        }
    }

    /// Kwargs applied to every load unless the request sets the same key.
    pub fn with_default_kwargs(mut self, kwargs: ModelKwargs) -> Self {
        self.default_kwargs = kwargs;
        self
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn backend(&self) -> &'static str {
        self.factory.backend()
    }

    /// Request kwargs layered over the defaults.
    pub fn merged_kwargs(&self, kwargs: &ModelKwargs) -> ModelKwargs {
        let mut merged = self.default_kwargs.clone();
        for (k, v) in kwargs {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Spec for a directory holding both model and tokenizer.
    pub fn directory_spec(
        &self,
        path: &Path,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<PipelineSpec, LoadError> {
        let model = ModelDirectory::open_with_tokenizer(path, task)?;
        Ok(PipelineSpec::from_directory(
            model,
            task,
            self.device,
            self.merged_kwargs(kwargs),
        ))
    }

    /// Build a pipeline on the blocking pool.
    pub async fn build(&self, spec: PipelineSpec) -> Result<Box<dyn Pipeline>, LoadError> {
        let factory = Arc::clone(&self.factory);
        tokio::task::spawn_blocking(move || factory.build(&spec))
            .await
            .map_err(|e| LoadError::Pipeline(format!("pipeline construction aborted: {}", e)))?
    }

    /// Validate `path` and build a pipeline from it.
    pub async fn load_directory(
        &self,
        path: &Path,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<Box<dyn Pipeline>, LoadError> {
        let spec = self.directory_spec(path, task, kwargs)?;
        self.build(spec).await
    }
}

impl std::fmt::Debug for ModelLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLoader")
            .field("backend", &self.factory.backend())
            .field("device", &self.device)
            .field("default_kwargs", &self.default_kwargs)
            .finish()
    }
}

/// Returns true if `dir` carries the model-config marker file.
pub fn has_model_config(dir: &Path) -> bool {
    dir.join(CONFIG_FILE).is_file()
}

/// Locate the preferred tokenizer file in `dir`.
pub fn find_tokenizer(dir: &Path) -> Option<PathBuf> {
    TOKENIZER_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}
