//! Pipeline abstraction: a ready-to-run bundle of tokenizer, model and task.
//!
//! Pipelines are built by a [`PipelineFactory`] from a resolved model
//! directory. Building is blocking work (file IO, graph parsing) and so is
//! prediction; callers move both onto the blocking pool.

use std::path::PathBuf;

use super::config::{Device, ModelKwargs, Task};
use super::error::InferenceError;
use super::output::Prediction;
use crate::models::loader::{LoadError, ModelDirectory};

/// A loaded inference pipeline.
pub trait Pipeline: Send + Sync {
    /// Task this pipeline serves.
    fn task(&self) -> Task;

    /// Commit hash recorded in the model config, when the model came from a hub snapshot.
    fn commit_hash(&self) -> Option<&str> {
        None
    }

    /// Classify a batch of texts. Output order matches input order.
    fn predict(
        &self,
        texts: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<Prediction>, InferenceError>;
}

/// Everything needed to build a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub task: Task,
    pub model: ModelDirectory,
    /// Directory holding the tokenizer files. Often the model directory itself.
    pub tokenizer_dir: PathBuf,
    /// Explicit weights file. When `None`, the backend looks inside the model directory.
    pub weights: Option<PathBuf>,
    pub device: Device,
    pub kwargs: ModelKwargs,
}

impl PipelineSpec {
    /// Spec for a directory that holds both model and tokenizer.
    pub fn from_directory(model: ModelDirectory, task: Task, device: Device, kwargs: ModelKwargs) -> Self {
        let tokenizer_dir = model.root().to_path_buf();
        Self {
            task,
            model,
            tokenizer_dir,
            weights: None,
            device,
            kwargs,
        }
    }
}

/// Builds pipelines from specs. One factory per inference backend.
pub trait PipelineFactory: Send + Sync {
    /// Backend name for logs.
    fn backend(&self) -> &'static str;

    fn build(&self, spec: &PipelineSpec) -> Result<Box<dyn Pipeline>, LoadError>;
}

/// Reject kwargs a backend does not understand.
pub fn check_kwargs(kwargs: &ModelKwargs, accepted: &[&str]) -> Result<(), LoadError> {
    let unknown: Vec<&str> = kwargs
        .keys()
        .map(String::as_str)
        .filter(|k| !accepted.contains(k))
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(LoadError::InvalidKwargs(format!(
            "unrecognized keys {:?} (accepted: {:?})",
            unknown, accepted
        )))
    }
}
