//! Model registry loading.
//!
//! A registry artifact may have been logged by any of several mechanisms, so
//! loading walks an ordered chain of tiers and keeps the first pipeline that
//! builds. Intermediate failures are absorbed; only the final outcome is
//! reported.

mod mlflow;
mod mlmodel;
mod s3;
mod uri;

pub use mlflow::{MlflowConfig, MlflowRegistry};
pub use s3::S3Config;
pub use mlmodel::{MlModel, OnnxFlavor, PyFuncFlavor, TransformersFlavor, MLMODEL_FILE};
pub use uri::{registered_model_uri, ModelUri, VersionSelector};

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::loader::{has_model_config, LoadError, ModelLoader};
use crate::engine::{ModelKwargs, Pipeline, Task};

/// One step of the registry fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryTier {
    /// The artifact is a natively flavored pipeline.
    Flavored,
    /// The raw artifact tree contains a model directory.
    RawArtifacts,
    /// The artifact is a generic predictor.
    Generic,
}

impl RegistryTier {
    /// Tiers in the order they are attempted.
    pub const CHAIN: [RegistryTier; 3] = [Self::Flavored, Self::RawArtifacts, Self::Generic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flavored => "flavored",
            Self::RawArtifacts => "raw_artifacts",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for RegistryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities a registry backend provides to the fallback chain.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Load the artifact as a natively flavored pipeline.
    async fn load_flavored(
        &self,
        uri: &str,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<Box<dyn Pipeline>, LoadError>;

    /// Download the raw artifact tree and return its local root.
    async fn download_artifacts(&self, uri: &str) -> Result<PathBuf, LoadError>;

    /// Load the artifact as a flavor-agnostic predictor.
    async fn load_generic(
        &self,
        uri: &str,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<Box<dyn Pipeline>, LoadError>;
}

/// Walk the fallback chain and return the first pipeline that builds.
///
/// Fails with [`LoadError::UnsupportedFormat`] carrying the last tier's cause
/// when every tier fails.
pub async fn load_with_fallback(
    client: &dyn RegistryClient,
    loader: &ModelLoader,
    uri: &str,
    task: Task,
    kwargs: &ModelKwargs,
) -> Result<(Box<dyn Pipeline>, RegistryTier), LoadError> {
    let mut last_error = None;

    for tier in RegistryTier::CHAIN {
        let attempt = match tier {
            RegistryTier::Flavored => client.load_flavored(uri, task, kwargs).await,
            RegistryTier::RawArtifacts => load_raw_artifacts(client, loader, uri, task, kwargs).await,
            RegistryTier::Generic => client.load_generic(uri, task, kwargs).await,
        };
        match attempt {
            Ok(pipeline) => {
                info!(uri = %uri, tier = %tier, "Registry model resolved");
                return Ok((pipeline, tier));
            }
            Err(e) => {
                debug!(uri = %uri, tier = %tier, error = %e, "Registry tier failed");
                last_error = Some(e);
            }
        }
    }

    let cause = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no loading tier applies".to_string());
    Err(LoadError::UnsupportedFormat(format!("{}: {}", uri, cause)))
}

async fn load_raw_artifacts(
    client: &dyn RegistryClient,
    loader: &ModelLoader,
    uri: &str,
    task: Task,
    kwargs: &ModelKwargs,
) -> Result<Box<dyn Pipeline>, LoadError> {
    let root = client.download_artifacts(uri).await?;
    if !has_model_config(&root) {
        return Err(LoadError::InvalidFormat(format!(
            "downloaded artifacts at {} have no model config",
            root.display()
        )));
    }
    loader.load_directory(&root, task, kwargs).await
}
