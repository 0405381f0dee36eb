//! Metadata describing the active model, and the routing policy built on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::registry::RegistryTier;
use crate::engine::{Device, Task};

/// Where a model's artifacts came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Local,
    Hub,
    Registry,
}

impl SourceKind {
    /// Human-readable source label used in model listings.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Local => "Local",
            Self::Hub => "Hugging Face",
            Self::Registry => "MLflow",
        }
    }
}

/// Describes the pipeline currently held by the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub source_uri: String,
    pub source_kind: SourceKind,
    pub task: Task,
    pub device: Device,
    pub revision: Option<String>,
    /// True only when `revision` is a concrete commit hash.
    ///
    /// Hub loads without a reported commit use the last segment of the model
    /// id instead, which identifies nothing; this flag is `false` for those.
    #[serde(default)]
    pub revision_is_commit: bool,
    pub registered_name: Option<String>,
    pub registered_version: Option<String>,
    /// Registry loads only: which fallback tier produced the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_tier: Option<RegistryTier>,
    pub loaded_at: DateTime<Utc>,
}

impl ModelMetadata {
    /// Returns true if a request for `name` under `task` targets this model.
    ///
    /// The task must match exactly. The name matches the registered name,
    /// the full source URI, or the final path segment(s) of the source URI
    /// so that `name` resolves against a hub id like `org/name`.
    pub fn matches(&self, task: Task, name: &str) -> bool {
        self.task == task && self.name_matches(name)
    }

    pub fn name_matches(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        if self.registered_name.as_deref() == Some(name) {
            return true;
        }
        if self.source_uri == name {
            return true;
        }
        self.source_uri
            .strip_suffix(name)
            .is_some_and(|prefix| prefix.ends_with('/'))
    }

    /// Name shown in listings and used in the inference URI.
    pub fn display_name(&self) -> &str {
        self.registered_name.as_deref().unwrap_or(&self.source_uri)
    }

    /// Version shown in listings.
    pub fn display_version(&self) -> &str {
        match self.source_kind {
            SourceKind::Local => "local",
            SourceKind::Hub => self.revision.as_deref().unwrap_or("latest"),
            SourceKind::Registry => self
                .registered_version
                .as_deref()
                .or(self.revision.as_deref())
                .unwrap_or("latest"),
        }
    }

    pub fn descriptor(&self) -> ModelDescriptor {
        let name = self.display_name().to_string();
        ModelDescriptor {
            uri: format!("/infer/{}/{}", self.task, name),
            name,
            version: self.display_version().to_string(),
            model_type: self.task,
            source: self.source_uri.clone(),
            source_type: self.source_kind.label().to_string(),
            loaded_at: self.loaded_at,
            status: "loaded".to_string(),
        }
    }
}

/// Entry of the `/models` listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub model_type: Task,
    pub source: String,
    pub source_type: String,
    pub loaded_at: DateTime<Utc>,
    pub status: String,
    pub uri: String,
}
