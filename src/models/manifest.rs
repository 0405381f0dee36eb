//! `config.json` parsing for serialized transformer models.
//!
//! The model config doubles as the manifest: it names the architecture, the
//! label mapping, and sometimes the commit the snapshot was taken from.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::loader::LoadError;
use crate::engine::Task;

/// Name of the marker file that identifies a model directory.
pub const CONFIG_FILE: &str = "config.json";

/// Subset of a transformers `config.json` used for serving.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Architecture class names (e.g. "DistilBertForSequenceClassification").
    #[serde(default)]
    pub architectures: Vec<String>,
    /// Model family (e.g. "distilbert").
    #[serde(default)]
    pub model_type: Option<String>,
    /// Class index → label name. Keys are stringified integers.
    #[serde(default)]
    pub id2label: BTreeMap<String, String>,
    /// Declared label count when `id2label` is absent.
    #[serde(default)]
    pub num_labels: Option<usize>,
    /// Commit hash recorded by the hub client that produced the snapshot.
    #[serde(default, rename = "_commit_hash")]
    pub commit_hash: Option<String>,
    /// Longest sequence the position embeddings support.
    #[serde(default)]
    pub max_position_embeddings: Option<usize>,
}

impl ModelManifest {
    /// Load manifest from a `config.json` file.
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LoadError::InvalidFormat(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse manifest from JSON string.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        serde_json::from_str(json)
            .map_err(|e| LoadError::InvalidFormat(format!("invalid config.json: {}", e)))
    }

    /// Check that the declared architecture can serve `task`.
    ///
    /// A config without an architecture list is accepted; the backend decides.
    pub fn check_task(&self, task: Task) -> Result<(), LoadError> {
        if self.architectures.is_empty() {
            return Ok(());
        }
        let supported = match task {
            Task::TextClassification => self
                .architectures
                .iter()
                .any(|a| a.ends_with("ForSequenceClassification")),
        };
        if supported {
            Ok(())
        } else {
            Err(LoadError::UnsupportedTask(format!(
                "architecture {:?} cannot serve {}",
                self.architectures, task
            )))
        }
    }

    /// Label names ordered by class index.
    ///
    /// Falls back to `LABEL_<i>` names, as transformers does, when the config
    /// has no explicit mapping.
    pub fn labels(&self) -> Vec<String> {
        if !self.id2label.is_empty() {
            let mut indexed: Vec<(usize, &String)> = self
                .id2label
                .iter()
                .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v)))
                .collect();
            indexed.sort_by_key(|(i, _)| *i);
            return indexed.into_iter().map(|(_, v)| v.clone()).collect();
        }
        let n = self.num_labels.unwrap_or(2);
        (0..n).map(|i| format!("LABEL_{}", i)).collect()
    }
}
