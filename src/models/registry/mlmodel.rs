//! `MLmodel` descriptor parsing.
//!
//! Every logged MLflow model carries an `MLmodel` YAML file listing the
//! flavors it can be loaded as. Only the flavors the registry tiers consume
//! are modeled here.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::models::loader::LoadError;

pub const MLMODEL_FILE: &str = "MLmodel";

pub const TRANSFORMERS_FLAVOR: &str = "transformers";
pub const PYFUNC_FLAVOR: &str = "python_function";
pub const ONNX_FLAVOR: &str = "onnx";

#[derive(Debug, Clone, Deserialize)]
pub struct MlModel {
    #[serde(default)]
    pub artifact_path: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub flavors: BTreeMap<String, serde_yaml::Value>,
}

/// The `transformers` flavor block.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformersFlavor {
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default = "default_model_binary")]
    pub model_binary: String,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub source_model_name: Option<String>,
}

fn default_model_binary() -> String {
    "model".to_string()
}

/// The `python_function` flavor block.
#[derive(Debug, Clone, Deserialize)]
pub struct PyFuncFlavor {
    pub loader_module: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// The `onnx` flavor block.
#[derive(Debug, Clone, Deserialize)]
pub struct OnnxFlavor {
    pub data: String,
}

impl MlModel {
    /// Read `MLmodel` from an artifact directory.
    pub fn from_dir(dir: &Path) -> Result<Self, LoadError> {
        let path = dir.join(MLMODEL_FILE);
        if !path.is_file() {
            return Err(LoadError::InvalidFormat(format!(
                "{} has no {}",
                dir.display(),
                MLMODEL_FILE
            )));
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, LoadError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| LoadError::InvalidFormat(format!("invalid MLmodel: {}", e)))
    }

    pub fn has_flavor(&self, name: &str) -> bool {
        self.flavors.contains_key(name)
    }

    fn flavor<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, LoadError> {
        match self.flavors.get(name) {
            Some(value) => serde_yaml::from_value(value.clone())
                .map(Some)
                .map_err(|e| LoadError::InvalidFormat(format!("invalid {} flavor: {}", name, e))),
            None => Ok(None),
        }
    }

    pub fn transformers(&self) -> Result<Option<TransformersFlavor>, LoadError> {
        self.flavor(TRANSFORMERS_FLAVOR)
    }

    pub fn pyfunc(&self) -> Result<Option<PyFuncFlavor>, LoadError> {
        self.flavor(PYFUNC_FLAVOR)
    }

    pub fn onnx(&self) -> Result<Option<OnnxFlavor>, LoadError> {
        self.flavor(ONNX_FLAVOR)
    }
}
