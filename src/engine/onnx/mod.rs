//! ONNX inference backend using Candle.
//!
//! Builds text-classification pipelines from an exported `model.onnx` plus a
//! `tokenizer.json`. Without the `onnx` feature the factory still validates
//! its inputs and then reports the backend as unavailable.

#[cfg(feature = "onnx")]
mod classifier;

#[cfg(feature = "onnx")]
pub use classifier::OnnxClassifier;

use std::path::PathBuf;

use crate::engine::pipeline::{check_kwargs, Pipeline, PipelineFactory, PipelineSpec};
use crate::engine::ModelKwargs;
use crate::models::loader::LoadError;
use crate::models::manifest::ModelManifest;

/// Weight files searched for inside a model directory, in order.
pub const DEFAULT_ONNX_FILES: &[&str] = &["model.onnx", "onnx/model.onnx"];

/// `model_kwargs` keys this backend understands.
pub const ACCEPTED_KWARGS: &[&str] = &["max_length", "onnx_file"];

/// Sequence length used when neither kwargs nor config specify one.
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// Options resolved from `model_kwargs` and the model config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnnxOptions {
    /// Truncation length for tokenized inputs.
    pub max_length: usize,
    /// Weights file relative to the model directory.
    pub onnx_file: Option<String>,
}

impl OnnxOptions {
    pub fn from_kwargs(kwargs: &ModelKwargs, manifest: &ModelManifest) -> Result<Self, LoadError> {
        check_kwargs(kwargs, ACCEPTED_KWARGS)?;

        let max_length = match kwargs.get("max_length") {
            Some(v) => match v.as_u64() {
                Some(n) if n > 0 => n as usize,
                _ => {
                    return Err(LoadError::InvalidKwargs(format!(
                        "max_length must be a positive integer, got {}",
                        v
                    )))
                }
            },
            None => manifest
                .max_position_embeddings
                .unwrap_or(DEFAULT_MAX_LENGTH),
        };

        let onnx_file = match kwargs.get("onnx_file") {
            Some(v) => Some(
                v.as_str()
                    .ok_or_else(|| {
                        LoadError::InvalidKwargs(format!("onnx_file must be a string, got {}", v))
                    })?
                    .to_string(),
            ),
            None => None,
        };

        Ok(Self {
            max_length,
            onnx_file,
        })
    }
}

/// Locate the weights file for a spec.
pub fn resolve_weights(spec: &PipelineSpec, options: &OnnxOptions) -> Result<PathBuf, LoadError> {
    if let Some(weights) = &spec.weights {
        return if weights.is_file() {
            Ok(weights.clone())
        } else {
            Err(LoadError::NotFound(weights.clone()))
        };
    }

    let root = spec.model.root();
    if let Some(file) = &options.onnx_file {
        let path = root.join(file);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(LoadError::NotFound(path))
        };
    }

    DEFAULT_ONNX_FILES
        .iter()
        .map(|f| root.join(f))
        .find(|p| p.is_file())
        .ok_or_else(|| {
            LoadError::InvalidFormat(format!(
                "{} has no ONNX weights (expected one of {:?})",
                root.display(),
                DEFAULT_ONNX_FILES
            ))
        })
}

/// Pipeline factory backed by candle-onnx.
#[derive(Debug, Default, Clone, Copy)]
pub struct OnnxPipelineFactory;

impl PipelineFactory for OnnxPipelineFactory {
    fn backend(&self) -> &'static str {
        "candle-onnx"
    }

    fn build(&self, spec: &PipelineSpec) -> Result<Box<dyn Pipeline>, LoadError> {
        let options = OnnxOptions::from_kwargs(&spec.kwargs, spec.model.manifest())?;
        let weights = resolve_weights(spec, &options)?;
        load_classifier(spec, weights, options)
    }
}

#[cfg(feature = "onnx")]
fn load_classifier(
    spec: &PipelineSpec,
    weights: PathBuf,
    options: OnnxOptions,
) -> Result<Box<dyn Pipeline>, LoadError> {
    let classifier = OnnxClassifier::load(spec, &weights, &options)?;
    Ok(Box::new(classifier))
}

/// Stub for non-onnx builds.
#[cfg(not(feature = "onnx"))]
fn load_classifier(
    _spec: &PipelineSpec,
    _weights: PathBuf,
    _options: OnnxOptions,
) -> Result<Box<dyn Pipeline>, LoadError> {
    Err(LoadError::BackendUnavailable(
        "ONNX support not compiled in. Enable 'onnx' feature.".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Device, Task};
    use crate::models::loader::ModelDirectory;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn spec_for(dir: &TempDir, kwargs: ModelKwargs) -> PipelineSpec {
        fs::write(dir.path().join("config.json"), r#"{"max_position_embeddings": 256}"#).unwrap();
        let model = ModelDirectory::open(dir.path()).unwrap();
        PipelineSpec::from_directory(model, Task::TextClassification, Device::Cpu, kwargs)
    }

    #[test]
    fn test_options_default_to_config_length() {
        let manifest = ModelManifest::from_json(r#"{"max_position_embeddings": 256}"#).unwrap();
        let opts = OnnxOptions::from_kwargs(&ModelKwargs::new(), &manifest).unwrap();
        assert_eq!(opts.max_length, 256);
        assert!(opts.onnx_file.is_none());

        let opts = OnnxOptions::from_kwargs(&ModelKwargs::new(), &ModelManifest::default()).unwrap();
        assert_eq!(opts.max_length, DEFAULT_MAX_LENGTH);
    }

    #[test]
    fn test_options_reject_bad_kwargs() {
        let manifest = ModelManifest::default();

        let mut kwargs = ModelKwargs::new();
        kwargs.insert("max_length".into(), json!(0));
        assert!(matches!(
            OnnxOptions::from_kwargs(&kwargs, &manifest),
            Err(LoadError::InvalidKwargs(_))
        ));

        let mut kwargs = ModelKwargs::new();
        kwargs.insert("return_all_scores".into(), json!(true));
        assert!(matches!(
            OnnxOptions::from_kwargs(&kwargs, &manifest),
            Err(LoadError::InvalidKwargs(_))
        ));
    }

    #[test]
    fn test_resolve_weights_search_order() {
        let tmp = TempDir::new().unwrap();
        let spec = spec_for(&tmp, ModelKwargs::new());
        let opts = OnnxOptions::from_kwargs(&spec.kwargs, spec.model.manifest()).unwrap();
        assert!(matches!(
            resolve_weights(&spec, &opts),
            Err(LoadError::InvalidFormat(_))
        ));

        fs::create_dir(tmp.path().join("onnx")).unwrap();
        fs::write(tmp.path().join("onnx/model.onnx"), b"").unwrap();
        assert_eq!(
            resolve_weights(&spec, &opts).unwrap(),
            tmp.path().join("onnx/model.onnx")
        );

        fs::write(tmp.path().join("model.onnx"), b"").unwrap();
        assert_eq!(
            resolve_weights(&spec, &opts).unwrap(),
            tmp.path().join("model.onnx")
        );
    }

    #[test]
    fn test_resolve_weights_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let mut kwargs = ModelKwargs::new();
        kwargs.insert("onnx_file".into(), json!("quantized.onnx"));
        let spec = spec_for(&tmp, kwargs);
        let opts = OnnxOptions::from_kwargs(&spec.kwargs, spec.model.manifest()).unwrap();

        assert!(matches!(resolve_weights(&spec, &opts), Err(LoadError::NotFound(_))));
        fs::write(tmp.path().join("quantized.onnx"), b"").unwrap();
        assert!(resolve_weights(&spec, &opts).is_ok());
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_factory_without_backend() {
        let tmp = TempDir::new().unwrap();
        let spec = spec_for(&tmp, ModelKwargs::new());
        fs::write(tmp.path().join("model.onnx"), b"").unwrap();
        let err = OnnxPipelineFactory.build(&spec).err().unwrap();
        assert!(matches!(err, LoadError::BackendUnavailable(_)));
    }
}
