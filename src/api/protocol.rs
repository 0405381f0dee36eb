//! Request and response bodies for the HTTP API.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::ApiError;
use crate::engine::{ModelKwargs, Prediction, Task};
use crate::models::registry::registered_model_uri;
use crate::models::{HubRequest, ModelDescriptor, ModelMetadata, ModelSource, RegistryRequest};

/// Body of `POST /load`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadRequest {
    /// Task the model is loaded for; required.
    pub model_type: String,
    #[serde(default)]
    pub registered_model_name: Option<String>,
    #[serde(default)]
    pub registered_model_version: Option<String>,
    #[serde(default)]
    pub local_model_path: Option<String>,
    #[serde(default)]
    pub huggingface_model_id: Option<String>,
    #[serde(default)]
    pub huggingface_revision: Option<String>,
    #[serde(default)]
    pub huggingface_token: Option<String>,
    /// Raw registry URI (`models:/…`, `runs:/…`, …).
    #[serde(default)]
    pub model_uri: Option<String>,
    #[serde(default)]
    pub model_kwargs: Option<ModelKwargs>,
}

/// A load request resolved to one source.
#[derive(Debug, Clone)]
pub struct ResolvedLoad {
    pub source: ModelSource,
    pub task: Task,
    pub kwargs: ModelKwargs,
}

fn present(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl LoadRequest {
    /// Pick the source to load from.
    ///
    /// Precedence: local path, then hub id, then registered name + version,
    /// then a raw model URI. Fields belonging to lower-precedence sources are
    /// ignored with a warning.
    pub fn resolve(&self) -> Result<ResolvedLoad, ApiError> {
        let task = self.model_type.trim().parse::<Task>()?;
        let kwargs = self.model_kwargs.clone().unwrap_or_default();

        let local = present(&self.local_model_path);
        let hub_id = present(&self.huggingface_model_id);
        let name = present(&self.registered_model_name);
        let version = present(&self.registered_model_version);
        let uri = present(&self.model_uri);

        let source = if let Some(path) = local {
            self.warn_ignored("local_model_path", hub_id.is_some() || name.is_some() || uri.is_some());
            ModelSource::Local(path.into())
        } else if let Some(model_id) = hub_id {
            self.warn_ignored("huggingface_model_id", name.is_some() || uri.is_some());
            ModelSource::Hub(HubRequest {
                model_id,
                revision: present(&self.huggingface_revision),
                auth_token: present(&self.huggingface_token),
            })
        } else if let (Some(name), Some(version)) = (name.clone(), version.clone()) {
            self.warn_ignored("registered_model_name", uri.is_some());
            ModelSource::Registry(RegistryRequest {
                model_uri: registered_model_uri(&name, &version),
                registered_name: Some(name),
                registered_version: Some(version),
                revision: None,
            })
        } else if let Some(model_uri) = uri {
            ModelSource::Registry(RegistryRequest {
                model_uri,
                registered_name: name,
                registered_version: version,
                revision: None,
            })
        } else {
            return Err(ApiError::Validation(
                "Either local_model_path or huggingface_model_id must be provided, \
                 or both registered_model_name and registered_model_version must be set."
                    .into(),
            ));
        };

        Ok(ResolvedLoad {
            source,
            task,
            kwargs,
        })
    }

    fn warn_ignored(&self, chosen: &str, others_present: bool) {
        if others_present {
            warn!(chosen = chosen, "Load request names several sources; lower-precedence fields ignored");
        }
    }
}

/// Body of a successful `POST /load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    pub status: String,
    pub model: ModelMetadata,
}

impl LoadResponse {
    pub fn loaded(model: ModelMetadata) -> Self {
        Self {
            status: "loaded".to_string(),
            model,
        }
    }
}

/// Body of `POST /infer/{model_type}/{model_name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferRequest {
    pub texts: Vec<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Inference outcome. Errors are reported in the body, not the status code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InferResponse {
    Success { predictions: Vec<Prediction> },
    Error { message: String },
}

impl InferResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Body of `GET /models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelDescriptor>,
    pub count: usize,
}

impl From<Vec<ModelDescriptor>> for ModelsResponse {
    fn from(models: Vec<ModelDescriptor>) -> Self {
        Self {
            count: models.len(),
            models,
        }
    }
}

/// Body of `POST /stop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub status: String,
}

impl StopResponse {
    pub fn stopped() -> Self {
        Self {
            status: "stopped".to_string(),
        }
    }
}

/// Error body for non-inference endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InferenceError;
    use serde_json::json;

    fn request(value: serde_json::Value) -> LoadRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_local_path_takes_precedence() {
        let req = request(json!({
            "model_type": "text-classification",
            "local_model_path": "/models/sentiment",
            "huggingface_model_id": "org/name",
            "registered_model_name": "foo",
            "registered_model_version": "1"
        }));
        let resolved = req.resolve().unwrap();
        assert!(matches!(resolved.source, ModelSource::Local(p) if p.to_str() == Some("/models/sentiment")));
    }

    #[test]
    fn test_hub_over_registry() {
        let req = request(json!({
            "model_type": "text-classification",
            "huggingface_model_id": "org/name",
            "huggingface_revision": "v1",
            "registered_model_name": "foo",
            "registered_model_version": "1"
        }));
        match req.resolve().unwrap().source {
            ModelSource::Hub(hub) => {
                assert_eq!(hub.model_id, "org/name");
                assert_eq!(hub.revision.as_deref(), Some("v1"));
                assert!(hub.auth_token.is_none());
            }
            other => panic!("expected hub source, got {:?}", other),
        }
    }

    #[test]
    fn test_registered_name_and_version() {
        let req = request(json!({
            "model_type": "text-classification",
            "registered_model_name": "foo",
            "registered_model_version": "Production",
            "model_kwargs": {"max_length": 64}
        }));
        let resolved = req.resolve().unwrap();
        assert_eq!(resolved.kwargs["max_length"], 64);
        match resolved.source {
            ModelSource::Registry(r) => {
                assert_eq!(r.model_uri, "models:/foo/Production");
                assert_eq!(r.registered_name.as_deref(), Some("foo"));
                assert_eq!(r.registered_version.as_deref(), Some("Production"));
            }
            other => panic!("expected registry source, got {:?}", other),
        }
    }

    #[test]
    fn test_raw_model_uri() {
        let req = request(json!({
            "model_type": "text-classification",
            "model_uri": "runs:/abc/model",
            "registered_model_name": "foo"
        }));
        match req.resolve().unwrap().source {
            ModelSource::Registry(r) => {
                assert_eq!(r.model_uri, "runs:/abc/model");
                assert_eq!(r.registered_name.as_deref(), Some("foo"));
            }
            other => panic!("expected registry source, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_source_rejected() {
        let req = request(json!({"model_type": "text-classification", "registered_model_name": "foo"}));
        assert!(matches!(
            req.resolve(),
            Err(ApiError::Validation(_))
        ));

        let blank = request(json!({"model_type": "text-classification", "local_model_path": "  "}));
        assert!(blank.resolve().is_err());
    }

    #[test]
    fn test_unsupported_model_type_rejected() {
        let req = request(json!({"model_type": "summarization", "local_model_path": "/m"}));
        assert!(matches!(
            req.resolve(),
            Err(ApiError::Inference(InferenceError::UnsupportedTask(_)))
        ));
    }

    #[test]
    fn test_model_type_required() {
        let missing = serde_json::from_value::<LoadRequest>(json!({"local_model_path": "/m"}));
        assert!(missing.is_err());

        let blank = request(json!({"model_type": " ", "local_model_path": "/m"}));
        assert!(matches!(
            blank.resolve(),
            Err(ApiError::Inference(InferenceError::UnsupportedTask(_)))
        ));
    }

    #[test]
    fn test_infer_response_shape() {
        let ok = serde_json::to_value(InferResponse::Success { predictions: vec![] }).unwrap();
        assert_eq!(ok, json!({"status": "success", "predictions": []}));
        let err = serde_json::to_value(InferResponse::error("boom")).unwrap();
        assert_eq!(err, json!({"status": "error", "message": "boom"}));
    }
}
