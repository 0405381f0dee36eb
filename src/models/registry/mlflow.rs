//! MLflow tracking server / model registry client.
//!
//! Resolves model URIs through the registry REST API, mirrors artifact trees
//! from the tracking server's artifact proxy or an S3 bucket into a local
//! cache, and builds pipelines for the flavored and generic tiers.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::mlmodel::MlModel;
use super::s3::{S3Artifacts, S3Config};
use super::uri::{ModelUri, VersionSelector};
use super::RegistryClient;
use crate::engine::{ModelKwargs, Pipeline, PipelineSpec, Task};
use crate::models::loader::{find_tokenizer, LoadError, ModelDirectory, ModelLoader};
use crate::models::manifest::CONFIG_FILE;

const COMPLETE_MARKER: &str = ".complete";

/// `python_function` loader whose artifacts the generic tier can serve.
const ONNX_LOADER_MODULE: &str = "mlflow.onnx";

#[derive(Debug, Clone)]
pub struct MlflowConfig {
    pub tracking_uri: String,
    /// Registry endpoint. Defaults to the tracking server.
    pub registry_uri: Option<String>,
    pub cache_dir: PathBuf,
    pub timeout: Duration,
    /// Bucket access for `s3://` artifact locations.
    pub s3: S3Config,
}

/// Where a resolved artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ArtifactLocation {
    /// Path served by the tracking server's artifact proxy.
    Remote(String),
    S3 { bucket: String, key: String },
    Local(PathBuf),
}

impl ArtifactLocation {
    /// Identity of a downloadable location, used as its cache key.
    fn cache_key(&self) -> Option<String> {
        match self {
            Self::Remote(path) => Some(path.clone()),
            Self::S3 { bucket, key } => Some(format!("s3://{}/{}", bucket, key)),
            Self::Local(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DownloadUriResponse {
    artifact_uri: String,
}

#[derive(Debug, Serialize)]
struct LatestVersionsRequest<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stages: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct LatestVersionsResponse {
    #[serde(default)]
    model_versions: Vec<ModelVersion>,
}

#[derive(Debug, Deserialize)]
struct ModelVersion {
    version: String,
}

#[derive(Debug, Deserialize)]
struct AliasResponse {
    model_version: ModelVersion,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    run: Run,
}

#[derive(Debug, Deserialize)]
struct Run {
    info: RunInfo,
}

#[derive(Debug, Deserialize)]
struct RunInfo {
    artifact_uri: String,
}

#[derive(Debug, Deserialize)]
struct ListArtifactsResponse {
    #[serde(default)]
    files: Vec<ArtifactEntry>,
}

#[derive(Debug, Deserialize)]
struct ArtifactEntry {
    path: String,
    #[serde(default)]
    is_dir: bool,
}

#[derive(Debug, Deserialize)]
struct MlflowErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Registry client backed by an MLflow server.
pub struct MlflowRegistry {
    client: Client,
    tracking_uri: String,
    registry_uri: String,
    cache_dir: PathBuf,
    loader: ModelLoader,
    s3: S3Artifacts,
    downloads: Mutex<HashMap<String, PathBuf>>,
}

impl MlflowRegistry {
    pub fn new(config: MlflowConfig, loader: ModelLoader) -> Result<Self, LoadError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let tracking_uri = config.tracking_uri.trim_end_matches('/').to_string();
        let registry_uri = config
            .registry_uri
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| tracking_uri.clone());
        Ok(Self {
            client,
            tracking_uri,
            registry_uri,
            cache_dir: config.cache_dir.join("registry"),
            loader,
            s3: S3Artifacts::new(config.s3, config.timeout),
            downloads: Mutex::new(HashMap::new()),
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, LoadError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| LoadError::Network(format!("invalid response for {}: {}", what, e)));
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<MlflowErrorBody>(&body)
            .ok()
            .and_then(|e| match (e.error_code, e.message) {
                (Some(code), Some(msg)) => Some(format!("{}: {}", code, msg)),
                (None, Some(msg)) => Some(msg),
                (Some(code), None) => Some(code),
                (None, None) => None,
            })
            .unwrap_or(body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(LoadError::Unauthorized(format!("{} ({})", what, detail)))
            }
            StatusCode::NOT_FOUND => Err(LoadError::RemoteNotFound(format!("{} ({})", what, detail))),
            _ => Err(LoadError::Network(format!(
                "MLflow returned {} for {}: {}",
                status, what, detail
            ))),
        }
    }

    async fn download_uri(&self, name: &str, version: &str) -> Result<String, LoadError> {
        let url = format!(
            "{}/api/2.0/mlflow/model-versions/get-download-uri",
            self.registry_uri
        );
        let request = self
            .client
            .get(url)
            .query(&[("name", name), ("version", version)]);
        let response: DownloadUriResponse = self
            .send(request, &format!("model {} version {}", name, version))
            .await?;
        Ok(response.artifact_uri)
    }

    async fn latest_version(&self, name: &str, stage: Option<&str>) -> Result<String, LoadError> {
        let url = format!(
            "{}/api/2.0/mlflow/registered-models/get-latest-versions",
            self.registry_uri
        );
        let body = LatestVersionsRequest {
            name,
            stages: stage.into_iter().collect(),
        };
        let response: LatestVersionsResponse = self
            .send(self.client.post(url).json(&body), &format!("model {}", name))
            .await?;

        response
            .model_versions
            .into_iter()
            .max_by_key(|v| v.version.parse::<u64>().unwrap_or(0))
            .map(|v| v.version)
            .ok_or_else(|| {
                LoadError::RemoteNotFound(match stage {
                    Some(stage) => format!("model {} has no version in stage {}", name, stage),
                    None => format!("model {} has no versions", name),
                })
            })
    }

    async fn alias_version(&self, name: &str, alias: &str) -> Result<String, LoadError> {
        let url = format!("{}/api/2.0/mlflow/registered-models/alias", self.registry_uri);
        let request = self
            .client
            .get(url)
            .query(&[("name", name), ("alias", alias)]);
        let response: AliasResponse = self
            .send(request, &format!("model {} alias {}", name, alias))
            .await?;
        Ok(response.model_version.version)
    }

    async fn run_artifact_uri(&self, run_id: &str) -> Result<String, LoadError> {
        let url = format!("{}/api/2.0/mlflow/runs/get", self.tracking_uri);
        let request = self.client.get(url).query(&[("run_id", run_id)]);
        let response: RunResponse = self.send(request, &format!("run {}", run_id)).await?;
        Ok(response.run.info.artifact_uri)
    }

    async fn resolve(&self, uri: &ModelUri) -> Result<ArtifactLocation, LoadError> {
        let artifact_uri = match uri {
            ModelUri::Artifacts(path) => return Ok(ArtifactLocation::Remote(path.clone())),
            ModelUri::Local(path) => return Ok(ArtifactLocation::Local(path.clone())),
            ModelUri::S3 { bucket, key } => {
                return Ok(ArtifactLocation::S3 {
                    bucket: bucket.clone(),
                    key: key.clone(),
                })
            }
            ModelUri::Registered { name, selector } => {
                let version = match selector {
                    VersionSelector::Version(v) => v.clone(),
                    VersionSelector::Stage(stage) => self.latest_version(name, Some(stage)).await?,
                    VersionSelector::Latest => self.latest_version(name, None).await?,
                    VersionSelector::Alias(alias) => self.alias_version(name, alias).await?,
                };
                self.download_uri(name, &version).await?
            }
            ModelUri::Run { run_id, path } => {
                let base = self.run_artifact_uri(run_id).await?;
                if path.is_empty() {
                    base
                } else {
                    format!("{}/{}", base.trim_end_matches('/'), path)
                }
            }
        };

        debug!(uri = %uri, artifact_uri = %artifact_uri, "Resolved model URI");
        match ModelUri::parse(&artifact_uri)? {
            ModelUri::Artifacts(path) => Ok(ArtifactLocation::Remote(path)),
            ModelUri::S3 { bucket, key } => Ok(ArtifactLocation::S3 { bucket, key }),
            ModelUri::Local(path) => Ok(ArtifactLocation::Local(path)),
            _ => Err(LoadError::UnsupportedUri(format!(
                "{} resolved to unsupported artifact location {}",
                uri, artifact_uri
            ))),
        }
    }

    /// Mirror the artifact tree at `remote` into `dest`.
    async fn fetch_tree(&self, remote: &str, dest: &Path) -> Result<usize, LoadError> {
        let list_url = format!("{}/api/2.0/mlflow-artifacts/artifacts", self.tracking_uri);
        let mut pending = vec![remote.to_string()];
        let mut files = 0;

        while let Some(dir) = pending.pop() {
            let request = self.client.get(&list_url).query(&[("path", dir.as_str())]);
            let listing: ListArtifactsResponse =
                self.send(request, &format!("artifacts at {}", dir)).await?;

            for entry in listing.files {
                // Servers return either the full path or the basename.
                let child = if entry.path.starts_with(&format!("{}/", dir)) {
                    entry.path.clone()
                } else {
                    let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
                    format!("{}/{}", dir, name)
                };
                let relative = child
                    .strip_prefix(remote)
                    .unwrap_or(&child)
                    .trim_start_matches('/')
                    .to_string();
                ensure_relative(&relative)?;

                if entry.is_dir {
                    pending.push(child);
                } else {
                    self.download_file(&child, &dest.join(&relative)).await?;
                    files += 1;
                }
            }
        }
        Ok(files)
    }

    async fn download_file(&self, remote: &str, dest: &Path) -> Result<(), LoadError> {
        let url = format!(
            "{}/api/2.0/mlflow-artifacts/artifacts/{}",
            self.tracking_uri, remote
        );
        debug!(url = %url, "Downloading artifact");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    LoadError::Unauthorized(remote.to_string())
                }
                StatusCode::NOT_FOUND => LoadError::RemoteNotFound(remote.to_string()),
                _ => LoadError::Network(format!("MLflow returned {} for {}", status, remote)),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    fn cache_path(&self, remote: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(remote.as_bytes()));
        self.cache_dir.join(&digest[..16])
    }

    async fn load_spec(&self, spec: PipelineSpec) -> Result<Box<dyn Pipeline>, LoadError> {
        self.loader.build(spec).await
    }
}

#[async_trait]
impl RegistryClient for MlflowRegistry {
    async fn load_flavored(
        &self,
        uri: &str,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<Box<dyn Pipeline>, LoadError> {
        let root = self.download_artifacts(uri).await?;
        let mlmodel = MlModel::from_dir(&root)?;
        let flavor = mlmodel.transformers()?.ok_or_else(|| {
            LoadError::UnsupportedFormat(format!("{} has no transformers flavor", uri))
        })?;
        if let Some(declared) = &flavor.task {
            if declared != task.as_str() {
                return Err(LoadError::UnsupportedTask(format!(
                    "artifact was logged for {}, requested {}",
                    declared, task
                )));
            }
        }

        ensure_relative(&flavor.model_binary)?;
        let model_root = root.join(&flavor.model_binary);
        let model = ModelDirectory::open(&model_root)?;
        model.manifest().check_task(task)?;

        let tokenizer_dir = if flavor.components.iter().any(|c| c == "tokenizer") {
            root.join("components").join("tokenizer")
        } else {
            model_root
        };
        if find_tokenizer(&tokenizer_dir).is_none() {
            return Err(LoadError::InvalidFormat(format!(
                "no tokenizer in {}",
                tokenizer_dir.display()
            )));
        }

        self.load_spec(PipelineSpec {
            task,
            model,
            tokenizer_dir,
            weights: None,
            device: self.loader.device(),
            kwargs: self.loader.merged_kwargs(kwargs),
        })
        .await
    }

    async fn download_artifacts(&self, uri: &str) -> Result<PathBuf, LoadError> {
        let parsed = ModelUri::parse(uri)?;
        let location = self.resolve(&parsed).await?;
        let key = match location.cache_key() {
            Some(key) => key,
            None => {
                return match location {
                    ArtifactLocation::Local(path) if path.is_dir() => Ok(path),
                    ArtifactLocation::Local(path) => Err(LoadError::NotFound(path)),
                    _ => Err(LoadError::UnsupportedUri(uri.to_string())),
                };
            }
        };

        let cached = self.downloads.lock().get(&key).cloned();
        if let Some(dir) = cached {
            return Ok(dir);
        }

        let dest = self.cache_path(&key);
        if !dest.join(COMPLETE_MARKER).is_file() {
            let files = match &location {
                ArtifactLocation::S3 { bucket, key } => {
                    self.s3.fetch_tree(bucket, key, &dest, ensure_relative).await?
                }
                ArtifactLocation::Remote(remote) => self.fetch_tree(remote, &dest).await?,
                ArtifactLocation::Local(_) => 0,
            };
            if files == 0 {
                return Err(LoadError::RemoteNotFound(format!("no artifacts at {}", key)));
            }
            tokio::fs::write(dest.join(COMPLETE_MARKER), &key).await?;
            info!(uri = %uri, artifacts = %key, files, "Registry artifacts downloaded");
        }

        self.downloads.lock().insert(key, dest.clone());
        Ok(dest)
    }

    async fn load_generic(
        &self,
        uri: &str,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<Box<dyn Pipeline>, LoadError> {
        let root = self.download_artifacts(uri).await?;
        let mlmodel = MlModel::from_dir(&root)?;
        let pyfunc = mlmodel.pyfunc()?.ok_or_else(|| {
            LoadError::UnsupportedFormat(format!("{} has no python_function flavor", uri))
        })?;
        if pyfunc.loader_module != ONNX_LOADER_MODULE {
            return Err(LoadError::UnsupportedFormat(format!(
                "python_function loader {} cannot be served",
                pyfunc.loader_module
            )));
        }

        let data = mlmodel
            .onnx()?
            .map(|f| f.data)
            .or(pyfunc.data)
            .ok_or_else(|| LoadError::InvalidFormat(format!("{} declares no ONNX data", uri)))?;
        ensure_relative(&data)?;
        let weights = root.join(data);

        let config_dir = find_file(&root, CONFIG_FILE)
            .ok_or_else(|| LoadError::InvalidFormat(format!("no {} under {}", CONFIG_FILE, root.display())))?;
        let tokenizer_dir = find_file(&root, "tokenizer.json")
            .ok_or_else(|| LoadError::InvalidFormat(format!("no tokenizer under {}", root.display())))?;

        let model = ModelDirectory::open(&config_dir)?;
        model.manifest().check_task(task)?;

        self.load_spec(PipelineSpec {
            task,
            model,
            tokenizer_dir,
            weights: Some(weights),
            device: self.loader.device(),
            kwargs: self.loader.merged_kwargs(kwargs),
        })
        .await
    }
}

/// Directory of the shallowest file named `name` under `root`.
fn find_file(root: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && e.file_name() == name)
        .min_by_key(|e| e.depth())
        .and_then(|e| e.path().parent().map(Path::to_path_buf))
}

fn ensure_relative(path: &str) -> Result<(), LoadError> {
    let escapes = Path::new(path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        Err(LoadError::InvalidFormat(format!(
            "artifact path escapes the artifact root: {}",
            path
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_relative() {
        assert!(ensure_relative("model/config.json").is_ok());
        assert!(ensure_relative("../etc/passwd").is_err());
        assert!(ensure_relative("/etc/passwd").is_err());
    }

    #[test]
    fn test_find_file_prefers_shallowest() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs::write(tmp.path().join("a/b/config.json"), "{}").unwrap();
        fs::write(tmp.path().join("a/config.json"), "{}").unwrap();
        assert_eq!(find_file(tmp.path(), "config.json").unwrap(), tmp.path().join("a"));
        assert!(find_file(tmp.path(), "tokenizer.json").is_none());
    }
}
