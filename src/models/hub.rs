//! Model hub client.
//!
//! Resolves a model id (optionally pinned to a revision) against a Hugging
//! Face compatible hub, downloads the files a text-classification pipeline
//! needs into a local snapshot directory, and reports the commit the
//! snapshot was taken from.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::loader::LoadError;
use super::manifest::CONFIG_FILE;

/// Marker written once every file of a snapshot is in place.
const COMPLETE_MARKER: &str = ".complete";

/// Files fetched from a hub repository when present.
const SNAPSHOT_FILES: &[&str] = &[
    CONFIG_FILE,
    "tokenizer.json",
    "tokenizer_config.json",
    "special_tokens_map.json",
    "vocab.txt",
    "vocab.json",
    "merges.txt",
    "spiece.model",
    "model.onnx",
    "onnx/model.onnx",
];

/// A snapshot request.
#[derive(Debug, Clone, Default)]
pub struct HubRequest {
    pub model_id: String,
    pub revision: Option<String>,
    pub auth_token: Option<String>,
}

/// A model snapshot available on local disk.
#[derive(Debug, Clone)]
pub struct HubSnapshot {
    pub local_dir: PathBuf,
    /// Commit the hub resolved the request to, if it reported one.
    pub commit_hash: Option<String>,
}

/// Fetches model snapshots from a hub.
#[async_trait]
pub trait HubClient: Send + Sync {
    async fn fetch(&self, request: &HubRequest) -> Result<HubSnapshot, LoadError>;
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Debug, Deserialize)]
struct Sibling {
    rfilename: String,
    #[serde(default)]
    lfs: Option<LfsInfo>,
}

#[derive(Debug, Deserialize)]
struct LfsInfo {
    sha256: String,
}

/// Hub client speaking the Hugging Face REST API.
#[derive(Debug, Clone)]
pub struct HttpHub {
    client: Client,
    endpoint: String,
    cache_dir: PathBuf,
    default_token: Option<String>,
}

impl HttpHub {
    /// Create a client rooted at `endpoint`, caching snapshots under `cache_dir/hub`.
    pub fn new(
        endpoint: &str,
        cache_dir: &Path,
        timeout: Duration,
        default_token: Option<String>,
    ) -> Result<Self, LoadError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            cache_dir: cache_dir.join("hub"),
            default_token,
        })
    }

    fn authorize(&self, builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token.or(self.default_token.as_deref()) {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn model_info(&self, request: &HubRequest) -> Result<ModelInfo, LoadError> {
        let url = match &request.revision {
            Some(rev) => format!(
                "{}/api/models/{}/revision/{}",
                self.endpoint, request.model_id, rev
            ),
            None => format!("{}/api/models/{}", self.endpoint, request.model_id),
        };
        debug!(url = %url, "Resolving hub model");

        let builder = self.client.get(&url).query(&[("blobs", "true")]);
        let response = self
            .authorize(builder, request.auth_token.as_deref())
            .send()
            .await?;
        let response = check_status(response, request).await?;
        response
            .json::<ModelInfo>()
            .await
            .map_err(|e| LoadError::Network(format!("invalid hub response: {}", e)))
    }

    async fn download(
        &self,
        request: &HubRequest,
        revision: &str,
        sibling: &Sibling,
        dest: &Path,
    ) -> Result<(), LoadError> {
        let url = format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint, request.model_id, revision, sibling.rfilename
        );
        debug!(url = %url, "Downloading hub file");

        let response = self
            .authorize(self.client.get(&url), request.auth_token.as_deref())
            .send()
            .await?;
        let response = check_status(response, request).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut partial = dest.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        if let Some(lfs) = &sibling.lfs {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(&lfs.sha256) {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(LoadError::ChecksumMismatch {
                    file: sibling.rfilename.clone(),
                    expected: lfs.sha256.clone(),
                    actual,
                });
            }
        }

        tokio::fs::rename(&partial, dest).await?;
        Ok(())
    }

    fn snapshot_dir(&self, model_id: &str, revision: &str) -> PathBuf {
        self.cache_dir
            .join(model_id.replace('/', "--"))
            .join(revision.replace('/', "--"))
    }
}

#[async_trait]
impl HubClient for HttpHub {
    async fn fetch(&self, request: &HubRequest) -> Result<HubSnapshot, LoadError> {
        validate_model_id(&request.model_id)?;
        if let Some(revision) = &request.revision {
            validate_revision(revision)?;
        }

        let info = self.model_info(request).await?;
        if let Some(sha) = &info.sha {
            validate_revision(sha)?;
        }
        let revision = info
            .sha
            .clone()
            .or_else(|| request.revision.clone())
            .unwrap_or_else(|| "main".to_string());
        let local_dir = self.snapshot_dir(&request.model_id, &revision);
        // A branch name can move; only commit-pinned snapshots are reused.
        let pinned = info.sha.is_some();

        if pinned && local_dir.join(COMPLETE_MARKER).is_file() {
            debug!(dir = %local_dir.display(), "Using cached hub snapshot");
            return Ok(HubSnapshot {
                local_dir,
                commit_hash: info.sha,
            });
        }

        let wanted: Vec<&Sibling> = info
            .siblings
            .iter()
            .filter(|s| SNAPSHOT_FILES.contains(&s.rfilename.as_str()))
            .collect();
        if !wanted.iter().any(|s| s.rfilename == CONFIG_FILE) {
            return Err(LoadError::InvalidFormat(format!(
                "{} has no {}",
                request.model_id, CONFIG_FILE
            )));
        }

        for sibling in &wanted {
            let dest = local_dir.join(&sibling.rfilename);
            self.download(request, &revision, sibling, &dest).await?;
        }
        if pinned {
            tokio::fs::write(local_dir.join(COMPLETE_MARKER), &revision).await?;
        }

        info!(
            model_id = %request.model_id,
            revision = %revision,
            files = wanted.len(),
            "Hub snapshot downloaded"
        );
        Ok(HubSnapshot {
            local_dir,
            commit_hash: info.sha,
        })
    }
}

async fn check_status(response: Response, request: &HubRequest) -> Result<Response, LoadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let target = match &request.revision {
        Some(rev) => format!("{}@{}", request.model_id, rev),
        None => request.model_id.clone(),
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(LoadError::Unauthorized(target)),
        StatusCode::NOT_FOUND => Err(LoadError::RemoteNotFound(target)),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(LoadError::Network(format!(
                "hub returned {} for {}: {}",
                status, target, body
            )))
        }
    }
}

fn validate_model_id(model_id: &str) -> Result<(), LoadError> {
    let valid = !model_id.is_empty()
        && !model_id.starts_with('/')
        && model_id.split('/').count() <= 2
        && model_id
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..");
    if valid {
        Ok(())
    } else {
        Err(LoadError::InvalidFormat(format!(
            "invalid model id '{}'",
            model_id
        )))
    }
}

fn validate_revision(revision: &str) -> Result<(), LoadError> {
    let valid = !revision.is_empty()
        && revision
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..");
    if valid {
        Ok(())
    } else {
        Err(LoadError::InvalidFormat(format!(
            "invalid revision '{}'",
            revision
        )))
    }
}

/// Stand-in revision for a hub load with no commit hash: the last path
/// segment of the model id. Identifies nothing; callers must mark it
/// as best-effort.
pub fn fallback_revision(model_id: &str) -> String {
    model_id
        .rsplit('/')
        .next()
        .unwrap_or(model_id)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_revision() {
        assert_eq!(fallback_revision("org/name"), "name");
        assert_eq!(fallback_revision("bert-base-uncased"), "bert-base-uncased");
    }

    #[test]
    fn test_validate_model_id() {
        assert!(validate_model_id("distilbert/sst2").is_ok());
        assert!(validate_model_id("bert-base-uncased").is_ok());
        assert!(validate_model_id("").is_err());
        assert!(validate_model_id("/etc/passwd").is_err());
        assert!(validate_model_id("org/../secret").is_err());
        assert!(validate_model_id("a/b/c").is_err());
    }

    #[test]
    fn test_validate_revision() {
        assert!(validate_revision("main").is_ok());
        assert!(validate_revision("refs/pr/1").is_ok());
        assert!(validate_revision("0123abcd").is_ok());
        assert!(validate_revision("").is_err());
        assert!(validate_revision("..").is_err());
        assert!(validate_revision("./main").is_err());
        assert!(validate_revision("v1/../../etc").is_err());
    }

    #[test]
    fn test_snapshot_dir_layout() {
        let hub = HttpHub::new(
            "https://hub.example/",
            Path::new("/tmp/cache"),
            Duration::from_secs(5),
            None,
        )
        .unwrap();
        assert_eq!(hub.endpoint, "https://hub.example");
        assert_eq!(
            hub.snapshot_dir("org/name", "abc123"),
            PathBuf::from("/tmp/cache/hub/org--name/abc123")
        );
    }
}
