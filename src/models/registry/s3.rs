//! S3-compatible artifact storage (AWS S3, MinIO).
//!
//! MLflow deployments that keep artifacts in a bucket hand out `s3://` URIs
//! from the registry. The tree under the key prefix is mirrored into the
//! local cache like proxied artifacts are.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::models::loader::LoadError;

/// Connection settings for the artifact bucket.
///
/// Unset fields fall back to the standard `AWS_*` environment.
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    /// Custom endpoint, e.g. a MinIO server. Path-style addressing is used
    /// whenever this is set.
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

pub(crate) struct S3Artifacts {
    config: S3Config,
    timeout: Duration,
}

impl S3Artifacts {
    pub(crate) fn new(config: S3Config, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    fn store(&self, bucket: &str) -> Result<AmazonS3, LoadError> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_client_options(ClientOptions::new().with_timeout(self.timeout));
        if let Some(endpoint) = &self.config.endpoint_url {
            builder = builder
                .with_endpoint(endpoint.trim_end_matches('/'))
                .with_virtual_hosted_style_request(false)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let Some(region) = &self.config.region {
            builder = builder.with_region(region);
        }
        if let Some(key) = &self.config.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &self.config.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        Ok(builder.build()?)
    }

    /// Mirror every object under `bucket/key` into `dest`, keeping the
    /// layout below the key. Returns the number of files written.
    pub(crate) async fn fetch_tree(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
        check: impl Fn(&str) -> Result<(), LoadError>,
    ) -> Result<usize, LoadError> {
        let store = self.store(bucket)?;
        let prefix = ObjectPath::from(key);
        let mut listing = store.list(Some(&prefix));
        let mut files = 0;

        while let Some(meta) = listing.next().await {
            let meta = meta?;
            let location = meta.location.as_ref();
            let relative = location
                .strip_prefix(prefix.as_ref())
                .unwrap_or(location)
                .trim_start_matches('/');
            if relative.is_empty() {
                continue;
            }
            check(relative)?;

            debug!(bucket = %bucket, key = %location, size = meta.size, "Downloading artifact");
            let target = dest.join(relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut file = tokio::fs::File::create(&target).await?;
            let mut body = store.get(&meta.location).await?.into_stream();
            while let Some(chunk) = body.next().await {
                file.write_all(&chunk?).await?;
            }
            file.flush().await?;
            files += 1;
        }
        Ok(files)
    }
}

impl From<object_store::Error> for LoadError {
    fn from(e: object_store::Error) -> Self {
        match e {
            object_store::Error::NotFound { path, .. } => LoadError::RemoteNotFound(path),
            other => LoadError::Network(other.to_string()),
        }
    }
}
