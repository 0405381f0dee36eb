//! Server configuration loading from environment variables.
//!
//! All configuration values are loaded from `INFER_*` environment variables
//! with sensible defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `INFER_APP_NAME` | inference-server | Name reported in logs |
//! | `INFER_ENVIRONMENT` | development | Deployment environment label |
//! | `INFER_HOST` | 0.0.0.0 | HTTP bind address |
//! | `INFER_PORT` | 8000 | HTTP port |
//! | `INFER_MLFLOW_TRACKING_URI` | http://localhost:5000 | MLflow tracking server |
//! | `INFER_MLFLOW_REGISTRY_URI` | tracking URI | MLflow model registry |
//! | `INFER_MLFLOW_S3_ENDPOINT_URL` | (none) | S3-compatible artifact store (e.g. MinIO) |
//! | `AWS_REGION` / `AWS_DEFAULT_REGION` | (none) | Artifact bucket region |
//! | `AWS_ACCESS_KEY_ID` | (none) | Artifact bucket credentials |
//! | `AWS_SECRET_ACCESS_KEY` | (none) | Artifact bucket credentials |
//! | `INFER_HF_ENDPOINT` | https://huggingface.co | Model hub endpoint |
//! | `INFER_HF_TOKEN` | (none) | Default hub token |
//! | `INFER_DEVICE` | cpu | `cpu`, `cuda` or `cuda:<n>` |
//! | `INFER_MODEL_MAX_LENGTH` | (none) | Default `max_length` pipeline kwarg |
//! | `INFER_CACHE_DIR` | .cache/inference-server | Download cache |
//! | `INFER_REQUEST_TIMEOUT_SECS` | 300 | Hub / registry HTTP timeout (secs) |
//! | `INFER_LOG_FORMAT` | json | `json` or `pretty` |
//! | `INFER_LOG_LEVEL` | info | Log filter directive |
//! | `INFER_LOG_FILE` | (none) | Append logs to this file |

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::engine::{Device, ModelKwargs};
use crate::models::{MlflowConfig, S3Config};
use crate::telemetry::{LogConfig, LogFormat};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_TRACKING_URI: &str = "http://localhost:5000";
pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_CACHE_DIR: &str = ".cache/inference-server";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// MLflow connection settings.
#[derive(Debug, Clone)]
pub struct MlflowEnvConfig {
    pub tracking_uri: String,
    pub registry_uri: Option<String>,
    pub s3: S3Config,
}

/// Model hub settings.
#[derive(Debug, Clone)]
pub struct HubEnvConfig {
    pub endpoint: String,
    pub token: Option<String>,
}

/// All server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub app_name: String,
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub mlflow: MlflowEnvConfig,
    pub hub: HubEnvConfig,
    pub device: Device,
    pub model_max_length: Option<usize>,
    pub cache_dir: PathBuf,
    pub request_timeout: Duration,
    pub log: LogConfig,
}

/// Effective configuration summary (serializable, secrets redacted).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub app_name: String,
    pub environment: String,
    pub bind_address: String,
    pub mlflow_tracking_uri: String,
    pub mlflow_registry_uri: String,
    pub mlflow_s3_endpoint_url: Option<String>,
    pub aws_region: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<&'static str>,
    pub hf_endpoint: String,
    pub hf_token: Option<&'static str>,
    pub device: Device,
    pub model_max_length: Option<usize>,
    pub cache_dir: String,
    pub request_timeout_secs: u64,
    pub log_format: &'static str,
    pub log_level: String,
    pub log_file: Option<String>,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_string(key).unwrap_or_else(|| default.to_string())
}

/// Parse a `u16` env var, returning `default` on missing or invalid.
fn parse_u16(key: &str, default: u16) -> u16 {
    match env_string(key) {
        Some(val) => val.parse::<u16>().unwrap_or(default),
        None => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match env_string(key) {
        Some(val) => val.parse::<u64>().unwrap_or(default),
        None => default,
    }
}

/// Parse an optional positive `usize` env var.
fn parse_opt_usize(key: &str) -> Option<usize> {
    env_string(key)
        .and_then(|val| val.parse::<usize>().ok())
        .filter(|n| *n > 0)
}

fn load_log_config() -> LogConfig {
    let format = env_string("INFER_LOG_FORMAT")
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or_default();
    LogConfig {
        format,
        level: env_or("INFER_LOG_LEVEL", "info"),
        output_path: env_string("INFER_LOG_FILE").map(PathBuf::from),
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let port = parse_u16("INFER_PORT", DEFAULT_PORT);
    let port = if port == 0 { DEFAULT_PORT } else { port };
    let timeout_secs = parse_u64("INFER_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS).max(1);
    let device = env_string("INFER_DEVICE")
        .and_then(|v| v.parse::<Device>().ok())
        .unwrap_or_default();

    EnvConfig {
        app_name: env_or("INFER_APP_NAME", "inference-server"),
        environment: env_or("INFER_ENVIRONMENT", "development"),
        host: env_or("INFER_HOST", "0.0.0.0"),
        port,
        mlflow: MlflowEnvConfig {
            tracking_uri: env_or("INFER_MLFLOW_TRACKING_URI", DEFAULT_TRACKING_URI),
            registry_uri: env_string("INFER_MLFLOW_REGISTRY_URI"),
            s3: S3Config {
                endpoint_url: env_string("INFER_MLFLOW_S3_ENDPOINT_URL"),
                region: env_string("AWS_REGION").or_else(|| env_string("AWS_DEFAULT_REGION")),
                access_key_id: env_string("AWS_ACCESS_KEY_ID"),
                secret_access_key: env_string("AWS_SECRET_ACCESS_KEY"),
            },
        },
        hub: HubEnvConfig {
            endpoint: env_or("INFER_HF_ENDPOINT", DEFAULT_HUB_ENDPOINT),
            token: env_string("INFER_HF_TOKEN"),
        },
        device,
        model_max_length: parse_opt_usize("INFER_MODEL_MAX_LENGTH"),
        cache_dir: PathBuf::from(env_or("INFER_CACHE_DIR", DEFAULT_CACHE_DIR)),
        request_timeout: Duration::from_secs(timeout_secs),
        log: load_log_config(),
    }
}

impl EnvConfig {
    /// Address the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Kwargs applied to every pipeline unless a load request overrides them.
    pub fn default_model_kwargs(&self) -> ModelKwargs {
        let mut kwargs = ModelKwargs::new();
        if let Some(n) = self.model_max_length {
            kwargs.insert("max_length".into(), serde_json::Value::from(n));
        }
        kwargs
    }

    pub fn mlflow_config(&self) -> MlflowConfig {
        MlflowConfig {
            tracking_uri: self.mlflow.tracking_uri.clone(),
            registry_uri: self.mlflow.registry_uri.clone(),
            cache_dir: self.cache_dir.clone(),
            timeout: self.request_timeout,
            s3: self.mlflow.s3.clone(),
        }
    }

    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            app_name: self.app_name.clone(),
            environment: self.environment.clone(),
            bind_address: self.bind_address(),
            mlflow_tracking_uri: self.mlflow.tracking_uri.clone(),
            mlflow_registry_uri: self
                .mlflow
                .registry_uri
                .clone()
                .unwrap_or_else(|| self.mlflow.tracking_uri.clone()),
            mlflow_s3_endpoint_url: self.mlflow.s3.endpoint_url.clone(),
            aws_region: self.mlflow.s3.region.clone(),
            aws_access_key_id: self.mlflow.s3.access_key_id.clone(),
            aws_secret_access_key: self
                .mlflow
                .s3
                .secret_access_key
                .as_ref()
                .map(|_| "<redacted>"),
            hf_endpoint: self.hub.endpoint.clone(),
            hf_token: self.hub.token.as_ref().map(|_| "<redacted>"),
            device: self.device,
            model_max_length: self.model_max_length,
            cache_dir: self.cache_dir.display().to_string(),
            request_timeout_secs: self.request_timeout.as_secs(),
            log_format: self.log.format.as_str(),
            log_level: self.log.level.clone(),
            log_file: self
                .log
                .output_path
                .as_ref()
                .map(|p| p.display().to_string()),
        }
    }
}
