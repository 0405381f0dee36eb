// Copyright 2024-2026 Inference Server Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults.
//!
//! These commands read configuration directly from environment variables
//! without contacting a running server.

use crate::config::{self, EffectiveConfig};

/// Print effective config as key-value pairs to stdout.
pub fn run_show() {
    let cfg = config::load().effective_config();
    print_config(&cfg);
}

/// Print effective config as JSON to stdout.
///
/// Returns 0 on success, 1 if serialization fails.
pub fn run_show_json() -> i32 {
    let cfg = config::load().effective_config();
    match serde_json::to_string_pretty(&cfg) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Failed to serialize configuration: {}", e);
            1
        }
    }
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    println!("INFER_APP_NAME=inference-server");
    println!("INFER_ENVIRONMENT=development");
    println!("INFER_HOST=0.0.0.0");
    println!("INFER_PORT={}", config::DEFAULT_PORT);
    println!("INFER_MLFLOW_TRACKING_URI={}", config::DEFAULT_TRACKING_URI);
    println!("INFER_MLFLOW_REGISTRY_URI=");
    println!("INFER_MLFLOW_S3_ENDPOINT_URL=");
    println!("AWS_REGION=");
    println!("AWS_ACCESS_KEY_ID=");
    println!("AWS_SECRET_ACCESS_KEY=");
    println!("INFER_HF_ENDPOINT={}", config::DEFAULT_HUB_ENDPOINT);
    println!("INFER_HF_TOKEN=");
    println!("INFER_DEVICE=cpu");
    println!("INFER_MODEL_MAX_LENGTH=");
    println!("INFER_CACHE_DIR={}", config::DEFAULT_CACHE_DIR);
    println!("INFER_REQUEST_TIMEOUT_SECS={}", config::DEFAULT_REQUEST_TIMEOUT_SECS);
    println!("INFER_LOG_FORMAT=json");
    println!("INFER_LOG_LEVEL=info");
    println!("INFER_LOG_FILE=");
}

fn print_config(cfg: &EffectiveConfig) {
    println!("INFER_APP_NAME={}", cfg.app_name);
    println!("INFER_ENVIRONMENT={}", cfg.environment);
    println!("INFER_BIND_ADDRESS={}", cfg.bind_address);
    println!("INFER_MLFLOW_TRACKING_URI={}", cfg.mlflow_tracking_uri);
    println!("INFER_MLFLOW_REGISTRY_URI={}", cfg.mlflow_registry_uri);
    println!(
        "INFER_MLFLOW_S3_ENDPOINT_URL={}",
        cfg.mlflow_s3_endpoint_url.as_deref().unwrap_or("")
    );
    println!("AWS_REGION={}", cfg.aws_region.as_deref().unwrap_or(""));
    println!("AWS_ACCESS_KEY_ID={}", cfg.aws_access_key_id.as_deref().unwrap_or(""));
    println!(
        "AWS_SECRET_ACCESS_KEY={}",
        cfg.aws_secret_access_key.unwrap_or("")
    );
    println!("INFER_HF_ENDPOINT={}", cfg.hf_endpoint);
    println!("INFER_HF_TOKEN={}", cfg.hf_token.unwrap_or(""));
    println!("INFER_DEVICE={}", cfg.device);
    println!(
        "INFER_MODEL_MAX_LENGTH={}",
        cfg.model_max_length.map(|n| n.to_string()).unwrap_or_default()
    );
    println!("INFER_CACHE_DIR={}", cfg.cache_dir);
    println!("INFER_REQUEST_TIMEOUT_SECS={}", cfg.request_timeout_secs);
    println!("INFER_LOG_FORMAT={}", cfg.log_format);
    println!("INFER_LOG_LEVEL={}", cfg.log_level);
    println!("INFER_LOG_FILE={}", cfg.log_file.as_deref().unwrap_or(""));
}
