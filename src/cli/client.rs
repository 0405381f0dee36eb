// Copyright 2024-2026 Inference Server Contributors
// SPDX-License-Identifier: Apache-2.0

//! Minimal HTTP client for CLI commands.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::api::ModelsResponse;
use crate::health::HealthReport;

/// Timeout applied to every CLI request.
pub const CLI_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Server returned HTTP {0}")]
    Status(u16),

    #[error("Invalid response: {0}")]
    Decode(String),
}

/// Client bound to one server base URL.
pub struct CliHttpClient {
    client: Client,
    base_url: String,
}

impl CliHttpClient {
    pub fn new(base_url: &str) -> Result<Self, CliError> {
        let client = Client::builder()
            .timeout(CLI_TIMEOUT)
            .build()
            .map_err(|e| CliError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn get_health(&self) -> Result<HealthReport, CliError> {
        self.get_json("/health").await
    }

    pub async fn get_models(&self) -> Result<ModelsResponse, CliError> {
        self.get_json("/models").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CliError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(|e| CliError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CliError::Status(status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CliError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_health_decodes_report() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"ok","loaded":false,"model":null,"uptime_secs":12}"#)
            .create();

        let client = CliHttpClient::new(&server.url()).unwrap();
        let report = client.get_health().await.unwrap();
        assert_eq!(report.status, "ok");
        assert!(!report.loaded);
        assert_eq!(report.uptime_secs, 12);
        mock.assert();
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/models").with_status(500).create();

        let client = CliHttpClient::new(&server.url()).unwrap();
        let err = client.get_models().await.unwrap_err();
        assert!(matches!(err, CliError::Status(500)));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body("not json")
            .create();

        let client = CliHttpClient::new(&server.url()).unwrap();
        assert!(matches!(client.get_health().await, Err(CliError::Decode(_))));
    }
}
