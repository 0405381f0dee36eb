// Copyright 2024-2026 Inference Server Contributors
// SPDX-License-Identifier: Apache-2.0

//! Models CLI subcommand: list.
//!
//! Queries a running server and displays the currently loaded model.

use crate::api::ModelsResponse;
use crate::cli::CliHttpClient;

/// Run `models list` against the server at `base_url`.
///
/// Returns exit code: 0 on success, 3 on connection failure.
pub async fn run_list(base_url: &str) -> i32 {
    let result = match CliHttpClient::new(base_url) {
        Ok(client) => client.get_models().await,
        Err(e) => Err(e),
    };
    match result {
        Ok(response) => {
            print_models(&response);
            0
        }
        Err(e) => {
            eprintln!("Error connecting to server: {}", e);
            eprintln!("Is the server running? Check INFER_SERVER_URL.");
            3
        }
    }
}

/// Format and print a `ModelsResponse` to stdout.
pub fn print_models(response: &ModelsResponse) {
    if response.models.is_empty() {
        println!("No models currently loaded.");
        return;
    }

    println!(
        "{:<36} {:<10} {:<14} {:<8} {:<25}",
        "NAME", "VERSION", "SOURCE", "STATUS", "LOADED AT"
    );
    println!("{}", "-".repeat(96));

    for m in &response.models {
        println!(
            "{:<36} {:<10} {:<14} {:<8} {:<25}",
            truncate(&m.name, 35),
            truncate(&m.version, 9),
            truncate(&m.source_type, 13),
            truncate(&m.status, 7),
            m.loaded_at.format("%Y-%m-%dT%H:%M:%SZ"),
        );
    }

    println!("{}", "-".repeat(96));
    println!("{} model(s) loaded", response.count);
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Task;
    use crate::models::ModelDescriptor;
    use chrono::Utc;

    fn make_model(name: &str, version: &str, source_type: &str) -> ModelDescriptor {
        ModelDescriptor {
            name: name.to_string(),
            version: version.to_string(),
            model_type: Task::TextClassification,
            source: source_type.to_lowercase(),
            source_type: source_type.to_string(),
            loaded_at: Utc::now(),
            status: "loaded".to_string(),
            uri: format!("/models/{}", name),
        }
    }

    #[test]
    fn test_print_models_empty() {
        let response = ModelsResponse::from(vec![]);
        // Smoke-test: must not panic.
        print_models(&response);
    }

    #[test]
    fn test_print_models_with_entry() {
        let response = ModelsResponse::from(vec![make_model("sentiment", "local", "Local")]);
        assert_eq!(response.count, 1);
        print_models(&response);
    }

    #[test]
    fn test_print_models_truncates_long_names() {
        let long_name = "é".repeat(50);
        let response = ModelsResponse::from(vec![make_model(&long_name, "3", "MLflow")]);
        // Must not panic on multi-byte names.
        print_models(&response);
    }

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_exact_length() {
        assert_eq!(truncate("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        assert_eq!(truncate("hello world", 5), "hello");
        assert_eq!(truncate("ééé", 2), "éé");
    }

    #[tokio::test]
    async fn test_run_list_connection_failure_returns_3() {
        let code = run_list("http://127.0.0.1:9").await;
        assert_eq!(code, 3, "should return exit code 3 on connection failure");
    }
}
