// Copyright 2024-2026 Inference Server Contributors
// SPDX-License-Identifier: Apache-2.0

//! Health check subcommand.
//!
//! Exit codes: 0 healthy, 1 unhealthy, 3 connection error.

use super::client::{CliError, CliHttpClient};

/// Run `health` against the server at `base_url`.
pub async fn run_health(base_url: &str) -> i32 {
    let client = match CliHttpClient::new(base_url) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 3;
        }
    };

    match client.get_health().await {
        Ok(report) if report.status == "ok" => {
            match report.model.as_ref() {
                Some(model) => println!(
                    "healthy: {} ({}) loaded, up {}s",
                    model.display_name(),
                    model.source_kind.label(),
                    report.uptime_secs
                ),
                None => println!("healthy: no model loaded, up {}s", report.uptime_secs),
            }
            0
        }
        Ok(report) => {
            println!("unhealthy: status {}", report.status);
            1
        }
        Err(CliError::Connection(e)) => {
            eprintln!("Error connecting to server: {}", e);
            eprintln!("Is the server running? Check INFER_SERVER_URL.");
            3
        }
        Err(e) => {
            eprintln!("Health check failed: {}", e);
            1
        }
    }
}
