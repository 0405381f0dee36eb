// Copyright 2024-2026 Inference Server Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for client-side commands.
//!
//! These subcommands talk to a running server over its HTTP API, so they
//! work as container exec probes and for quick inspection.
//!
//! ## Usage
//!
//! ```bash
//! inference-server health        # Health check, exits 0 on healthy
//! inference-server models list   # Show the loaded model
//! inference-server config show   # Effective configuration
//! ```

pub mod client;
pub mod config_cmd;
pub mod health;
pub mod models_cmd;

pub use client::{CliError, CliHttpClient};
pub use health::run_health;

/// Default server URL when `INFER_SERVER_URL` is unset.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Get the server URL from the environment or use the default.
pub fn get_server_url() -> String {
    std::env::var("INFER_SERVER_URL")
        .ok()
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
}
