//! Inference server entry point.
//!
//! Bootstraps the HTTP server with:
//! - Configuration loading from `INFER_*` variables
//! - Structured logging
//! - Signal handling for graceful shutdown
//!
//! ## CLI Subcommands
//!
//! - `inference-server` or `inference-server serve` - Run the HTTP server (default)
//! - `inference-server health` - Health check against a running server (exit 0/1/3)
//! - `inference-server models list` - Show the loaded model

use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info};

use inference_server::cli::{get_server_url, run_health};
use inference_server::config::{self as server_config, EnvConfig};
use inference_server::telemetry::init_logging;
use inference_server::Runtime;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "serve" | "" => {
            let config = server_config::load();
            if let Err(e) = init_logging(&config.log) {
                eprintln!("Logging setup failed: {}", e);
                return ExitCode::from(2u8);
            }
            match run_http_server(config).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "Server error");
                    eprintln!("Server error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        "health" => {
            let code = run_health(&get_server_url()).await;
            ExitCode::from(code as u8)
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("inference-server {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        "models" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("list");
            match subcommand {
                "list" => {
                    let code = inference_server::cli::models_cmd::run_list(&get_server_url()).await;
                    ExitCode::from(code as u8)
                }
                _ => {
                    eprintln!("Unknown models subcommand: {}", subcommand);
                    print_command_help("models");
                    ExitCode::FAILURE
                }
            }
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    if args.get(3).map(|s| s.as_str()) == Some("--json") {
                        let code = inference_server::cli::config_cmd::run_show_json();
                        return ExitCode::from(code as u8);
                    }
                    inference_server::cli::config_cmd::run_show();
                    ExitCode::SUCCESS
                }
                "defaults" => {
                    inference_server::cli::config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "inference-server - Text classification inference server v{}

USAGE:
    inference-server [COMMAND] [OPTIONS]

COMMANDS:
    serve        Run the HTTP server (default when no command given)
    health       Health check (exit 0 if healthy, 1 if unhealthy)
    models       Show the loaded model (list)
    config       Show configuration (show, defaults)
    version      Show version information
    help         Show this help message

OPTIONS:
    -h, --help     Show help for command
    -V, --version  Show version information

EXAMPLES:
    inference-server                     # Run HTTP server (default)
    inference-server serve               # Explicitly run HTTP server
    inference-server health              # Health check
    inference-server models list         # Show the loaded model
    inference-server config show --json  # Effective configuration as JSON

ENVIRONMENT:
    INFER_HOST / INFER_PORT    Bind address (default: 0.0.0.0:8000)
    INFER_SERVER_URL           Server URL for client commands (default: http://127.0.0.1:8000)
    INFER_LOG_LEVEL            Log filter (debug, info, warn, error)
    INFER_LOG_FORMAT           json or pretty

EXIT CODES:
    0  Success / Healthy
    1  Failure / Unhealthy
    2  Configuration error
    3  Connection error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "serve" => {
            eprintln!(
                "inference-server serve - Run the HTTP server

USAGE:
    inference-server serve

DESCRIPTION:
    Starts the HTTP API on INFER_HOST:INFER_PORT. No model is loaded at
    startup; use POST /load to load one. Ctrl+C stops accepting requests,
    drains in-flight ones and unloads the model.

ENDPOINTS:
    GET  /health
    GET  /models
    POST /load
    POST /infer/{{model_type}}/{{model_name}}
    POST /stop
"
            );
        }
        "health" => {
            eprintln!(
                "inference-server health - Health check

USAGE:
    inference-server health

DESCRIPTION:
    Queries GET /health on INFER_SERVER_URL and reports whether a model
    is loaded.

EXIT CODES:
    0  Server is healthy
    1  Server is unhealthy
    3  Connection error
"
            );
        }
        "models" => {
            eprintln!(
                "inference-server models - Inspect models

USAGE:
    inference-server models list

SUBCOMMANDS:
    list           Show the loaded model

EXIT CODES:
    0  Success
    3  Connection error
"
            );
        }
        "config" => {
            eprintln!(
                "inference-server config - Show configuration

USAGE:
    inference-server config <SUBCOMMAND> [--json]

SUBCOMMANDS:
    show           Show effective configuration (secrets redacted)
    defaults       Show default configuration

EXAMPLES:
    inference-server config show
    inference-server config show --json
    inference-server config defaults
"
            );
        }
        _ => {
            eprintln!(
                "No detailed help available for '{}'. Use 'inference-server help' for general usage.",
                command
            );
        }
    }
}

async fn run_http_server(config: EnvConfig) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::new(&config)?;
    let manager = runtime.manager.clone();
    let app = runtime.router();

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(
        app = %config.app_name,
        environment = %config.environment,
        address = %listener.local_addr()?,
        device = %config.device,
        backend = runtime.backend,
        "Inference server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if manager.unload().await {
        info!("Model unloaded on shutdown");
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received, draining...");
}
