//! Health check support.
//!
//! Liveness is unconditional while the process serves requests; the report
//! adds which model, if any, is loaded.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::models::ModelMetadata;

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub loaded: bool,
    pub model: Option<ModelMetadata>,
    pub uptime_secs: u64,
}

/// Builds health reports from manager state.
pub struct HealthChecker {
    start_time: Instant,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Check liveness: process is responsive.
    pub fn is_alive(&self) -> bool {
        true
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate the health report for the given active model.
    pub fn report(&self, model: Option<ModelMetadata>) -> HealthReport {
        HealthReport {
            status: "ok".to_string(),
            loaded: model.is_some(),
            model,
            uptime_secs: self.uptime_secs(),
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}
