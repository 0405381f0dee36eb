//! Span helpers for request tracing.

use std::time::Instant;

use tracing::{info_span, Span};

/// Extension trait for recording outcomes on spans.
pub trait SpanExt {
    /// Record `status` and, on failure, `error.message`.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;

    /// Record `latency_ms` since `started`.
    fn record_latency(&self, started: Instant);
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }

    fn record_latency(&self, started: Instant) {
        self.record("latency_ms", started.elapsed().as_secs_f64() * 1000.0);
    }
}

/// Standard span for one inference request.
pub fn infer_span(model_type: &str, model_name: &str, batch_size: usize) -> Span {
    info_span!(
        "infer_request",
        model_type = %model_type,
        model_name = %model_name,
        batch_size = batch_size,
        status = tracing::field::Empty,
        error.message = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    )
}

/// Standard span for one load request.
pub fn load_span(source_kind: &str) -> Span {
    info_span!(
        "load_request",
        source_kind = %source_kind,
        status = tracing::field::Empty,
        error.message = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    )
}
