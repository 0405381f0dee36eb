//! Telemetry module.
//!
//! Structured logging and request spans through `tracing`.

mod logging;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use spans::{infer_span, load_span, SpanExt};
