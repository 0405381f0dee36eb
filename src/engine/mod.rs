//! Inference engine module.
//!
//! Handles input validation, pipeline construction and prediction output.
//! Provides the `Pipeline` trait and supporting types.

pub mod config;
pub mod error;
pub mod input;
pub mod onnx;
pub mod output;
pub mod pipeline;

pub use config::{Device, ModelKwargs, Task};
pub use error::InferenceError;
pub use input::validate_request;
pub use output::{softmax, LabelScore, Prediction};
pub use pipeline::{check_kwargs, Pipeline, PipelineFactory, PipelineSpec};

// Backend re-exports
pub use onnx::{OnnxOptions, OnnxPipelineFactory};
