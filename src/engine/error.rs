//! Inference error types.
//!
//! All errors are fail-closed: invalid inputs are rejected, not truncated, and
//! a prediction is never served for a model the caller did not ask for.

use thiserror::Error;

/// Errors that can occur while serving a prediction.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Input validation failed: {0}")]
    InputValidation(String),

    #[error("Unsupported model_type '{0}'. Supported: text-classification")]
    UnsupportedTask(String),

    #[error("Model is not loaded. Load a model first via /load.")]
    ModelNotLoaded,

    #[error(
        "Requested model '{requested}' ({task}) does not match loaded model '{loaded}'. \
         Load the correct model first via /load."
    )]
    ModelMismatch {
        requested: String,
        task: String,
        loaded: String,
    },

    #[error("Model error: {0}")]
    ModelError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_loaded_and_mismatch_are_distinct() {
        let not_loaded = InferenceError::ModelNotLoaded;
        let mismatch = InferenceError::ModelMismatch {
            requested: "bar".into(),
            task: "text-classification".into(),
            loaded: "foo".into(),
        };
        assert_ne!(not_loaded.to_string(), mismatch.to_string());
        assert!(mismatch.to_string().contains("'bar'"));
    }
}
