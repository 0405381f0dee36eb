//! Prediction input validation.
//!
//! Inputs are validated before the model slot is even looked at. Invalid
//! inputs are rejected, not truncated.

use super::error::InferenceError;

/// Validate a batch of texts and an optional `top_k`.
pub fn validate_request(texts: &[String], top_k: Option<usize>) -> Result<(), InferenceError> {
    validate_batch(texts)?;
    if top_k == Some(0) {
        return Err(InferenceError::InputValidation("top_k must be >= 1".into()));
    }
    Ok(())
}

fn validate_text(text: &str) -> Result<(), InferenceError> {
    if text.trim().is_empty() {
        return Err(InferenceError::InputValidation("Text cannot be empty".into()));
    }
    Ok(())
}

fn validate_batch(batch: &[String]) -> Result<(), InferenceError> {
    if batch.is_empty() {
        return Err(InferenceError::InputValidation(
            "Texts array cannot be empty".into(),
        ));
    }
    for (i, text) in batch.iter().enumerate() {
        validate_text(text).map_err(|e| match e {
            InferenceError::InputValidation(msg) => {
                InferenceError::InputValidation(format!("batch item {}: {}", i, msg))
            }
            other => other,
        })?;
    }
    Ok(())
}
