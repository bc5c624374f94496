//! Error constructor utilities for the detection pipeline.
//!
//! Helpers for creating `DetError` values with consistent context strings.
//!
//! ```rust
//! use dbtext::core::DetError;
//!
//! let error = DetError::shape_mismatch("model input", &[1, 3, 640, 640], &[1, 1, 640, 640]);
//! assert!(error.to_string().contains("model input"));
//! ```

use super::types::DetError;
use std::path::Path;

impl DetError {
    /// Creates a `NotFound` error for a missing input path.
    pub fn not_found(path: impl AsRef<Path>) -> Self {
        Self::NotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates a `ShapeMismatch` error.
    ///
    /// # Arguments
    ///
    /// * `context` - Where the mismatch was detected.
    /// * `expected` - The expected shape. Use `0` for dimensions that may take any size.
    /// * `actual` - The shape that was observed.
    pub fn shape_mismatch(context: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Creates a DetError for a failure inside an inference backend.
    ///
    /// # Arguments
    ///
    /// * `backend` - Name of the backend (for example `onnxruntime` or `candle`).
    /// * `context` - What the backend was doing.
    /// * `error` - The underlying error that caused this error.
    pub fn inference_error(
        backend: &str,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            backend: backend.to_string(),
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a DetError for model loading failures.
    ///
    /// # Arguments
    ///
    /// * `model_path` - Path of the checkpoint or graph file.
    /// * `reason` - Short description of the failure.
    /// * `suggestion` - Optional hint for the user.
    /// * `source` - Optional underlying error.
    pub fn model_load_error(
        model_path: impl AsRef<Path>,
        reason: impl Into<String>,
        suggestion: Option<&str>,
        source: Option<impl std::error::Error + Send + Sync + 'static>,
    ) -> Self {
        let suggestion = suggestion
            .map(|s| format!("; suggested fix: {s}"))
            .unwrap_or_default();
        Self::ModelLoad {
            model_path: model_path.as_ref().display().to_string(),
            reason: reason.into(),
            suggestion,
            source: source.map(|e| Box::new(e) as _),
        }
    }

    /// Creates a DetError for filesystem failures with context.
    pub fn io_error(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a DetError for invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a DetError for configuration errors.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates a DetError for configuration errors with context.
    ///
    /// # Arguments
    ///
    /// * `field` - The field where the error occurred.
    /// * `value` - The value of the field.
    /// * `reason` - The reason for the error.
    pub fn config_error_with_context(field: &str, value: &str, reason: &str) -> Self {
        Self::ConfigError {
            message: format!(
                "Configuration error in field '{field}' with value '{value}': {reason}"
            ),
        }
    }

    /// Returns true when this error means the requested input does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_model_load_error_formats_suggestion() {
        let err = DetError::model_load_error(
            "weights/best.onnx",
            "failed to create ONNX session",
            Some("verify the graph was exported"),
            None::<std::io::Error>,
        );
        let message = err.to_string();
        assert!(message.contains("weights/best.onnx"));
        assert!(message.contains("suggested fix: verify the graph was exported"));
        assert!(err.source().is_none());
    }

    #[test]
    fn test_not_found_is_detected() {
        let err = DetError::not_found("missing.jpg");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("missing.jpg"));
        assert!(!DetError::config_error("bad").is_not_found());
    }
}
