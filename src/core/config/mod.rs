//! Configuration management for the detection predictor.
//!
//! This module provides the serde configuration types, the validation trait and
//! the file loader.

pub mod loader;
pub mod predictor;

pub use loader::{ConfigFormat, ConfigLoader};
pub use predictor::{NormalizationConfig, PostProcessConfig, PredictorConfig};

use crate::core::errors::{DetError, DetResult};

/// Trait for configuration validation.
///
/// Implemented by every configuration section so the predictor can reject bad
/// values before any model is loaded.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> DetResult<()>;

    /// Returns the default configuration.
    fn get_defaults() -> Self
    where
        Self: Sized;

    /// Validates that a threshold lies in `[0, 1]`.
    fn validate_unit_interval(&self, field: &str, value: f32) -> DetResult<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(DetError::config_error_with_context(
                field,
                &value.to_string(),
                "must be within [0, 1]",
            ));
        }
        Ok(())
    }

    /// Validates that a value is finite and strictly positive.
    fn validate_positive(&self, field: &str, value: f32) -> DetResult<()> {
        if !value.is_finite() || value <= 0.0 {
            return Err(DetError::config_error_with_context(
                field,
                &value.to_string(),
                "must be a positive finite number",
            ));
        }
        Ok(())
    }
}
