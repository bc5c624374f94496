//! Error types for the detection pipeline.
//!
//! # Usage
//!
//! ```rust
//! use dbtext::core::errors::DetError;
//!
//! let error = DetError::not_found("samples/page.jpg");
//! assert!(error.is_not_found());
//!
//! let config_error = DetError::config_error("Missing required model path");
//! assert!(config_error.to_string().starts_with("configuration"));
//! ```

pub mod constructors;
pub mod types;

pub use types::{DetError, OpaqueError};

/// Convenient result alias for detection operations.
pub type DetResult<T> = Result<T, DetError>;
