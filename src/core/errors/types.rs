//! Error types for the detection pipeline.
//!
//! This module defines the errors that can occur while loading images, running
//! the detection network, decoding its output and writing the annotated result.

use std::path::PathBuf;
use thiserror::Error;

/// Enum representing the errors that can occur in the detection pipeline.
///
/// Every variant is fatal for the image being processed. Candidate regions that
/// fail the size or score checks during decoding are not errors and never show
/// up here.
#[derive(Error, Debug)]
pub enum DetError {
    /// The input image path does not exist.
    #[error("image not found: {}", path.display())]
    NotFound {
        /// The path that was requested.
        path: PathBuf,
    },

    /// Error occurred while decoding an image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// Error occurred while encoding the annotated image.
    #[error("image write: {}", path.display())]
    ImageWrite {
        /// Destination path of the annotated image.
        path: PathBuf,
        /// The underlying encoder error.
        #[source]
        source: image::ImageError,
    },

    /// A tensor did not have the shape a stage requires.
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Where the mismatch was detected.
        context: String,
        /// The expected shape. A zero entry means "any size".
        expected: Vec<usize>,
        /// The actual shape.
        actual: Vec<usize>,
    },

    /// Error occurred while running a model.
    #[error("inference failed in {backend}: {context}")]
    Inference {
        /// The backend that produced the error.
        backend: String,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error occurred while loading model parameters or a compiled graph.
    #[error("failed to load model from '{model_path}': {reason}{suggestion}")]
    ModelLoad {
        /// Path of the model file.
        model_path: String,
        /// What went wrong.
        reason: String,
        /// Optional hint, already formatted.
        suggestion: String,
        /// The underlying error, when there is one.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Filesystem error while creating the output directory or writing files.
    #[error("io: {context}")]
    Io {
        /// What was being done.
        context: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from ndarray shape operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),
}

/// A plain message error used as the source of errors that have no underlying cause.
#[derive(Debug, Clone)]
pub struct OpaqueError(pub String);

impl std::fmt::Display for OpaqueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for OpaqueError {}

impl From<image::ImageError> for DetError {
    fn from(error: image::ImageError) -> Self {
        Self::ImageLoad(error)
    }
}

impl From<std::io::Error> for DetError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            context: "filesystem operation".to_string(),
            source: error,
        }
    }
}
