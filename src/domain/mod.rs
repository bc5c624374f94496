//! Result types produced by the detection pipeline.

pub mod detection;

pub use detection::DetectionResult;
