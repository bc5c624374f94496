//! Image processing for the detection pipeline.
//!
//! # Modules
//!
//! * `db_postprocess` - Probability map decoding into polygons and scores
//! * `geometry` - Geometric primitives and algorithms
//! * `normalization` - Resize and normalization of network inputs
//! * `types` - Type definitions used across the processors module

pub mod db_postprocess;
mod geometry;
mod normalization;
pub mod types;

pub use db_postprocess::*;
pub use geometry::*;
pub use normalization::*;
pub use types::*;
