//! Network definitions for the checkpoint backend.

pub mod detection;

pub use detection::DbNet;
