//! Text detection networks.

pub mod db;
mod layers;
pub mod resnet;

pub use db::DbNet;
