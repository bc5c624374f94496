//! Image I/O, drawing and logging setup.

pub mod image;
pub mod visualization;

pub use image::{dynamic_to_rgb, load_image, save_image};
pub use visualization::{VisualizationConfig, Visualizer, draw_polygons};

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` takes precedence. Otherwise the level is `info`, or `debug`
/// when `verbose` is set.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
