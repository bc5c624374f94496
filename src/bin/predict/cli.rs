//! Command-line arguments and how they override the configuration file.

use clap::Parser;
use dbtext::core::config::{ConfigLoader, ConfigValidator, PredictorConfig};
use dbtext::core::errors::DetResult;
use std::path::PathBuf;

/// Detects text regions in an image and writes an annotated copy.
#[derive(Debug, Parser)]
#[command(name = "db-predict")]
#[command(about = "DB text detection - draws detected text regions on an image")]
pub struct Args {
    /// Path to the input image
    #[arg(long = "image_path")]
    pub image_path: PathBuf,

    /// Directory to write the annotated image to
    #[arg(long = "save_dir")]
    pub save_dir: Option<PathBuf>,

    /// Minimum detection score, exclusive
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Device to run on ('cpu', 'cuda', 'cuda:N')
    #[arg(long)]
    pub device: Option<String>,

    /// Run the precompiled ONNX graph instead of the checkpoint
    #[arg(long = "use_jit")]
    pub use_jit: bool,

    /// Checkpoint path. The ONNX graph is the sibling file ending in `.onnx`
    #[arg(long = "model_path")]
    pub model_path: Option<PathBuf>,

    /// TOML or JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// How many times to run the prediction
    #[arg(long, default_value_t = 1)]
    pub repeat: usize,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Loads the configuration file, if any, then applies the flags on top.
    pub fn build_config(&self) -> DetResult<PredictorConfig> {
        let mut config = match &self.config {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => PredictorConfig::default(),
        };

        if let Some(save_dir) = &self.save_dir {
            config.save_dir = save_dir.clone();
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(device) = &self.device {
            config.device = device.clone();
        }
        if let Some(model_path) = &self.model_path {
            config.model_path = model_path.clone();
        }
        config.use_jit |= self.use_jit;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbtext::core::constants::DEFAULT_SCORE_THRESHOLD;

    #[test]
    fn test_defaults_come_from_config() {
        let args = Args::try_parse_from(["db-predict", "--image_path", "a.jpg"]).unwrap();
        assert_eq!(args.repeat, 1);
        let config = args.build_config().unwrap();
        assert_eq!(config, PredictorConfig::default());
        assert_eq!(config.threshold, DEFAULT_SCORE_THRESHOLD);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predict.toml");
        std::fs::write(&path, "threshold = 0.7\ndevice = \"cpu\"\nsave_dir = \"from_file\"\n")
            .unwrap();

        let args = Args::try_parse_from([
            "db-predict",
            "--image_path",
            "a.jpg",
            "--config",
            path.to_str().unwrap(),
            "--threshold",
            "0.25",
            "--use_jit",
            "--model_path",
            "weights/det.safetensors",
        ])
        .unwrap();
        let config = args.build_config().unwrap();

        assert_eq!(config.threshold, 0.25);
        assert_eq!(config.device, "cpu");
        assert_eq!(config.save_dir, PathBuf::from("from_file"));
        assert!(config.use_jit);
        assert_eq!(
            config.compiled_graph_path(),
            PathBuf::from("weights/det.onnx")
        );
    }

    #[test]
    fn test_image_path_is_required() {
        assert!(Args::try_parse_from(["db-predict"]).is_err());
    }
}
