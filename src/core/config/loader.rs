//! Configuration file loading.
//!
//! Reads and writes [`PredictorConfig`] as TOML or JSON, picking the format
//! from the file extension.

use super::PredictorConfig;
use crate::core::errors::{DetError, DetResult};
use std::path::Path;

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    fn require(path: &Path) -> DetResult<Self> {
        Self::from_extension(path).ok_or_else(|| {
            DetError::config_error(format!(
                "Unsupported config file extension: {:?}",
                path.extension()
            ))
        })
    }
}

/// Configuration loader for the predictor
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file, auto-detecting the format from the extension
    ///
    /// Missing fields take their default values.
    ///
    /// ```rust,no_run
    /// use dbtext::core::config::ConfigLoader;
    /// use std::path::Path;
    ///
    /// let config = ConfigLoader::load_from_file(Path::new("predict.toml"))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_from_file(path: &Path) -> DetResult<PredictorConfig> {
        let format = ConfigFormat::require(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            DetError::config_error(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::load_from_string(&content, format)
    }

    /// Load configuration from a string with specified format
    pub fn load_from_string(content: &str, format: ConfigFormat) -> DetResult<PredictorConfig> {
        match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| {
                DetError::config_error(format!("Failed to parse TOML config: {e}"))
            }),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| {
                DetError::config_error(format!("Failed to parse JSON config: {e}"))
            }),
        }
    }

    /// Save configuration to a file, auto-detecting the format from the extension
    pub fn save_to_file(config: &PredictorConfig, path: &Path) -> DetResult<()> {
        let format = ConfigFormat::require(path)?;
        let content = Self::save_to_string(config, format)?;
        std::fs::write(path, content).map_err(|e| {
            DetError::io_error(format!("Failed to write config file {}", path.display()), e)
        })
    }

    /// Save configuration to string with specified format
    pub fn save_to_string(config: &PredictorConfig, format: ConfigFormat) -> DetResult<String> {
        match format {
            ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|e| {
                DetError::config_error(format!("Failed to serialize config to TOML: {e}"))
            }),
            ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(|e| {
                DetError::config_error(format!("Failed to serialize config to JSON: {e}"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::types::BoxType;
    use std::path::PathBuf;

    fn sample_config() -> PredictorConfig {
        let mut config = PredictorConfig {
            model_path: PathBuf::from("weights/db_r18.safetensors"),
            save_dir: PathBuf::from("out"),
            ..Default::default()
        };
        config.postprocess.box_type = BoxType::Poly;
        config.postprocess.unclip_ratio = 2.0;
        config
    }

    #[test]
    fn test_config_format_detection() {
        assert_eq!(
            ConfigFormat::from_extension(Path::new("config.toml")),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension(Path::new("config.JSON")),
            Some(ConfigFormat::Json)
        );
        assert!(ConfigFormat::from_extension(Path::new("config.txt")).is_none());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = sample_config();
        let toml_str = ConfigLoader::save_to_string(&config, ConfigFormat::Toml).unwrap();
        let loaded = ConfigLoader::load_from_string(&toml_str, ConfigFormat::Toml).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predict.json");
        let config = sample_config();

        ConfigLoader::save_to_file(&config, &path).unwrap();
        let loaded = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let content = "save_dir = \"elsewhere\"\n[postprocess]\nthresh = 0.25\n";
        let loaded = ConfigLoader::load_from_string(content, ConfigFormat::Toml).unwrap();
        assert_eq!(loaded.save_dir, PathBuf::from("elsewhere"));
        assert_eq!(loaded.postprocess.thresh, 0.25);
        assert_eq!(loaded.postprocess.box_thresh, 0.5);
        assert_eq!(loaded.image_shape, [3, 640, 640]);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = ConfigLoader::load_from_file(Path::new("predict.yaml")).unwrap_err();
        assert!(matches!(err, DetError::ConfigError { .. }));
    }
}
