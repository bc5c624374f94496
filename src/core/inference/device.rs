//! Compute device selection.
//!
//! Parses `cpu`, `cuda` (or `gpu`) and `cuda:N`.

use crate::core::errors::{DetError, DetResult};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Device the network runs on. Fixed when an engine is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    /// Host CPU.
    #[default]
    Cpu,
    /// CUDA device with the given ordinal.
    Cuda(usize),
}

impl FromStr for Device {
    type Err = DetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_lowercase();
        match value.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(0)),
            s if s.starts_with("cuda:") => s
                .trim_start_matches("cuda:")
                .parse::<usize>()
                .map(Device::Cuda)
                .map_err(|_| {
                    DetError::config_error_with_context(
                        "device",
                        &value,
                        "invalid CUDA device ordinal",
                    )
                }),
            _ => Err(DetError::config_error_with_context(
                "device",
                &value,
                "use 'cpu', 'cuda', or 'cuda:N'",
            )),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

impl Device {
    /// The device that will actually be used by this build.
    ///
    /// Without the `cuda` feature a CUDA request is downgraded to CPU with a warning.
    pub fn effective(self) -> Device {
        match self {
            #[cfg(not(feature = "cuda"))]
            Device::Cuda(ordinal) => {
                warn!(
                    ordinal,
                    "CUDA requested but this build has no `cuda` feature, falling back to CPU"
                );
                Device::Cpu
            }
            other => other,
        }
    }

    /// Creates the matching candle device.
    pub fn to_candle(self) -> DetResult<candle_core::Device> {
        match self.effective() {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(ordinal) => candle_core::Device::new_cuda(ordinal).map_err(|e| {
                DetError::inference_error("candle", &format!("failed to open cuda:{ordinal}"), e)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devices() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("CUDA".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("gpu".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("cuda:1".parse::<Device>().unwrap(), Device::Cuda(1));
        assert!("cuda:x".parse::<Device>().is_err());
        assert!("tpu".parse::<Device>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for device in [Device::Cpu, Device::Cuda(3)] {
            assert_eq!(device.to_string().parse::<Device>().unwrap(), device);
        }
    }

    #[test]
    fn test_cpu_maps_to_candle_cpu() {
        assert!(matches!(
            Device::Cpu.to_candle().unwrap(),
            candle_core::Device::Cpu
        ));
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_falls_back_without_feature() {
        assert_eq!(Device::Cuda(0).effective(), Device::Cpu);
    }
}
