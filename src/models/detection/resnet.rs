//! ResNet-18 feature extractor.
//!
//! Parameters follow the torchvision layout: `conv1`, `bn1`, then
//! `layer{1..4}.{0,1}` basic blocks with an optional `downsample.{0,1}` pair.

use super::layers::ConvBn;
use candle_core::{D, Module, Result, Tensor};
use candle_nn::VarBuilder;

/// Channel width of each stage, from `layer1` to `layer4`.
pub const STAGE_CHANNELS: [usize; 4] = [64, 128, 256, 512];

const BLOCKS_PER_STAGE: usize = 2;

#[derive(Debug, Clone)]
struct BasicBlock {
    conv1: ConvBn,
    conv2: ConvBn,
    downsample: Option<ConvBn>,
}

impl BasicBlock {
    fn load(in_channels: usize, out_channels: usize, stride: usize, vb: VarBuilder) -> Result<Self> {
        let conv1 = ConvBn::load(in_channels, out_channels, 3, stride, 1, &vb, "conv1", "bn1")?;
        let conv2 = ConvBn::load(out_channels, out_channels, 3, 1, 1, &vb, "conv2", "bn2")?;
        let downsample = if stride != 1 || in_channels != out_channels {
            Some(ConvBn::load(
                in_channels,
                out_channels,
                1,
                stride,
                0,
                &vb.pp("downsample"),
                "0",
                "1",
            )?)
        } else {
            None
        };
        Ok(Self {
            conv1,
            conv2,
            downsample,
        })
    }
}

impl Module for BasicBlock {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let out = self.conv1.forward(x)?.relu()?;
        let out = self.conv2.forward(&out)?;
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(x)?,
            None => x.clone(),
        };
        (out + identity)?.relu()
    }
}

/// Backbone returning the outputs of all four stages.
#[derive(Debug, Clone)]
pub struct ResNet18 {
    stem: ConvBn,
    stages: Vec<Vec<BasicBlock>>,
}

impl ResNet18 {
    pub fn load(vb: VarBuilder) -> Result<Self> {
        let stem = ConvBn::load(3, STAGE_CHANNELS[0], 7, 2, 3, &vb, "conv1", "bn1")?;

        let mut stages = Vec::with_capacity(STAGE_CHANNELS.len());
        let mut in_channels = STAGE_CHANNELS[0];
        for (idx, &out_channels) in STAGE_CHANNELS.iter().enumerate() {
            let stage_vb = vb.pp(format!("layer{}", idx + 1));
            let first_stride = if idx == 0 { 1 } else { 2 };
            let blocks = (0..BLOCKS_PER_STAGE)
                .map(|block| {
                    let (cin, stride) = if block == 0 {
                        (in_channels, first_stride)
                    } else {
                        (out_channels, 1)
                    };
                    BasicBlock::load(cin, out_channels, stride, stage_vb.pp(block.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            stages.push(blocks);
            in_channels = out_channels;
        }

        Ok(Self { stem, stages })
    }

    /// Returns the stage outputs at strides 4, 8, 16 and 32.
    pub fn forward_features(&self, x: &Tensor) -> Result<Vec<Tensor>> {
        let x = self.stem.forward(x)?.relu()?;
        // 3x3/2 max pool with padding 1. The input is post-ReLU, so zero
        // padding behaves like negative infinity padding.
        let mut x = x
            .pad_with_zeros(D::Minus2, 1, 1)?
            .pad_with_zeros(D::Minus1, 1, 1)?
            .max_pool2d_with_stride(3, 2)?;

        let mut features = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            for block in stage {
                x = block.forward(&x)?;
            }
            features.push(x.clone());
        }
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn test_stage_strides() {
        let dev = Device::Cpu;
        let backbone = ResNet18::load(VarBuilder::zeros(DType::F32, &dev)).unwrap();
        let x = Tensor::zeros((1, 3, 64, 96), DType::F32, &dev).unwrap();
        let features = backbone.forward_features(&x).unwrap();
        let dims: Vec<_> = features.iter().map(|f| f.dims4().unwrap()).collect();
        assert_eq!(
            dims,
            vec![(1, 64, 16, 24), (1, 128, 8, 12), (1, 256, 4, 6), (1, 512, 2, 3)]
        );
    }
}
