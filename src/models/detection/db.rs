//! DBNet text detector built from checkpoint parameters.
//!
//! The network is a ResNet-18 backbone, a feature pyramid neck that fuses the
//! four stages into a quarter-resolution map, and the binarization head that
//! upsamples back to input resolution. Parameter groups live under
//! `backbone.*`, `neck.*` and `head.binarize.*` relative to the builder.
//!
//! Only the probability branch is built; the threshold branch of the head is
//! a training aid and never read at inference.

use super::layers::FrozenBatchNorm;
use super::resnet::{ResNet18, STAGE_CHANNELS};
use candle_core::{Module, Result, Tensor};
use candle_nn::{
    Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig, VarBuilder,
};

/// Channel width of the fused pyramid.
pub const NECK_CHANNELS: usize = 256;

const BRANCH_CHANNELS: usize = NECK_CHANNELS / 4;

fn conv(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    vb: VarBuilder,
) -> Result<Conv2d> {
    let cfg = Conv2dConfig {
        padding: kernel_size / 2,
        ..Default::default()
    };
    candle_nn::conv2d_no_bias(in_channels, out_channels, kernel_size, cfg, vb)
}

fn upsample_to(x: &Tensor, reference: &Tensor) -> Result<Tensor> {
    let (_, _, h, w) = reference.dims4()?;
    x.upsample_nearest2d(h, w)
}

/// Feature pyramid neck.
///
/// Lateral 1x1 convolutions (`in2`..`in5`) are merged top-down, then each
/// level is reduced to a quarter of the channels by a 3x3 convolution
/// (`out2`, `out3.0`, `out4.0`, `out5.0`) and upsampled to the finest level.
#[derive(Debug, Clone)]
struct FpnNeck {
    lateral: [Conv2d; 4],
    smooth: [Conv2d; 4],
}

impl FpnNeck {
    fn load(vb: VarBuilder) -> Result<Self> {
        let lateral = [
            conv(STAGE_CHANNELS[0], NECK_CHANNELS, 1, vb.pp("in2"))?,
            conv(STAGE_CHANNELS[1], NECK_CHANNELS, 1, vb.pp("in3"))?,
            conv(STAGE_CHANNELS[2], NECK_CHANNELS, 1, vb.pp("in4"))?,
            conv(STAGE_CHANNELS[3], NECK_CHANNELS, 1, vb.pp("in5"))?,
        ];
        let smooth = [
            conv(NECK_CHANNELS, BRANCH_CHANNELS, 3, vb.pp("out2"))?,
            conv(NECK_CHANNELS, BRANCH_CHANNELS, 3, vb.pp("out3").pp("0"))?,
            conv(NECK_CHANNELS, BRANCH_CHANNELS, 3, vb.pp("out4").pp("0"))?,
            conv(NECK_CHANNELS, BRANCH_CHANNELS, 3, vb.pp("out5").pp("0"))?,
        ];
        Ok(Self { lateral, smooth })
    }

    fn forward(&self, features: &[Tensor]) -> Result<Tensor> {
        let [c2, c3, c4, c5] = features else {
            candle_core::bail!("expected 4 backbone stages, got {}", features.len());
        };

        let in5 = self.lateral[3].forward(c5)?;
        let in4 = self.lateral[2].forward(c4)?;
        let in3 = self.lateral[1].forward(c3)?;
        let in2 = self.lateral[0].forward(c2)?;

        let out4 = (upsample_to(&in5, &in4)? + in4)?;
        let out3 = (upsample_to(&out4, &in3)? + in3)?;
        let out2 = (upsample_to(&out3, &in2)? + in2)?;

        let p5 = upsample_to(&self.smooth[3].forward(&in5)?, &out2)?;
        let p4 = upsample_to(&self.smooth[2].forward(&out4)?, &out2)?;
        let p3 = upsample_to(&self.smooth[1].forward(&out3)?, &out2)?;
        let p2 = self.smooth[0].forward(&out2)?;

        Tensor::cat(&[&p5, &p4, &p3, &p2], 1)
    }
}

/// Probability branch of the DB head.
#[derive(Debug, Clone)]
struct BinarizeHead {
    conv: Conv2d,
    bn1: FrozenBatchNorm,
    up1: ConvTranspose2d,
    bn2: FrozenBatchNorm,
    up2: ConvTranspose2d,
}

impl BinarizeHead {
    fn load(vb: VarBuilder) -> Result<Self> {
        let up_cfg = ConvTranspose2dConfig {
            padding: 0,
            output_padding: 0,
            stride: 2,
            dilation: 1,
        };
        Ok(Self {
            conv: conv(NECK_CHANNELS, BRANCH_CHANNELS, 3, vb.pp("0"))?,
            bn1: FrozenBatchNorm::load(BRANCH_CHANNELS, vb.pp("1"))?,
            up1: candle_nn::conv_transpose2d(
                BRANCH_CHANNELS,
                BRANCH_CHANNELS,
                2,
                up_cfg,
                vb.pp("3"),
            )?,
            bn2: FrozenBatchNorm::load(BRANCH_CHANNELS, vb.pp("4"))?,
            up2: candle_nn::conv_transpose2d(BRANCH_CHANNELS, 1, 2, up_cfg, vb.pp("6"))?,
        })
    }
}

impl Module for BinarizeHead {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.bn1.forward(&self.conv.forward(x)?)?.relu()?;
        let x = self.bn2.forward(&self.up1.forward(&x)?)?.relu()?;
        candle_nn::ops::sigmoid(&self.up2.forward(&x)?)
    }
}

/// The full detector: `(N, 3, H, W)` in, `(N, 1, H, W)` probabilities out.
#[derive(Debug, Clone)]
pub struct DbNet {
    backbone: ResNet18,
    neck: FpnNeck,
    head: BinarizeHead,
}

impl DbNet {
    pub fn load(vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            backbone: ResNet18::load(vb.pp("backbone"))?,
            neck: FpnNeck::load(vb.pp("neck"))?,
            head: BinarizeHead::load(vb.pp("head").pp("binarize"))?,
        })
    }
}

impl Module for DbNet {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let features = self.backbone.forward_features(x)?;
        let fused = self.neck.forward(&features)?;
        self.head.forward(&fused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn test_output_matches_input_resolution() {
        let dev = Device::Cpu;
        let net = DbNet::load(VarBuilder::zeros(DType::F32, &dev)).unwrap();
        let x = Tensor::zeros((2, 3, 64, 96), DType::F32, &dev).unwrap();
        let y = net.forward(&x).unwrap();
        assert_eq!(y.dims4().unwrap(), (2, 1, 64, 96));
    }

    #[test]
    fn test_zero_weights_give_half_probability() {
        let dev = Device::Cpu;
        let net = DbNet::load(VarBuilder::zeros(DType::F32, &dev)).unwrap();
        let x = Tensor::ones((1, 3, 32, 32), DType::F32, &dev).unwrap();
        let values = net
            .forward(&x)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert!(values.iter().all(|v| (v - 0.5).abs() < 1e-6));
    }
}
