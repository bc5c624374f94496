//! Shared convolution blocks with frozen batch normalization.

use candle_core::{Module, Result, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, VarBuilder};

const BN_EPS: f64 = 1e-5;

/// Batch normalization in inference mode, read from running statistics.
#[derive(Debug, Clone)]
pub(crate) struct FrozenBatchNorm {
    weight: Tensor,
    bias: Tensor,
    running_mean: Tensor,
    running_var: Tensor,
}

impl FrozenBatchNorm {
    pub(crate) fn load(channels: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            weight: vb.get(channels, "weight")?,
            bias: vb.get(channels, "bias")?,
            running_mean: vb.get(channels, "running_mean")?,
            running_var: vb.get(channels, "running_var")?,
        })
    }
}

impl Module for FrozenBatchNorm {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        // y = (x - mean) / sqrt(var + eps) * weight + bias
        let (_, c, _, _) = x.dims4()?;
        let mean = self.running_mean.reshape((1, c, 1, 1))?;
        let var = self.running_var.reshape((1, c, 1, 1))?;
        let weight = self.weight.reshape((1, c, 1, 1))?;
        let bias = self.bias.reshape((1, c, 1, 1))?;

        let std = (var + BN_EPS)?.sqrt()?;
        x.broadcast_sub(&mean)?
            .broadcast_div(&std)?
            .broadcast_mul(&weight)?
            .broadcast_add(&bias)
    }
}

/// Bias-free convolution followed by batch normalization, no activation.
///
/// Parameter names are supplied by the caller because the backbone stores
/// the pair as siblings (`conv1`/`bn1`) while downsample paths index them
/// (`0`/`1`).
#[derive(Debug, Clone)]
pub(crate) struct ConvBn {
    conv: Conv2d,
    bn: FrozenBatchNorm,
}

impl ConvBn {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn load(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        vb: &VarBuilder,
        conv_name: &str,
        bn_name: &str,
    ) -> Result<Self> {
        let conv_cfg = Conv2dConfig {
            stride,
            padding,
            ..Default::default()
        };
        let conv = candle_nn::conv2d_no_bias(
            in_channels,
            out_channels,
            kernel_size,
            conv_cfg,
            vb.pp(conv_name),
        )?;
        let bn = FrozenBatchNorm::load(out_channels, vb.pp(bn_name))?;
        Ok(Self { conv, bn })
    }
}

impl Module for ConvBn {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.bn.forward(&self.conv.forward(x)?)
    }
}
