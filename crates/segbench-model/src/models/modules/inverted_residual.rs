//! MobileNetV2 inverted residual block.

use burn::prelude::*;

use super::conv_block::{ConvolutionalBlock, ConvolutionalBlockConfig};
use crate::{
    config::{Activation, Normalization},
    error::ModelResult,
    profile::Cost,
};

/// Conv-BN block without bias, as used by MobileNetV2.
pub(crate) fn conv_bn(
    channels_in: usize,
    channels_out: usize,
    kernel_size: usize,
    activation: Activation,
) -> ConvolutionalBlockConfig {
    ConvolutionalBlockConfig::new(channels_in, channels_out)
        .with_kernel_size(kernel_size)
        .with_padding(kernel_size / 2)
        .with_bias(false)
        .with_normalization(Normalization::Batch)
        .with_activation(activation)
}

/// Configuration for the [`InvertedResidual`] module.
#[derive(Config, Debug)]
pub struct InvertedResidualConfig {
    pub channels_in: usize,
    pub channels_out: usize,
    #[config(default = "1")]
    pub stride: usize,
    /// Width of the hidden depthwise stage relative to `channels_in`.
    #[config(default = "6")]
    pub expand_ratio: usize,
    #[config(default = "1")]
    pub dilation: usize,
}

impl InvertedResidualConfig {
    /// Initializes a new [`InvertedResidual`] block.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ModelResult<InvertedResidual<B>> {
        let hidden = self.channels_in * self.expand_ratio;
        let expand = if self.expand_ratio == 1 {
            None
        } else {
            Some(conv_bn(self.channels_in, hidden, 1, Activation::Relu6).init(device)?)
        };
        let depthwise = conv_bn(hidden, hidden, 3, Activation::Relu6)
            .with_stride(self.stride)
            .with_padding(self.dilation)
            .with_dilation(self.dilation)
            .with_groups(hidden)
            .init(device)?;
        let project = conv_bn(hidden, self.channels_out, 1, Activation::Identity).init(device)?;

        Ok(InvertedResidual {
            expand,
            depthwise,
            project,
            use_residual: self.stride == 1 && self.channels_in == self.channels_out,
        })
    }
}

/// Expand (1x1), depthwise (3x3), project (1x1), with an identity shortcut when
/// the block keeps both resolution and width.
///
/// # Shapes
///   - input: `[batch_size, channels_in, height, width]`
///   - output: `[batch_size, channels_out, height / stride, width / stride]`
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    expand: Option<ConvolutionalBlock<B>>,
    depthwise: ConvolutionalBlock<B>,
    project: ConvolutionalBlock<B>,
    use_residual: bool,
}

impl<B: Backend> InvertedResidual<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = match &self.expand {
            Some(expand) => expand.forward(x.clone()),
            None => x.clone(),
        };
        let out = self.project.forward(self.depthwise.forward(out));

        if self.use_residual {
            out + x
        } else {
            out
        }
    }

    pub fn cost(&self, input: [usize; 4]) -> Cost {
        let expanded = match &self.expand {
            Some(expand) => expand.cost(input),
            None => Cost::free(input),
        };
        let depthwise = self.depthwise.cost(expanded.output);
        let project = self.project.cost(depthwise.output);

        expanded.then(depthwise).then(project)
    }
}
