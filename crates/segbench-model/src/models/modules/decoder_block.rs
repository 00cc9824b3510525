//! U-Net decoder block: upsample, merge the cropped skip feature, convolve twice.

use burn::{
    nn::conv::{ConvTranspose2d, ConvTranspose2dConfig},
    prelude::*,
    tensor::ops::InterpolateMode,
};
use segbench_extra_ops::center_crop;

use super::{
    conv_block::{ConvolutionalBlock, ConvolutionalBlockConfig},
    layers::resize,
};
use crate::{
    config::{Activation, Normalization, PaddingMode, UpsamplingType},
    error::ModelResult,
    profile::{conv_transpose2d_cost, Cost},
};

/// Configuration for the [`DecoderBlock`] module.
#[derive(Config, Debug)]
pub struct DecoderBlockConfig {
    /// Channels of the incoming deeper feature map.
    pub channels_in: usize,
    /// Channels of the encoder skip feature.
    pub channels_skip: usize,
    /// Channels produced by the block.
    pub channels_out: usize,
    #[config(default = "UpsamplingType::TransposedConv")]
    pub upsampling: UpsamplingType,
    #[config(default = "Normalization::None")]
    pub normalization: Normalization,
    #[config(default = "Activation::Relu")]
    pub activation: Activation,
    #[config(default = "false")]
    pub preactivation: bool,
    /// Add a 1x1 projection of the merged input to the block output.
    #[config(default = "false")]
    pub residual: bool,
    #[config(default = "0")]
    pub padding: usize,
    #[config(default = "PaddingMode::Zeros")]
    pub padding_mode: PaddingMode,
    #[config(default = "1")]
    pub dilation: usize,
    #[config(default = "0.0")]
    pub dropout: f64,
}

impl DecoderBlockConfig {
    /// Channels the upsampler hands to the merge step.
    pub const fn upsampled_channels(&self) -> usize {
        match self.upsampling {
            UpsamplingType::TransposedConv => self.channels_out,
            UpsamplingType::Nearest | UpsamplingType::Bilinear => self.channels_in,
        }
    }

    fn conv_block(&self, channels_in: usize, channels_out: usize) -> ConvolutionalBlockConfig {
        ConvolutionalBlockConfig::new(channels_in, channels_out)
            .with_padding(self.padding)
            .with_padding_mode(self.padding_mode.clone())
            .with_dilation(self.dilation)
            .with_normalization(self.normalization.clone())
            .with_activation(self.activation.clone())
            .with_preactivation(self.preactivation)
            .with_dropout(self.dropout)
    }

    /// Creates a new [`DecoderBlock`].
    ///
    /// # Errors
    ///
    /// Propagates invalid convolution settings.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ModelResult<DecoderBlock<B>> {
        let upsample = match self.upsampling {
            UpsamplingType::TransposedConv => Some(
                ConvTranspose2dConfig::new([self.channels_in, self.channels_out], [2, 2])
                    .with_stride([2, 2])
                    .init(device),
            ),
            UpsamplingType::Nearest | UpsamplingType::Bilinear => None,
        };
        let merged = self.upsampled_channels() + self.channels_skip;

        let conv_1 = self.conv_block(merged, self.channels_out).init(device)?;
        let conv_2 = self
            .conv_block(self.channels_out, self.channels_out)
            .init(device)?;
        let residual = if self.residual {
            Some(
                ConvolutionalBlockConfig::new(merged, self.channels_out)
                    .with_kernel_size(1)
                    .with_normalization(self.normalization.clone())
                    .with_activation(Activation::Identity)
                    .init(device)?,
            )
        } else {
            None
        };

        Ok(DecoderBlock {
            upsample,
            bilinear: self.upsampling == UpsamplingType::Bilinear,
            conv_1,
            conv_2,
            residual,
        })
    }
}

/// Doubles the resolution of deep features and fuses them with an encoder skip.
///
/// # Shapes
///   - x: `[batch_size, channels_in, height, width]`
///   - skip: `[batch_size, channels_skip, skip_height, skip_width]`
///   - output: `[batch_size, channels_out, 2 * height - shrink, 2 * width - shrink]`
#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    upsample: Option<ConvTranspose2d<B>>,
    bilinear: bool,
    conv_1: ConvolutionalBlock<B>,
    conv_2: ConvolutionalBlock<B>,
    residual: Option<ConvolutionalBlock<B>>,
}

impl<B: Backend> DecoderBlock<B> {
    fn interpolation(&self) -> InterpolateMode {
        if self.bilinear {
            InterpolateMode::Bilinear
        } else {
            InterpolateMode::Nearest
        }
    }

    fn upsample(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match &self.upsample {
            Some(upsample) => upsample.forward(x),
            None => {
                let [_, _, height, width] = x.dims();
                resize(x, [height * 2, width * 2], self.interpolation())
            }
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>, skip: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.upsample(x);
        let [_, _, height, width] = x.dims();
        let skip = center_crop(skip, [height, width]);
        let merged = Tensor::cat(vec![x, skip], 1);

        let out = self.conv_2.forward(self.conv_1.forward(merged.clone()));
        match &self.residual {
            Some(projection) => {
                let [_, _, out_h, out_w] = out.dims();
                out + center_crop(projection.forward(merged), [out_h, out_w])
            }
            None => out,
        }
    }

    pub fn cost(&self, input: [usize; 4], skip: [usize; 4]) -> Cost {
        let upsampled = match &self.upsample {
            Some(upsample) => conv_transpose2d_cost(upsample, input),
            None => Cost::free([input[0], input[1], input[2] * 2, input[3] * 2]),
        };
        let [batch, channels, height, width] = upsampled.output;
        let merged = [batch, channels + skip[1], height, width];

        let conv_1 = self.conv_1.cost(merged);
        let conv_2 = self.conv_2.cost(conv_1.output);
        let main = upsampled.reshaped(merged).then(conv_1).then(conv_2);
        match &self.residual {
            Some(projection) => main.plus(projection.cost(merged).macs),
            None => main,
        }
    }
}
