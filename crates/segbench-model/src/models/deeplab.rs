//! DeepLabV3+ on a dilated MobileNetV2 encoder.

use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    tensor::ops::InterpolateMode,
};

use super::{
    encoder::{total_macs, MobileNetV2Config, MobileNetV2Encoder},
    modules::{
        kaiming_conv2d, resize, ASPPConfig, ConvolutionalBlock, ConvolutionalBlockConfig, ASPP,
    },
};
use crate::{
    config::Normalization,
    error::ModelResult,
    profile::{conv2d_cost, Cost},
};

/// Conv-BN-ReLU block with "same" padding.
pub(crate) fn conv_bn_relu(
    channels_in: usize,
    channels_out: usize,
    kernel_size: usize,
) -> ConvolutionalBlockConfig {
    ConvolutionalBlockConfig::new(channels_in, channels_out)
        .with_kernel_size(kernel_size)
        .with_padding(kernel_size / 2)
        .with_bias(false)
        .with_normalization(Normalization::Batch)
}

/// 1x1 classifier producing one logit map per class.
pub(crate) fn classifier<B: Backend>(
    channels_in: usize,
    num_classes: usize,
    device: &Device<B>,
) -> Conv2d<B> {
    kaiming_conv2d(Conv2dConfig::new([channels_in, num_classes], [1, 1]), device)
}

/// Configuration for the [`DeepLabV3Plus`] model.
#[derive(Config, Debug)]
pub struct DeepLabV3PlusConfig {
    pub num_classes: usize,
    /// Encoder settings. The output stride is forced to 16.
    #[config(default = "MobileNetV2Config::new()")]
    pub encoder: MobileNetV2Config,
    #[config(default = "256")]
    pub decoder_channels: usize,
    /// Width of the projected stride-4 feature.
    #[config(default = "48")]
    pub low_level_channels: usize,
}

impl DeepLabV3PlusConfig {
    /// Initializes a new [`DeepLabV3Plus`] model.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ModelResult<DeepLabV3Plus<B>> {
        let encoder_config = self.encoder.clone().with_output_stride(16);
        let channels = encoder_config.out_channels();
        let encoder = encoder_config.init(device)?;

        let aspp = ASPPConfig::new(channels[4])
            .with_out_channels(self.decoder_channels)
            .with_output_stride(16)
            .init(device)?;
        let aspp_refine =
            conv_bn_relu(self.decoder_channels, self.decoder_channels, 3).init(device)?;
        let low_level = conv_bn_relu(channels[1], self.low_level_channels, 1).init(device)?;
        let fuse = conv_bn_relu(
            self.decoder_channels + self.low_level_channels,
            self.decoder_channels,
            3,
        )
        .init(device)?;
        let head = classifier(self.decoder_channels, self.num_classes, device);

        tracing::debug!(classes = self.num_classes, "initialized DeepLabV3+");

        Ok(DeepLabV3Plus {
            encoder,
            aspp,
            aspp_refine,
            low_level,
            fuse,
            head,
        })
    }
}

/// DeepLabV3+ segmentation model.
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output: `[batch_size, num_classes, height, width]`
#[derive(Module, Debug)]
pub struct DeepLabV3Plus<B: Backend> {
    encoder: MobileNetV2Encoder<B>,
    aspp: ASPP<B>,
    aspp_refine: ConvolutionalBlock<B>,
    low_level: ConvolutionalBlock<B>,
    fuse: ConvolutionalBlock<B>,
    head: Conv2d<B>,
}

impl<B: Backend> DeepLabV3Plus<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, height, width] = x.dims();
        let features = self.encoder.forward(x);

        let context = self
            .aspp_refine
            .forward(self.aspp.forward(features[4].clone()));
        let low_level = self.low_level.forward(features[1].clone());
        let [_, _, low_h, low_w] = low_level.dims();
        let context = resize(context, [low_h, low_w], InterpolateMode::Bilinear);

        let fused = self.fuse.forward(Tensor::cat(vec![context, low_level], 1));
        let logits = self.head.forward(fused);
        resize(logits, [height, width], InterpolateMode::Bilinear)
    }

    pub fn cost(&self, input: [usize; 4]) -> Cost {
        let levels = self.encoder.cost(input);
        let context = self.aspp.cost(levels[4].output);
        let context = context.then(self.aspp_refine.cost(context.output));
        let low_level = self.low_level.cost(levels[1].output);

        let [batch, _, low_h, low_w] = low_level.output;
        let merged = [batch, context.output[1] + low_level.output[1], low_h, low_w];
        let fused = self.fuse.cost(merged);
        let logits = fused.then(conv2d_cost(&self.head, fused.output));

        logits
            .plus(total_macs(&levels) + context.macs + low_level.macs)
            .reshaped([batch, logits.output[1], input[2], input[3]])
    }
}
