//! Feature Pyramid Network head on a MobileNetV2 encoder.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Dropout, DropoutConfig,
    },
    prelude::*,
    tensor::ops::InterpolateMode,
};

use super::{
    deeplab::classifier,
    encoder::{total_macs, MobileNetV2Config, MobileNetV2Encoder},
    modules::{kaiming_conv2d, resize, ConvolutionalBlock, ConvolutionalBlockConfig},
};
use crate::{
    config::Normalization,
    error::ModelResult,
    profile::{conv2d_cost, Cost},
};

/// Configuration for the [`Fpn`] model.
#[derive(Config, Debug)]
pub struct FpnConfig {
    pub num_classes: usize,
    #[config(default = "MobileNetV2Config::new()")]
    pub encoder: MobileNetV2Config,
    /// Width of the top-down pyramid.
    #[config(default = "256")]
    pub pyramid_channels: usize,
    /// Width of the per-level segmentation branches.
    #[config(default = "128")]
    pub segmentation_channels: usize,
    #[config(default = "0.2")]
    pub dropout: f64,
}

impl FpnConfig {
    /// Initializes a new [`Fpn`] model.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ModelResult<Fpn<B>> {
        let channels = self.encoder.out_channels();
        let encoder = self.encoder.init(device)?;

        // Levels at strides 4, 8, 16 and 32.
        let lateral = channels[1..]
            .iter()
            .map(|&width| {
                kaiming_conv2d(Conv2dConfig::new([width, self.pyramid_channels], [1, 1]), device)
            })
            .collect();

        let groups = 32.min(self.segmentation_channels);
        let branches = (0..4)
            .map(|level| {
                let blocks = level.max(1);
                let convs = (0..blocks)
                    .map(|index| {
                        let channels_in = if index == 0 {
                            self.pyramid_channels
                        } else {
                            self.segmentation_channels
                        };
                        ConvolutionalBlockConfig::new(channels_in, self.segmentation_channels)
                            .with_padding(1)
                            .with_bias(false)
                            .with_normalization(Normalization::Group(groups))
                            .init(device)
                    })
                    .collect::<ModelResult<Vec<_>>>()?;
                Ok(SegmentationBranch {
                    convs,
                    upsample: level > 0,
                })
            })
            .collect::<ModelResult<Vec<_>>>()?;

        let head = classifier(self.segmentation_channels, self.num_classes, device);

        tracing::debug!(classes = self.num_classes, "initialized FPN");

        Ok(Fpn {
            encoder,
            lateral,
            branches,
            dropout: DropoutConfig::new(self.dropout).init(),
            head,
        })
    }
}

/// Conv-GN-ReLU blocks bringing one pyramid level to stride 4.
#[derive(Module, Debug)]
pub struct SegmentationBranch<B: Backend> {
    convs: Vec<ConvolutionalBlock<B>>,
    upsample: bool,
}

impl<B: Backend> SegmentationBranch<B> {
    pub fn forward(&self, x: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
        let x = self.convs.iter().fold(x, |x, conv| {
            let x = conv.forward(x);
            if self.upsample {
                let [_, _, height, width] = x.dims();
                resize(x, [height * 2, width * 2], InterpolateMode::Bilinear)
            } else {
                x
            }
        });
        resize(x, size, InterpolateMode::Bilinear)
    }

    pub fn cost(&self, input: [usize; 4], size: [usize; 2]) -> Cost {
        let cost = self.convs.iter().fold(Cost::free(input), |cost, conv| {
            let cost = cost.then(conv.cost(cost.output));
            if self.upsample {
                let [batch, channels, height, width] = cost.output;
                cost.reshaped([batch, channels, height * 2, width * 2])
            } else {
                cost
            }
        });
        cost.reshaped([cost.output[0], cost.output[1], size[0], size[1]])
    }
}

/// Feature Pyramid Network segmentation model.
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output: `[batch_size, num_classes, height, width]`
#[derive(Module, Debug)]
pub struct Fpn<B: Backend> {
    encoder: MobileNetV2Encoder<B>,
    lateral: Vec<Conv2d<B>>,
    branches: Vec<SegmentationBranch<B>>,
    dropout: Dropout,
    head: Conv2d<B>,
}

impl<B: Backend> Fpn<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, height, width] = x.dims();
        let features = self.encoder.forward(x);

        // Top-down pass, deepest level first.
        let mut pyramid: Vec<Tensor<B, 4>> = Vec::with_capacity(self.lateral.len());
        for (lateral, feature) in self.lateral.iter().zip(&features[1..]).rev() {
            let skip = lateral.forward(feature.clone());
            let level = match pyramid.last() {
                Some(above) => {
                    let [_, _, h, w] = skip.dims();
                    resize(above.clone(), [h, w], InterpolateMode::Nearest) + skip
                }
                None => skip,
            };
            pyramid.push(level);
        }
        pyramid.reverse();

        let [_, _, h4, w4] = pyramid[0].dims();
        let mut merged = self.branches[0].forward(pyramid[0].clone(), [h4, w4]);
        for (branch, level) in self.branches.iter().zip(pyramid).skip(1) {
            merged = merged + branch.forward(level, [h4, w4]);
        }

        let logits = self.head.forward(self.dropout.forward(merged));
        resize(logits, [height, width], InterpolateMode::Bilinear)
    }

    pub fn cost(&self, input: [usize; 4]) -> Cost {
        let levels = self.encoder.cost(input);
        let mut macs = total_macs(&levels);

        let mut pyramid = Vec::with_capacity(self.lateral.len());
        for (lateral, level) in self.lateral.iter().zip(&levels[1..]) {
            let cost = conv2d_cost(lateral, level.output);
            macs += cost.macs;
            pyramid.push(cost.output);
        }

        let [_, _, h4, w4] = pyramid[0];
        let mut merged = [input[0], 0, h4, w4];
        for (branch, shape) in self.branches.iter().zip(&pyramid) {
            let cost = branch.cost(*shape, [h4, w4]);
            macs += cost.macs;
            merged = cost.output;
        }

        let logits = conv2d_cost(&self.head, merged).plus(macs);
        logits.reshaped([input[0], logits.output[1], input[2], input[3]])
    }
}
