//! MobileNetV2 feature pyramid encoder.
//!
//! Produces five feature maps at strides 2, 4, 8, 16 and 32, which the
//! DeepLabV3+, FPN and SegFormer heads decode. The stage split matches the
//! `mobilenet_v2` encoder of segmentation_models_pytorch.

use burn::prelude::*;

use super::modules::{conv_bn, ConvolutionalBlock, InvertedResidual, InvertedResidualConfig};
use crate::{
    config::Activation,
    error::{ModelError, ModelResult},
    profile::Cost,
};

/// Inverted residual settings `(expansion, channels, repeats, stride)` per stage.
const STAGES: [&[(usize, usize, usize, usize)]; 5] = [
    &[(1, 16, 1, 1)],
    &[(6, 24, 2, 2)],
    &[(6, 32, 3, 2)],
    &[(6, 64, 4, 2), (6, 96, 3, 1)],
    &[(6, 160, 3, 2), (6, 320, 1, 1)],
];

const STEM_CHANNELS: usize = 32;
const LAST_CHANNELS: usize = 1280;

/// Rounds `value` to the nearest multiple of 8 without losing more than 10%.
fn make_divisible(value: f64) -> usize {
    let rounded = (((value + 4.0) as usize) / 8 * 8).max(8);
    if (rounded as f64) < 0.9 * value {
        rounded + 8
    } else {
        rounded
    }
}

/// Configuration for the [`MobileNetV2Encoder`].
#[derive(Config, Debug)]
pub struct MobileNetV2Config {
    #[config(default = "3")]
    pub in_channels: usize,
    /// Channel width multiplier applied to every stage.
    #[config(default = "1.0")]
    pub width_multiplier: f64,
    /// Stride of the deepest feature: 32, or 16 with a dilated last stage.
    #[config(default = "32")]
    pub output_stride: usize,
}

impl MobileNetV2Config {
    fn scaled(&self, channels: usize) -> usize {
        make_divisible(channels as f64 * self.width_multiplier)
    }

    /// Channels of the five returned feature maps, shallowest first.
    pub fn out_channels(&self) -> [usize; 5] {
        [
            self.scaled(16),
            self.scaled(24),
            self.scaled(32),
            self.scaled(96),
            self.last_channels(),
        ]
    }

    fn last_channels(&self) -> usize {
        make_divisible(LAST_CHANNELS as f64 * self.width_multiplier.max(1.0))
    }

    /// Initializes a new [`MobileNetV2Encoder`].
    ///
    /// # Errors
    ///
    /// Fails for output strides other than 16 and 32 and for a non-positive width.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ModelResult<MobileNetV2Encoder<B>> {
        if self.output_stride != 32 && self.output_stride != 16 {
            return Err(ModelError::InvalidConfiguration {
                reason: format!(
                    "MobileNetV2 output stride must be 16 or 32, got {}",
                    self.output_stride
                ),
            });
        }
        if self.width_multiplier <= 0.0 || self.in_channels == 0 {
            return Err(ModelError::InvalidConfiguration {
                reason: format!(
                    "invalid MobileNetV2 input ({} channels, width {})",
                    self.in_channels, self.width_multiplier
                ),
            });
        }

        let stem_channels = self.scaled(STEM_CHANNELS);
        let mut channels = stem_channels;
        let mut stages = Vec::with_capacity(STAGES.len());
        for (index, settings) in STAGES.iter().enumerate() {
            let dilated = self.output_stride == 16 && index == STAGES.len() - 1;
            let stem = (index == 0)
                .then(|| {
                    conv_bn(self.in_channels, stem_channels, 3, Activation::Relu6)
                        .with_stride(2)
                        .init(device)
                })
                .transpose()?;

            let mut blocks = Vec::new();
            for &(expansion, width, repeats, stride) in settings.iter() {
                let width = self.scaled(width);
                for repeat in 0..repeats {
                    let stride = if repeat == 0 && !dilated { stride } else { 1 };
                    blocks.push(
                        InvertedResidualConfig::new(channels, width)
                            .with_stride(stride)
                            .with_expand_ratio(expansion)
                            .with_dilation(if dilated { 2 } else { 1 })
                            .init(device)?,
                    );
                    channels = width;
                }
            }

            let head = (index == STAGES.len() - 1)
                .then(|| {
                    conv_bn(channels, self.last_channels(), 1, Activation::Relu6).init(device)
                })
                .transpose()?;

            stages.push(EncoderStage { stem, blocks, head });
        }

        tracing::debug!(
            width = self.width_multiplier,
            output_stride = self.output_stride,
            channels = ?self.out_channels(),
            "initialized MobileNetV2 encoder"
        );

        Ok(MobileNetV2Encoder { stages })
    }
}

/// One resolution level of the encoder.
#[derive(Module, Debug)]
pub struct EncoderStage<B: Backend> {
    stem: Option<ConvolutionalBlock<B>>,
    blocks: Vec<InvertedResidual<B>>,
    head: Option<ConvolutionalBlock<B>>,
}

impl<B: Backend> EncoderStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = match &self.stem {
            Some(stem) => stem.forward(x),
            None => x,
        };
        let x = self.blocks.iter().fold(x, |x, block| block.forward(x));
        match &self.head {
            Some(head) => head.forward(x),
            None => x,
        }
    }

    pub fn cost(&self, input: [usize; 4]) -> Cost {
        let cost = match &self.stem {
            Some(stem) => stem.cost(input),
            None => Cost::free(input),
        };
        let cost = self
            .blocks
            .iter()
            .fold(cost, |cost, block| cost.then(block.cost(cost.output)));
        match &self.head {
            Some(head) => cost.then(head.cost(cost.output)),
            None => cost,
        }
    }
}

/// MobileNetV2 backbone returning a five level feature pyramid.
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output: five tensors at strides 2, 4, 8, 16 and 32 (or 16 when dilated)
#[derive(Module, Debug)]
pub struct MobileNetV2Encoder<B: Backend> {
    stages: Vec<EncoderStage<B>>,
}

impl<B: Backend> MobileNetV2Encoder<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let mut features = Vec::with_capacity(self.stages.len());
        let mut x = x;
        for stage in &self.stages {
            x = stage.forward(x);
            features.push(x.clone());
        }
        features
    }

    /// Per-level costs, shallowest first.
    pub fn cost(&self, input: [usize; 4]) -> Vec<Cost> {
        let mut shape = input;
        self.stages
            .iter()
            .map(|stage| {
                let cost = stage.cost(shape);
                shape = cost.output;
                cost
            })
            .collect()
    }
}

/// Total MACs of a list of per-level costs.
pub(crate) fn total_macs(costs: &[Cost]) -> u64 {
    costs.iter().map(|cost| cost.macs).sum()
}
