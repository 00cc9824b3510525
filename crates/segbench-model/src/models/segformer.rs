//! SegFormer all-MLP decode head on a MobileNetV2 encoder.
//!
//! Each pyramid level is linearly projected (a 1x1 convolution) to a common
//! embedding width, resized to stride 4, concatenated and fused.

use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    tensor::ops::InterpolateMode,
};

use super::{
    deeplab::{classifier, conv_bn_relu},
    encoder::{total_macs, MobileNetV2Config, MobileNetV2Encoder},
    modules::{kaiming_conv2d, resize, ConvolutionalBlock},
};
use crate::{
    error::ModelResult,
    profile::{conv2d_cost, Cost},
};

/// Configuration for the [`SegFormer`] model.
#[derive(Config, Debug)]
pub struct SegFormerConfig {
    pub num_classes: usize,
    #[config(default = "MobileNetV2Config::new()")]
    pub encoder: MobileNetV2Config,
    /// Common width every level is projected to.
    #[config(default = "256")]
    pub embedding_channels: usize,
}

impl SegFormerConfig {
    /// Initializes a new [`SegFormer`] model.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ModelResult<SegFormer<B>> {
        let channels = self.encoder.out_channels();
        let encoder = self.encoder.init(device)?;
        let projections = channels[1..]
            .iter()
            .map(|&width| {
                kaiming_conv2d(
                    Conv2dConfig::new([width, self.embedding_channels], [1, 1]),
                    device,
                )
            })
            .collect();
        let fuse = conv_bn_relu(
            self.embedding_channels * (channels.len() - 1),
            self.embedding_channels,
            1,
        )
        .init(device)?;
        let head = classifier(self.embedding_channels, self.num_classes, device);

        tracing::debug!(classes = self.num_classes, "initialized SegFormer");

        Ok(SegFormer {
            encoder,
            projections,
            fuse,
            head,
        })
    }
}

/// SegFormer segmentation model.
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output: `[batch_size, num_classes, height, width]`
#[derive(Module, Debug)]
pub struct SegFormer<B: Backend> {
    encoder: MobileNetV2Encoder<B>,
    projections: Vec<Conv2d<B>>,
    fuse: ConvolutionalBlock<B>,
    head: Conv2d<B>,
}

impl<B: Backend> SegFormer<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, height, width] = x.dims();
        let features = self.encoder.forward(x);
        let [_, _, h4, w4] = features[1].dims();

        let embedded = self
            .projections
            .iter()
            .zip(&features[1..])
            .rev()
            .map(|(projection, feature)| {
                resize(
                    projection.forward(feature.clone()),
                    [h4, w4],
                    InterpolateMode::Bilinear,
                )
            })
            .collect();

        let fused = self.fuse.forward(Tensor::cat(embedded, 1));
        let logits = self.head.forward(fused);
        resize(logits, [height, width], InterpolateMode::Bilinear)
    }

    pub fn cost(&self, input: [usize; 4]) -> Cost {
        let levels = self.encoder.cost(input);
        let [batch, _, h4, w4] = levels[1].output;

        let mut macs = total_macs(&levels);
        let mut channels = 0;
        for (projection, level) in self.projections.iter().zip(&levels[1..]) {
            let cost = conv2d_cost(projection, level.output);
            macs += cost.macs;
            channels += cost.output[1];
        }

        let fused = self.fuse.cost([batch, channels, h4, w4]);
        let logits = fused.then(conv2d_cost(&self.head, fused.output)).plus(macs);
        logits.reshaped([batch, logits.output[1], input[2], input[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{assert_kaiming_fan_out, TestBackend};

    #[test]
    fn logits_match_input_resolution() {
        let device = Default::default();
        let model = SegFormerConfig::new(4)
            .with_encoder(MobileNetV2Config::new().with_width_multiplier(0.5))
            .with_embedding_channels(32)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 4>::ones([1, 3, 96, 64], &device);

        assert_eq!(model.forward(input).dims(), [1, 4, 96, 64]);
        assert_eq!(model.cost([1, 3, 96, 64]).output, [1, 4, 96, 64]);
    }

    #[test]
    fn projections_use_kaiming_fan_out() {
        let device = Default::default();
        let model = SegFormerConfig::new(3).init::<TestBackend>(&device).unwrap();

        model.projections.iter().for_each(assert_kaiming_fan_out);
    }
}
