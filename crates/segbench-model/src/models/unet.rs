//! U-Net with center-cropped skip connections.
//!
//! The encoder applies a double convolution per stage and halves the
//! resolution between stages. The decoder upsamples the bottleneck, merges the
//! matching encoder feature cropped to the same size and convolves again. With
//! unpadded convolutions the output is smaller than the input, so the logits
//! can be resized back with `retain_dimension`.

use burn::{
    module::Ignored,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
    },
    prelude::*,
    tensor::ops::InterpolateMode,
};

use super::modules::{
    kaiming_conv2d, resize, ConvolutionalBlock, ConvolutionalBlockConfig, DecoderBlock,
    DecoderBlockConfig,
};
use crate::{
    config::{Activation, Normalization, PaddingMode, UpsamplingType},
    error::{ModelError, ModelResult},
    profile::{conv2d_cost, Cost},
};

/// Configuration for the [`UNet`] model.
#[derive(Config, Debug)]
pub struct UNetConfig {
    /// Input channels followed by the width of every encoder stage.
    #[config(default = "vec![3, 16, 32, 64]")]
    pub encoder_channels: Vec<usize>,
    /// Bottleneck width followed by the width of every decoder block.
    #[config(default = "vec![64, 32, 16]")]
    pub decoder_channels: Vec<usize>,
    /// Number of output channels of the segmentation head.
    #[config(default = "1")]
    pub segmentation_classes: usize,
    /// Resize the logits to `output_size`, or to the input size when unset.
    #[config(default = "true")]
    pub retain_dimension: bool,
    #[config(default = "None")]
    pub output_size: Option<[usize; 2]>,
    #[config(default = "UpsamplingType::TransposedConv")]
    pub upsampling: UpsamplingType,
    #[config(default = "Normalization::None")]
    pub normalization: Normalization,
    #[config(default = "Activation::Relu")]
    pub activation: Activation,
    #[config(default = "false")]
    pub preactivation: bool,
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

impl UNetConfig {
    /// Checks that encoder and decoder widths line up.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfiguration`] describing the first violated rule.
    pub fn validate(&self) -> ModelResult<()> {
        let invalid = |reason: String| Err(ModelError::InvalidConfiguration { reason });
        let encoder = &self.encoder_channels;
        let decoder = &self.decoder_channels;

        if encoder.len() < 2 {
            return invalid(format!(
                "encoder needs input channels and at least one stage, got {encoder:?}"
            ));
        }
        if decoder.len() < 2 {
            return invalid(format!(
                "decoder needs a bottleneck width and at least one block, got {decoder:?}"
            ));
        }
        if decoder[0] != encoder[encoder.len() - 1] {
            return invalid(format!(
                "decoder starts at {} channels but the encoder bottleneck has {}",
                decoder[0],
                encoder[encoder.len() - 1]
            ));
        }
        if decoder.len() > encoder.len() - 1 {
            return invalid(format!(
                "{} decoder blocks need as many skip features, the encoder provides {}",
                decoder.len() - 1,
                encoder.len() - 2
            ));
        }
        if encoder.iter().chain(decoder).any(|&width| width == 0) || self.segmentation_classes == 0
        {
            return invalid("channel counts must be positive".to_string());
        }
        Ok(())
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

    /// Configuration of decoder block `index`, which consumes skip feature
    /// `encoder[len - 2 - index]`.
    pub fn decoder_block(&self, index: usize) -> DecoderBlockConfig {
        let skip = self.encoder_channels[self.encoder_channels.len() - 2 - index];
        DecoderBlockConfig::new(
            self.decoder_channels[index],
            skip,
            self.decoder_channels[index + 1],
        )
        .with_upsampling(self.upsampling.clone())
        .with_normalization(self.normalization.clone())
        .with_activation(self.activation.clone())
        .with_preactivation(self.preactivation)
        .with_residual(self.residual)
        .with_padding(self.padding)
        .with_padding_mode(self.padding_mode.clone())
        .with_dilation(self.dilation)
        .with_dropout(self.dropout)
    }

    /// Initializes a new [`UNet`].
    ///
    /// # Errors
    ///
    /// Fails when [`UNetConfig::validate`] does or a block cannot be built.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ModelResult<UNet<B>> {
        self.validate()?;

        let stages = self
            .encoder_channels
            .windows(2)
            .map(|pair| {
                Ok(EncoderStage {
                    conv_1: self.conv_block(pair[0], pair[1]).init(device)?,
                    conv_2: self.conv_block(pair[1], pair[1]).init(device)?,
                })
            })
            .collect::<ModelResult<Vec<_>>>()?;
        let encoder = Encoder {
            stages,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        };

        let blocks = (0..self.decoder_channels.len() - 1)
            .map(|index| self.decoder_block(index).init(device))
            .collect::<ModelResult<Vec<_>>>()?;
        let decoder = Decoder { blocks };

        let last = self.decoder_channels[self.decoder_channels.len() - 1];
        let head = kaiming_conv2d(
            Conv2dConfig::new([last, self.segmentation_classes], [1, 1]),
            device,
        );

        tracing::debug!(
            encoder = ?self.encoder_channels,
            decoder = ?self.decoder_channels,
            classes = self.segmentation_classes,
            "initialized U-Net"
        );

        Ok(UNet {
            encoder,
            decoder,
            head,
            retain_dimension: self.retain_dimension,
            output_size: Ignored(self.output_size),
        })
    }
}

/// Double convolution of one encoder stage.
#[derive(Module, Debug)]
pub struct EncoderStage<B: Backend> {
    conv_1: ConvolutionalBlock<B>,
    conv_2: ConvolutionalBlock<B>,
}

impl<B: Backend> EncoderStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.conv_2.forward(self.conv_1.forward(x))
    }

    pub fn cost(&self, input: [usize; 4]) -> Cost {
        let first = self.conv_1.cost(input);
        first.then(self.conv_2.cost(first.output))
    }
}

/// U-Net encoder.
///
/// # Shapes
///   - input: `[batch_size, encoder[0], height, width]`
///   - output: the deepest stage output and the earlier stage outputs as skips
#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    stages: Vec<EncoderStage<B>>,
    pool: MaxPool2d,
}

impl<B: Backend> Encoder<B> {
    /// Returns the bottleneck and the skip features, deepest skip first.
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Vec<Tensor<B, 4>>) {
        let mut skips = Vec::with_capacity(self.stages.len());
        let mut x = x;
        for (index, stage) in self.stages.iter().enumerate() {
            if index > 0 {
                skips.push(x.clone());
                x = self.pool.forward(x);
            }
            x = stage.forward(x);
        }
        skips.reverse();
        (x, skips)
    }

    /// Cost of the whole encoder, with the skip shapes deepest first.
    pub fn cost(&self, input: [usize; 4]) -> (Cost, Vec<[usize; 4]>) {
        let mut skips = Vec::with_capacity(self.stages.len());
        let mut cost = Cost::free(input);
        for (index, stage) in self.stages.iter().enumerate() {
            if index > 0 {
                let [batch, channels, height, width] = cost.output;
                skips.push(cost.output);
                cost = cost.reshaped([batch, channels, height / 2, width / 2]);
            }
            cost = cost.then(stage.cost(cost.output));
        }
        skips.reverse();
        (cost, skips)
    }
}

/// U-Net decoder.
#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    blocks: Vec<DecoderBlock<B>>,
}

impl<B: Backend> Decoder<B> {
    /// Decodes the bottleneck using the skip features, deepest first.
    pub fn forward(&self, x: Tensor<B, 4>, skips: Vec<Tensor<B, 4>>) -> Tensor<B, 4> {
        self.blocks
            .iter()
            .zip(skips)
            .fold(x, |x, (block, skip)| block.forward(x, skip))
    }

    pub fn cost(&self, input: [usize; 4], skips: &[[usize; 4]]) -> Cost {
        self.blocks
            .iter()
            .zip(skips)
            .fold(Cost::free(input), |cost, (block, skip)| {
                cost.then(block.cost(cost.output, *skip))
            })
    }
}

/// U-Net segmentation model.
///
/// # Shapes
///   - input: `[batch_size, channels, height, width]`
///   - output: `[batch_size, segmentation_classes, height', width']`, where the
///     spatial size is the input size (or `output_size`) with `retain_dimension`
#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    encoder: Encoder<B>,
    decoder: Decoder<B>,
    head: Conv2d<B>,
    retain_dimension: bool,
    output_size: Ignored<Option<[usize; 2]>>,
}

impl<B: Backend> UNet<B> {
    fn target_size(&self, input: [usize; 4]) -> Option<[usize; 2]> {
        self.retain_dimension
            .then(|| self.output_size.0.unwrap_or([input[2], input[3]]))
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let target = self.target_size(x.dims());
        let (bottleneck, skips) = self.encoder.forward(x);

        let logits = self.head.forward(self.decoder.forward(bottleneck, skips));
        match target {
            Some(size) => resize(logits, size, InterpolateMode::Nearest),
            None => logits,
        }
    }

    pub fn cost(&self, input: [usize; 4]) -> Cost {
        let (encoded, skips) = self.encoder.cost(input);
        let decoded = encoded.then(self.decoder.cost(encoded.output, &skips));
        let logits = decoded.then(conv2d_cost(&self.head, decoded.output));
        match self.target_size(input) {
            Some([height, width]) => {
                logits.reshaped([logits.output[0], logits.output[1], height, width])
            }
            None => logits,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn default_unet_restores_input_size() {
        let device = Default::default();
        let model = UNetConfig::new()
            .with_segmentation_classes(3)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 4>::ones([1, 3, 64, 64], &device);

        let output = model.forward(input);

        assert_eq!(output.dims(), [1, 3, 64, 64]);
        assert_eq!(model.cost([1, 3, 64, 64]).output, [1, 3, 64, 64]);
    }

    #[test]
    fn unpadded_unet_shrinks_without_retained_dimension() {
        let device = Default::default();
        let model = UNetConfig::new()
            .with_retain_dimension(false)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 4>::ones([1, 3, 64, 64], &device);

        // 64 -> 60 | 30 -> 26 | 13 -> 9, then 18 -> 14, 28 -> 24
        let output = model.forward(input);

        assert_eq!(output.dims(), [1, 1, 24, 24]);
        assert_eq!(model.cost([1, 3, 64, 64]).output, [1, 1, 24, 24]);
    }

    #[test]
    fn padded_unet_keeps_resolution() {
        let device = Default::default();
        let model = UNetConfig::new()
            .with_padding(1)
            .with_normalization(Normalization::Batch)
            .with_residual(true)
            .with_retain_dimension(false)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 4>::ones([2, 3, 32, 32], &device);

        assert_eq!(model.forward(input).dims(), [2, 1, 32, 32]);
    }

    #[test]
    fn explicit_output_size_is_honoured() {
        let device = Default::default();
        let model = UNetConfig::new()
            .with_output_size(Some([40, 48]))
            .with_upsampling(UpsamplingType::Bilinear)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 4>::ones([1, 3, 64, 64], &device);

        assert_eq!(model.forward(input).dims(), [1, 1, 40, 48]);
    }

    #[test]
    fn shorter_decoder_uses_deepest_skips() {
        let device = Default::default();
        let model = UNetConfig::new()
            .with_encoder_channels(vec![1, 8, 16, 32])
            .with_decoder_channels(vec![32, 16])
            .with_padding(1)
            .with_retain_dimension(false)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 4>::ones([1, 1, 16, 16], &device);

        assert_eq!(model.forward(input).dims(), [1, 1, 8, 8]);
    }

    #[rstest]
    #[case(vec![3], vec![64, 32])]
    #[case(vec![3, 16, 32, 64], vec![64])]
    #[case(vec![3, 16, 32, 64], vec![32, 16])]
    #[case(vec![3, 16, 32], vec![32, 16, 8])]
    fn invalid_channel_layouts_are_rejected(
        #[case] encoder: Vec<usize>,
        #[case] decoder: Vec<usize>,
    ) {
        let config = UNetConfig::new()
            .with_encoder_channels(encoder)
            .with_decoder_channels(decoder);

        assert!(matches!(
            config.validate(),
            Err(ModelError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn skip_widths_come_from_reversed_encoder() {
        let config = UNetConfig::new();

        assert_eq!(config.decoder_block(0).channels_skip, 32);
        assert_eq!(config.decoder_block(1).channels_skip, 16);
    }
}
