//! Convolution with optional normalization, activation and dropout.

use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Dropout, DropoutConfig, Initializer, PaddingConfig2d,
    },
    prelude::*,
};

use super::layers::{ActivationLayer, NormLayer};
use crate::{
    config::{Activation, Normalization, PaddingMode},
    error::{ModelError, ModelResult},
    profile::{conv2d_cost, Cost},
};

/// Initializes `config` with Kaiming-normal fan-out weights under ReLU gain
/// and a zero bias.
pub fn kaiming_conv2d<B: Backend>(config: Conv2dConfig, device: &Device<B>) -> Conv2d<B> {
    let mut conv = config
        .with_initializer(Initializer::KaimingNormal {
            gain: SQRT_2,
            fan_out_only: true,
        })
        .init(device);
    conv.bias = conv.bias.map(|bias| bias.map(|tensor| tensor.zeros_like()));
    conv
}

/// Configuration for the [`ConvolutionalBlock`] module.
#[derive(Config, Debug)]
pub struct ConvolutionalBlockConfig {
    /// Number of input channels.
    pub channels_in: usize,
    /// Number of output channels.
    pub channels_out: usize,
    #[config(default = "3")]
    pub kernel_size: usize,
    #[config(default = "1")]
    pub stride: usize,
    /// Zero padding on every border. `0` shrinks each spatial axis by `kernel_size - 1`.
    #[config(default = "0")]
    pub padding: usize,
    #[config(default = "PaddingMode::Zeros")]
    pub padding_mode: PaddingMode,
    #[config(default = "1")]
    pub dilation: usize,
    #[config(default = "1")]
    pub groups: usize,
    #[config(default = "true")]
    pub bias: bool,
    #[config(default = "Normalization::None")]
    pub normalization: Normalization,
    #[config(default = "Activation::Relu")]
    pub activation: Activation,
    /// Normalize and activate before the convolution instead of after it.
    #[config(default = "false")]
    pub preactivation: bool,
    /// Dropout probability applied to the block output.
    #[config(default = "0.0")]
    pub dropout: f64,
}

impl ConvolutionalBlockConfig {
    /// Creates a new [`ConvolutionalBlock`].
    ///
    /// # Errors
    ///
    /// Fails for padding modes other than zeros, for a dropout probability
    /// outside `[0, 1)` and for invalid group normalization settings.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ModelResult<ConvolutionalBlock<B>> {
        if self.padding_mode != PaddingMode::Zeros {
            return Err(ModelError::InvalidConfiguration {
                reason: format!(
                    "padding mode {:?} is not supported, only zero padding is",
                    self.padding_mode
                ),
            });
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ModelError::InvalidConfiguration {
                reason: format!("dropout probability {} is outside [0, 1)", self.dropout),
            });
        }

        let conv = kaiming_conv2d(
            Conv2dConfig::new(
                [self.channels_in, self.channels_out],
                [self.kernel_size, self.kernel_size],
            )
            .with_stride([self.stride, self.stride])
            .with_padding(PaddingConfig2d::Explicit(self.padding, self.padding))
            .with_dilation([self.dilation, self.dilation])
            .with_groups(self.groups)
            .with_bias(self.bias),
            device,
        );

        let norm_channels = if self.preactivation {
            self.channels_in
        } else {
            self.channels_out
        };
        let norm = NormLayer::new(&self.normalization, norm_channels, device)?;
        let activation = ActivationLayer::new(&self.activation);
        let dropout = (self.dropout > 0.0).then(|| DropoutConfig::new(self.dropout).init());

        Ok(ConvolutionalBlock {
            conv,
            norm,
            activation,
            dropout,
            preactivation: self.preactivation,
        })
    }
}

/// A single convolution wrapped with normalization and activation.
///
/// # Shapes
///   - input: `[batch_size, channels_in, height, width]`
///   - output: `[batch_size, channels_out, height', width']`
#[derive(Module, Debug)]
pub struct ConvolutionalBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: NormLayer<B>,
    activation: ActivationLayer<B>,
    dropout: Option<Dropout>,
    preactivation: bool,
}

impl<B: Backend> ConvolutionalBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = if self.preactivation {
            let x = self.activation.forward(self.norm.forward(x));
            self.conv.forward(x)
        } else {
            let x = self.norm.forward(self.conv.forward(x));
            self.activation.forward(x)
        };

        match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None => x,
        }
    }

    pub fn cost(&self, input: [usize; 4]) -> Cost {
        if self.preactivation {
            Cost::free(input)
                .plus(self.norm.cost(input))
                .then(conv2d_cost(&self.conv, input))
        } else {
            let conv = conv2d_cost(&self.conv, input);
            conv.plus(self.norm.cost(conv.output))
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::tests::TestBackend;

    #[rstest]
    #[case(0, 1, [1, 4, 14, 10])]
    #[case(1, 1, [1, 4, 16, 12])]
    #[case(2, 2, [1, 4, 16, 12])]
    fn output_shape_follows_padding(
        #[case] padding: usize,
        #[case] dilation: usize,
        #[case] expected: [usize; 4],
    ) {
        let device = Default::default();
        let block = ConvolutionalBlockConfig::new(3, 4)
            .with_padding(padding)
            .with_dilation(dilation)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 4>::ones([1, 3, 16, 12], &device);

        let output = block.forward(input);

        assert_eq!(output.dims(), expected);
        assert_eq!(block.cost([1, 3, 16, 12]).output, expected);
    }

    #[test]
    fn relu_output_is_non_negative() {
        let device = Default::default();
        let block = ConvolutionalBlockConfig::new(2, 6)
            .with_padding(1)
            .with_normalization(Normalization::Batch)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 4>::random(
            [2, 2, 8, 8],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        let output = block.forward(input).into_data().to_vec::<f32>().unwrap();

        assert!(output.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn preactivation_normalizes_input_channels() {
        let device = Default::default();
        let block = ConvolutionalBlockConfig::new(3, 5)
            .with_normalization(Normalization::Batch)
            .with_preactivation(true)
            .init::<TestBackend>(&device)
            .unwrap();

        let cost = block.cost([1, 3, 6, 6]);

        assert_eq!(cost.output, [1, 5, 4, 4]);
        assert_eq!(cost.macs, 2 * 3 * 36 + 5 * 16 * 3 * 9);
    }

    #[test]
    fn non_zero_padding_mode_is_rejected() {
        let device = Default::default();
        let result = ConvolutionalBlockConfig::new(3, 4)
            .with_padding(1)
            .with_padding_mode(PaddingMode::Reflect)
            .init::<TestBackend>(&device);

        assert!(matches!(
            result,
            Err(ModelError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn dropout_probability_is_validated() {
        let device = Default::default();
        let result = ConvolutionalBlockConfig::new(3, 4)
            .with_dropout(1.0)
            .init::<TestBackend>(&device);

        assert!(result.is_err());
    }
}
