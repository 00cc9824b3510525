//! Atrous Spatial Pyramid Pooling (ASPP) for the DeepLabV3+ head.
//!
//! Parallel atrous convolutions and an image-pooling branch capture context
//! at several scales before being fused by a 1x1 projection.

use burn::{
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Dropout, DropoutConfig,
    },
    prelude::*,
    tensor::ops::InterpolateMode,
};

use super::{
    conv_block::{ConvolutionalBlock, ConvolutionalBlockConfig},
    layers::resize,
};
use crate::{
    config::Normalization,
    error::{ModelError, ModelResult},
    profile::Cost,
};

/// Conv-BN-ReLU branch used throughout the ASPP module.
fn branch(
    channels_in: usize,
    channels_out: usize,
    kernel_size: usize,
    dilation: usize,
) -> ConvolutionalBlockConfig {
    ConvolutionalBlockConfig::new(channels_in, channels_out)
        .with_kernel_size(kernel_size)
        .with_padding(if kernel_size == 1 { 0 } else { dilation })
        .with_dilation(dilation)
        .with_bias(false)
        .with_normalization(Normalization::Batch)
}

/// Global average pooling branch.
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output: `[batch_size, out_channels, height, width]`
#[derive(Module, Debug)]
pub struct GlobalAvgPool<B: Backend> {
    pool: AdaptiveAvgPool2d,
    conv: ConvolutionalBlock<B>,
}

impl<B: Backend> GlobalAvgPool<B> {
    pub fn new(
        channels_in: usize,
        channels_out: usize,
        device: &Device<B>,
    ) -> ModelResult<Self> {
        Ok(Self {
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            conv: branch(channels_in, channels_out, 1, 1).init(device)?,
        })
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, height, width] = x.dims();
        let x = self.conv.forward(self.pool.forward(x));
        resize(x, [height, width], InterpolateMode::Bilinear)
    }

    pub fn cost(&self, input: [usize; 4]) -> Cost {
        let pooled = self.conv.cost([input[0], input[1], 1, 1]);
        pooled.reshaped([pooled.output[0], pooled.output[1], input[2], input[3]])
    }
}

/// Configuration for the [`ASPP`] module.
#[derive(Config, Debug)]
pub struct ASPPConfig {
    /// Number of input channels.
    pub in_channels: usize,
    /// Channels of every branch and of the fused output.
    #[config(default = "256")]
    pub out_channels: usize,
    /// The output stride of the encoder, selecting the atrous rates.
    #[config(default = "16")]
    pub output_stride: usize,
    #[config(default = "0.5")]
    pub dropout: f64,
}

impl ASPPConfig {
    /// Atrous rates of the four convolution branches.
    ///
    /// # Errors
    ///
    /// Only output strides 8 and 16 have a rate schedule.
    pub fn dilations(&self) -> ModelResult<[usize; 4]> {
        match self.output_stride {
            16 => Ok([1, 6, 12, 18]),
            8 => Ok([1, 12, 24, 36]),
            stride => Err(ModelError::InvalidConfiguration {
                reason: format!("unsupported ASPP output stride {stride}, expected 8 or 16"),
            }),
        }
    }

    /// Initializes a new [`ASPP`] module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ModelResult<ASPP<B>> {
        let dilations = self.dilations()?;
        let branches = dilations
            .iter()
            .enumerate()
            .map(|(i, &dilation)| {
                let kernel_size = if i == 0 { 1 } else { 3 };
                branch(self.in_channels, self.out_channels, kernel_size, dilation).init(device)
            })
            .collect::<ModelResult<Vec<_>>>()?;
        let global_avg_pool = GlobalAvgPool::new(self.in_channels, self.out_channels, device)?;
        let project = branch(self.out_channels * 5, self.out_channels, 1, 1).init(device)?;

        Ok(ASPP {
            branches,
            global_avg_pool,
            project,
            dropout: DropoutConfig::new(self.dropout).init(),
        })
    }
}

/// Atrous Spatial Pyramid Pooling module.
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output: `[batch_size, out_channels, height, width]`
#[derive(Module, Debug)]
pub struct ASPP<B: Backend> {
    branches: Vec<ConvolutionalBlock<B>>,
    global_avg_pool: GlobalAvgPool<B>,
    project: ConvolutionalBlock<B>,
    dropout: Dropout,
}

impl<B: Backend> ASPP<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut features: Vec<_> = self
            .branches
            .iter()
            .map(|branch| branch.forward(x.clone()))
            .collect();
        features.push(self.global_avg_pool.forward(x));

        let x = self.project.forward(Tensor::cat(features, 1));
        self.dropout.forward(x)
    }

    pub fn cost(&self, input: [usize; 4]) -> Cost {
        let pooled = self.global_avg_pool.cost(input);
        let mut macs = pooled.macs;
        let mut channels = pooled.output[1];
        for branch in &self.branches {
            let cost = branch.cost(input);
            macs += cost.macs;
            channels += cost.output[1];
        }

        let merged = [input[0], channels, input[2], input[3]];
        Cost::free(merged).plus(macs).then(self.project.cost(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn aspp_keeps_spatial_size() {
        let device = Default::default();
        let aspp = ASPPConfig::new(8)
            .with_out_channels(16)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::ones([1, 8, 9, 7], &device);

        let output = aspp.forward(x);

        assert_eq!(output.dims(), [1, 16, 9, 7]);
        assert_eq!(aspp.cost([1, 8, 9, 7]).output, [1, 16, 9, 7]);
    }

    #[test]
    fn unsupported_output_stride_is_an_error() {
        let device = Default::default();
        let result = ASPPConfig::new(8)
            .with_output_stride(32)
            .init::<TestBackend>(&device);

        assert!(matches!(
            result,
            Err(ModelError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn rates_follow_output_stride() {
        assert_eq!(ASPPConfig::new(4).dilations().unwrap(), [1, 6, 12, 18]);
        assert_eq!(
            ASPPConfig::new(4).with_output_stride(8).dilations().unwrap(),
            [1, 12, 24, 36]
        );
    }
}
