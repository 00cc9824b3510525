//! Normalization and activation layers selected by configuration.

use burn::{
    nn::{
        BatchNorm, BatchNormConfig, Gelu, GroupNorm, GroupNormConfig, InstanceNorm,
        InstanceNormConfig, LeakyRelu, LeakyReluConfig, Relu,
    },
    prelude::*,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};
use segbench_extra_ops::Identity;

use crate::{
    config::{Activation, Normalization},
    error::{ModelError, ModelResult},
    profile::norm_cost,
};

/// Normalization layer chosen from a [`Normalization`] setting.
#[derive(Module, Debug)]
pub enum NormLayer<B: Backend> {
    Batch(BatchNorm<B, 2>),
    Instance(InstanceNorm<B>),
    Group(GroupNorm<B>),
    Identity(Identity<B>),
}

impl<B: Backend> NormLayer<B> {
    /// Creates the normalization layer for `channels` feature maps.
    ///
    /// # Errors
    ///
    /// Group normalization needs `channels` to be a multiple of the group count.
    pub fn new(
        normalization: &Normalization,
        channels: usize,
        device: &Device<B>,
    ) -> ModelResult<Self> {
        let layer = match normalization {
            Normalization::None => Self::Identity(Identity::new()),
            Normalization::Batch => Self::Batch(BatchNormConfig::new(channels).init(device)),
            Normalization::Instance => {
                Self::Instance(InstanceNormConfig::new(channels).init(device))
            }
            Normalization::Group(groups) => {
                if *groups == 0 || channels % groups != 0 {
                    return Err(ModelError::InvalidConfiguration {
                        reason: format!(
                            "group normalization needs channels ({channels}) divisible by groups ({groups})"
                        ),
                    });
                }
                Self::Group(GroupNormConfig::new(*groups, channels).init(device))
            }
        };
        Ok(layer)
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Batch(norm) => norm.forward(x),
            Self::Instance(norm) => norm.forward(x),
            Self::Group(norm) => norm.forward(x),
            Self::Identity(identity) => identity.forward(x),
        }
    }

    /// Operations spent normalizing a tensor of shape `shape`.
    pub fn cost(&self, shape: [usize; 4]) -> u64 {
        match self {
            Self::Identity(_) => 0,
            _ => norm_cost(shape),
        }
    }
}

/// ReLU clipped at 6.
#[derive(Module, Clone, Debug, Default)]
pub struct Relu6;

impl Relu6 {
    pub const fn new() -> Self {
        Self
    }

    pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        x.clamp(0.0, 6.0)
    }
}

/// Activation layer chosen from an [`Activation`] setting.
#[derive(Module, Debug)]
pub enum ActivationLayer<B: Backend> {
    Relu(Relu),
    Relu6(Relu6),
    LeakyRelu(LeakyRelu),
    Gelu(Gelu),
    Identity(Identity<B>),
}

impl<B: Backend> ActivationLayer<B> {
    pub fn new(activation: &Activation) -> Self {
        match activation {
            Activation::Relu => Self::Relu(Relu::new()),
            Activation::Relu6 => Self::Relu6(Relu6::new()),
            Activation::LeakyRelu(slope) => Self::LeakyRelu(
                LeakyReluConfig::new()
                    .with_negative_slope(*slope)
                    .init(),
            ),
            Activation::Gelu => Self::Gelu(Gelu::new()),
            Activation::Identity => Self::Identity(Identity::new()),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Relu(relu) => relu.forward(x),
            Self::Relu6(relu6) => relu6.forward(x),
            Self::LeakyRelu(leaky) => leaky.forward(x),
            Self::Gelu(gelu) => gelu.forward(x),
            Self::Identity(identity) => identity.forward(x),
        }
    }
}

/// Resizes the spatial dimensions of `x` to `size = [height, width]`.
///
/// Returns the input untouched when it already has the requested size.
pub fn resize<B: Backend>(x: Tensor<B, 4>, size: [usize; 2], mode: InterpolateMode) -> Tensor<B, 4> {
    let [_, _, height, width] = x.dims();
    if [height, width] == size {
        return x;
    }
    interpolate(x, size, InterpolateOptions::new(mode))
}
