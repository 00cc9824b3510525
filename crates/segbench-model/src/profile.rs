//! Analytic compute cost of the segmentation models.
//!
//! Every module exposes a `cost(input)` method mirroring the shape logic of its
//! `forward`, so a model can be profiled for any input size without running it.
//! Multiply-accumulate counts follow the thop conventions: convolutions count
//! one MAC per kernel tap per output element, normalization counts two
//! operations per element, and parameter-free layers are free.

use burn::nn::{
    conv::{Conv2d, ConvTranspose2d},
    PaddingConfig2d,
};
use burn::prelude::*;

/// Output shape and accumulated multiply-accumulate count of a forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cost {
    /// Shape `[batch, channels, height, width]` of the produced tensor.
    pub output: [usize; 4],
    /// Multiply-accumulate operations needed to produce it.
    pub macs: u64,
}

impl Cost {
    /// A shape produced without any arithmetic.
    pub const fn free(output: [usize; 4]) -> Self {
        Self { output, macs: 0 }
    }

    /// Chains a later stage, keeping its output shape and summing the work.
    #[must_use]
    pub const fn then(self, next: Self) -> Self {
        Self {
            output: next.output,
            macs: self.macs + next.macs,
        }
    }

    /// Adds work that does not change the output shape.
    #[must_use]
    pub const fn plus(self, macs: u64) -> Self {
        Self {
            output: self.output,
            macs: self.macs + macs,
        }
    }

    /// Replaces the output shape without adding work.
    #[must_use]
    pub const fn reshaped(self, output: [usize; 4]) -> Self {
        Self {
            output,
            macs: self.macs,
        }
    }

    /// Floating point operations, counted as two per MAC.
    pub const fn flops(&self) -> u64 {
        self.macs * 2
    }
}

/// Number of elements of a 4-D shape.
pub const fn numel(shape: [usize; 4]) -> u64 {
    (shape[0] * shape[1] * shape[2] * shape[3]) as u64
}

/// Spatial output length of a convolution along one axis.
pub const fn conv_output_len(
    len: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    dilation: usize,
) -> usize {
    let span = dilation * (kernel - 1) + 1;
    let padded = len + 2 * padding;
    if padded < span {
        0
    } else {
        (padded - span) / stride + 1
    }
}

fn explicit_padding(padding: &PaddingConfig2d, kernel: [usize; 2]) -> [usize; 2] {
    match padding {
        PaddingConfig2d::Explicit(h, w) => [*h, *w],
        PaddingConfig2d::Valid => [0, 0],
        PaddingConfig2d::Same => [(kernel[0] - 1) / 2, (kernel[1] - 1) / 2],
    }
}

/// Cost of a 2-D convolution on an input of shape `input`.
pub fn conv2d_cost<B: Backend>(conv: &Conv2d<B>, input: [usize; 4]) -> Cost {
    let [channels_out, channels_in_per_group, kernel_h, kernel_w] = conv.weight.dims();
    let padding = explicit_padding(&conv.padding.0, conv.kernel_size);
    let height = conv_output_len(
        input[2],
        kernel_h,
        conv.stride[0],
        padding[0],
        conv.dilation[0],
    );
    let width = conv_output_len(
        input[3],
        kernel_w,
        conv.stride[1],
        padding[1],
        conv.dilation[1],
    );
    let output = [input[0], channels_out, height, width];
    let per_output = (channels_in_per_group * kernel_h * kernel_w) as u64;

    Cost {
        output,
        macs: numel(output) * per_output,
    }
}

/// Cost of a 2-D transposed convolution on an input of shape `input`.
pub fn conv_transpose2d_cost<B: Backend>(conv: &ConvTranspose2d<B>, input: [usize; 4]) -> Cost {
    let [channels_in, channels_out_per_group, kernel_h, kernel_w] = conv.weight.dims();
    let channels_out = channels_out_per_group * conv.groups;
    let axis = |len: usize, axis: usize, kernel: usize| {
        (len - 1) * conv.stride[axis] + conv.dilation[axis] * (kernel - 1) + conv.padding_out[axis]
            + 1
            - 2 * conv.padding[axis]
    };
    let output = [
        input[0],
        channels_out,
        axis(input[2], 0, kernel_h),
        axis(input[3], 1, kernel_w),
    ];
    let per_output = (channels_in / conv.groups * kernel_h * kernel_w) as u64;

    Cost {
        output,
        macs: numel(output) * per_output,
    }
}

/// Cost of an affine normalization layer over a tensor of shape `shape`.
pub const fn norm_cost(shape: [usize; 4]) -> u64 {
    2 * numel(shape)
}

#[cfg(test)]
mod tests {
    use burn::nn::conv::{Conv2dConfig, ConvTranspose2dConfig};
    use rstest::rstest;

    use super::*;
    use crate::tests::TestBackend;

    #[rstest]
    #[case(32, 3, 1, 0, 1, 30)]
    #[case(32, 3, 1, 1, 1, 32)]
    #[case(32, 3, 2, 1, 1, 16)]
    #[case(33, 3, 2, 1, 1, 17)]
    #[case(32, 3, 1, 2, 2, 32)]
    #[case(2, 3, 1, 0, 1, 0)]
    fn conv_output_lengths(
        #[case] len: usize,
        #[case] kernel: usize,
        #[case] stride: usize,
        #[case] padding: usize,
        #[case] dilation: usize,
        #[case] expected: usize,
    ) {
        assert_eq!(
            conv_output_len(len, kernel, stride, padding, dilation),
            expected
        );
    }

    #[test]
    fn conv_cost_counts_kernel_taps_per_output() {
        let device = Default::default();
        let conv = Conv2dConfig::new([3, 8], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init::<TestBackend>(&device);

        let cost = conv2d_cost(&conv, [2, 3, 16, 16]);

        assert_eq!(cost.output, [2, 8, 16, 16]);
        assert_eq!(cost.macs, (2 * 8 * 16 * 16 * 3 * 9) as u64);
    }

    #[test]
    fn conv_cost_shape_matches_forward() {
        let device = Default::default();
        let conv = Conv2dConfig::new([4, 6], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(2, 2))
            .with_dilation([2, 2])
            .init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 4>::zeros([1, 4, 15, 11], &device);

        let cost = conv2d_cost(&conv, input.dims());

        assert_eq!(cost.output, conv.forward(input).dims());
    }

    #[test]
    fn grouped_conv_divides_input_channels() {
        let device = Default::default();
        let conv = Conv2dConfig::new([8, 8], [3, 3])
            .with_groups(8)
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init::<TestBackend>(&device);

        let cost = conv2d_cost(&conv, [1, 8, 4, 4]);

        assert_eq!(cost.macs, (8 * 4 * 4 * 9) as u64);
    }

    #[test]
    fn transposed_conv_doubles_resolution() {
        let device = Default::default();
        let conv = ConvTranspose2dConfig::new([8, 4], [2, 2])
            .with_stride([2, 2])
            .init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 4>::zeros([1, 8, 5, 7], &device);

        let cost = conv_transpose2d_cost(&conv, input.dims());

        assert_eq!(cost.output, [1, 4, 10, 14]);
        assert_eq!(cost.output, conv.forward(input).dims());
        assert_eq!(cost.macs, (4 * 10 * 14 * 8 * 4) as u64);
    }

    #[test]
    fn chained_costs_accumulate() {
        let first = Cost {
            output: [1, 2, 3, 4],
            macs: 10,
        };
        let second = Cost {
            output: [1, 5, 3, 4],
            macs: 7,
        };

        let total = first.then(second).plus(3);

        assert_eq!(total.output, [1, 5, 3, 4]);
        assert_eq!(total.macs, 20);
        assert_eq!(total.flops(), 40);
        assert_eq!(norm_cost([1, 2, 3, 4]), 48);
    }
}
