//! Spatial center cropping for NCHW feature maps.
//!
//! Skip connections in an unpadded U-Net are larger than the upsampled decoder
//! features they are concatenated with, so they are cropped symmetrically
//! around the center before concatenation.

use burn::prelude::*;

/// Offset of a centered window of length `target` inside an axis of length `source`.
///
/// Uses floor division, so an odd surplus leaves the extra row/column at the
/// far end of the axis. Returns 0 when the window is not smaller than the axis.
pub const fn crop_offsets(source: usize, target: usize) -> usize {
    source.saturating_sub(target) / 2
}

/// Zero padding `(before, after)` needed to grow an axis of length `source` to `target`.
const fn pad_amounts(source: usize, target: usize) -> (usize, usize) {
    let missing = target.saturating_sub(source);
    let before = missing / 2;
    (before, missing - before)
}

/// Center-crops the spatial dimensions of `input` to `size = [height, width]`.
///
/// Axes shorter than the requested size are zero-padded symmetrically first,
/// so the output always has exactly the requested spatial shape.
///
/// # Shapes
///   - input: `[batch_size, channels, height, width]`
///   - output: `[batch_size, channels, size[0], size[1]]`
pub fn center_crop<B: Backend>(input: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [_, _, height, width] = input.dims();
    let [target_h, target_w] = size;

    if height == target_h && width == target_w {
        return input;
    }

    let (pad_top, pad_bottom) = pad_amounts(height, target_h);
    let (pad_left, pad_right) = pad_amounts(width, target_w);
    let input = if pad_top + pad_bottom + pad_left + pad_right > 0 {
        input.pad((pad_left, pad_right, pad_top, pad_bottom), 0.0)
    } else {
        input
    };

    let [batch_size, channels, height, width] = input.dims();
    let top = crop_offsets(height, target_h);
    let left = crop_offsets(width, target_w);

    input.slice([
        0..batch_size,
        0..channels,
        top..top + target_h,
        left..left + target_w,
    ])
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::tests::TestBackend;

    fn arange(h: usize, w: usize) -> Tensor<TestBackend, 4> {
        let device = Default::default();
        let values: Vec<f32> = (0..h * w).map(|v| v as f32).collect();
        Tensor::<TestBackend, 1>::from_floats(values.as_slice(), &device).reshape([1, 1, h, w])
    }

    #[rstest]
    #[case(10, 6, 2)]
    #[case(9, 6, 1)]
    #[case(6, 6, 0)]
    #[case(4, 6, 0)]
    fn offsets_use_floor_of_half_surplus(
        #[case] source: usize,
        #[case] target: usize,
        #[case] expected: usize,
    ) {
        assert_eq!(crop_offsets(source, target), expected);
    }

    #[test]
    fn crop_keeps_the_central_window() {
        let cropped = center_crop(arange(5, 5), [3, 3]);

        assert_eq!(cropped.dims(), [1, 1, 3, 3]);
        let values = cropped.into_data().to_vec::<f32>().unwrap();
        assert_eq!(
            values,
            vec![6.0, 7.0, 8.0, 11.0, 12.0, 13.0, 16.0, 17.0, 18.0]
        );
    }

    #[test]
    fn odd_surplus_drops_trailing_row() {
        let cropped = center_crop(arange(4, 4), [3, 3]);

        let values = cropped.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 4.0, 5.0, 6.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn matching_size_is_a_no_op() {
        let input = arange(4, 6);
        let cropped = center_crop(input.clone(), [4, 6]);

        assert_eq!(
            cropped.into_data().to_vec::<f32>().unwrap(),
            input.into_data().to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn smaller_source_is_zero_padded() {
        let padded = center_crop(arange(2, 2), [4, 4]);

        assert_eq!(padded.dims(), [1, 1, 4, 4]);
        let values = padded.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values[5], 0.0);
        assert_eq!(values[6], 1.0);
        assert_eq!(values[9], 2.0);
        assert_eq!(values[10], 3.0);
        assert_eq!(values.iter().filter(|v| **v == 0.0).count(), 13);
    }

    #[test]
    fn crop_and_pad_mixed_axes() {
        let out = center_crop(arange(6, 2), [4, 4]);

        assert_eq!(out.dims(), [1, 1, 4, 4]);
    }
}
