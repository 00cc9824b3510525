//! Symmetric Hausdorff distance between binary volumes.
//!
//! A batch of 2-D masks `[N, H, W]` is treated as one 3-D volume with unit
//! voxel spacing. Distances are measured between mask surfaces: the voxels
//! removed by one face-connected erosion, with everything outside the volume
//! counting as background.

use crate::{
    distance::squared_distance_to,
    error::{MetricError, MetricResult},
};

/// A binary mask over a `[depth, height, width]` grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryVolume {
    dims: [usize; 3],
    voxels: Vec<bool>,
}

impl BinaryVolume {
    /// Wraps row-major voxels. Returns `None` when the length does not match `dims`.
    pub fn new(dims: [usize; 3], voxels: Vec<bool>) -> Option<Self> {
        (voxels.len() == dims.iter().product::<usize>()).then_some(Self { dims, voxels })
    }

    /// Voxels whose label equals `class`.
    pub fn from_labels(labels: &[i64], dims: [usize; 3], class: i64) -> Option<Self> {
        Self::new(dims, labels.iter().map(|&label| label == class).collect())
    }

    pub const fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Number of foreground voxels.
    pub fn count(&self) -> usize {
        self.voxels.iter().filter(|&&v| v).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.voxels.iter().any(|&v| v)
    }

    /// Foreground voxels with at least one face neighbour in the background.
    pub fn surface(&self) -> Self {
        let [depth, height, width] = self.dims;
        let index = |d: usize, h: usize, w: usize| (d * height + h) * width + w;
        let inside = |d: usize, h: usize, w: usize| self.voxels[index(d, h, w)];

        let mut surface = vec![false; self.voxels.len()];
        for d in 0..depth {
            for h in 0..height {
                for w in 0..width {
                    if !inside(d, h, w) {
                        continue;
                    }
                    let eroded = d > 0
                        && d + 1 < depth
                        && h > 0
                        && h + 1 < height
                        && w > 0
                        && w + 1 < width
                        && inside(d - 1, h, w)
                        && inside(d + 1, h, w)
                        && inside(d, h - 1, w)
                        && inside(d, h + 1, w)
                        && inside(d, h, w - 1)
                        && inside(d, h, w + 1);
                    surface[index(d, h, w)] = !eroded;
                }
            }
        }

        Self {
            dims: self.dims,
            voxels: surface,
        }
    }
}

/// Largest distance from a surface voxel of `from` to the surface of `to`.
fn directed(from: &BinaryVolume, to: &BinaryVolume) -> f64 {
    let distances = squared_distance_to(&to.voxels, to.dims);
    from.voxels
        .iter()
        .zip(distances)
        .filter(|(voxel, _)| **voxel)
        .map(|(_, distance)| distance)
        .fold(0.0, f64::max)
        .sqrt()
}

/// Symmetric Hausdorff distance between the surfaces of two masks.
///
/// # Errors
///
/// Returns [`MetricError::EmptyMask`] when either mask has no foreground and
/// [`MetricError::ShapeMismatch`] when the grids differ.
pub fn hausdorff_distance(prediction: &BinaryVolume, target: &BinaryVolume) -> MetricResult<f64> {
    if prediction.dims != target.dims {
        return Err(MetricError::ShapeMismatch {
            prediction: prediction.dims.to_vec(),
            target: target.dims.to_vec(),
        });
    }
    if prediction.is_empty() {
        return Err(MetricError::EmptyMask { mask: "prediction" });
    }
    if target.is_empty() {
        return Err(MetricError::EmptyMask { mask: "target" });
    }

    let prediction = prediction.surface();
    let target = target.surface();
    Ok(directed(&prediction, &target).max(directed(&target, &prediction)))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn square(size: usize, top: usize, left: usize, side: usize) -> BinaryVolume {
        let mut voxels = vec![false; size * size];
        for h in top..top + side {
            for w in left..left + side {
                voxels[h * size + w] = true;
            }
        }
        BinaryVolume::new([1, size, size], voxels).unwrap()
    }

    #[test]
    fn identical_masks_are_zero_apart() {
        let mask = square(8, 2, 2, 3);

        assert_relative_eq!(hausdorff_distance(&mask, &mask).unwrap(), 0.0);
    }

    #[test]
    fn shifted_square_distance_is_the_shift() {
        let a = square(10, 1, 1, 3);
        let b = square(10, 1, 5, 3);

        assert_relative_eq!(hausdorff_distance(&a, &b).unwrap(), 4.0);
    }

    #[test]
    fn distance_is_symmetric_for_nested_masks() {
        let outer = square(9, 0, 0, 9);
        let inner = square(9, 4, 4, 1);

        let forward = hausdorff_distance(&outer, &inner).unwrap();
        let backward = hausdorff_distance(&inner, &outer).unwrap();

        assert_relative_eq!(forward, backward);
        assert_relative_eq!(forward, (32.0f64).sqrt());
    }

    #[test]
    fn single_slice_masks_are_all_surface() {
        let mask = square(5, 0, 0, 5);

        assert_eq!(mask.surface().count(), 25);
    }

    #[test]
    fn interior_of_thick_volume_is_eroded() {
        let voxels = vec![true; 27];
        let cube = BinaryVolume::new([3, 3, 3], voxels).unwrap();

        assert_eq!(cube.surface().count(), 26);
    }

    #[test]
    fn empty_operands_are_reported() {
        let empty = square(4, 0, 0, 0);
        let full = square(4, 0, 0, 4);

        assert_eq!(
            hausdorff_distance(&empty, &full),
            Err(MetricError::EmptyMask { mask: "prediction" })
        );
        assert_eq!(
            hausdorff_distance(&full, &empty),
            Err(MetricError::EmptyMask { mask: "target" })
        );
    }

    #[test]
    fn mismatched_grids_are_rejected() {
        let a = square(4, 0, 0, 2);
        let b = square(5, 0, 0, 2);

        assert!(matches!(
            hausdorff_distance(&a, &b),
            Err(MetricError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn labels_select_one_class() {
        let volume = BinaryVolume::from_labels(&[1, 2, 2, 0], [1, 2, 2], 2).unwrap();

        assert_eq!(volume.count(), 2);
        assert!(BinaryVolume::from_labels(&[1, 2, 3], [1, 2, 2], 2).is_none());
    }
}
