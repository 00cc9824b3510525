//! Which classes are scored, and how much each one counts.

use burn::{prelude::*, tensor::ElementConversion};

/// The classes evaluated for a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassRange {
    /// Classes `0..n`.
    Fixed(usize),
    /// Classes from the smallest to the largest label present in the target.
    ObservedSpan,
}

/// Per-dataset scoring rules.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassPolicy {
    pub range: ClassRange,
    /// Skip class 0 even when it is in range.
    pub skip_background: bool,
    /// Weights for specific classes. Unlisted classes weigh 1.0.
    pub class_weights: Vec<(i64, f64)>,
}

impl ClassPolicy {
    /// Oxford-IIIT Pets trimaps: labels 1 (pet), 2 (background) and 3 (border),
    /// scored over the observed span with the pet class weighted 3.0.
    pub fn pets() -> Self {
        Self {
            range: ClassRange::ObservedSpan,
            skip_background: false,
            class_weights: vec![(1, 3.0)],
        }
    }

    /// Zero-indexed datasets with `num_classes` classes and background at 0.
    pub const fn indexed(num_classes: usize) -> Self {
        Self {
            range: ClassRange::Fixed(num_classes),
            skip_background: true,
            class_weights: Vec::new(),
        }
    }

    pub fn weight(&self, class: i64) -> f64 {
        self.class_weights
            .iter()
            .find(|(c, _)| *c == class)
            .map_or(1.0, |(_, weight)| *weight)
    }

    /// Classes to score for a batch with the given target labels.
    pub fn classes<B: Backend, const D: usize>(&self, target: &Tensor<B, D, Int>) -> Vec<i64> {
        match self.range {
            ClassRange::Fixed(n) => (0..n as i64).collect(),
            ClassRange::ObservedSpan => {
                if target.shape().num_elements() == 0 {
                    return Vec::new();
                }
                let min = target.clone().min().into_scalar().elem::<i64>();
                let max = target.clone().max().into_scalar().elem::<i64>();
                (min..=max).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn pets_span_follows_target() {
        let device = Default::default();
        let target =
            Tensor::<TestBackend, 1, Int>::from_ints([2, 3, 3, 2], &device).reshape([1, 2, 2]);

        assert_eq!(ClassPolicy::pets().classes(&target), vec![2, 3]);
    }

    #[test]
    fn indexed_range_ignores_target() {
        let device = Default::default();
        let target = Tensor::<TestBackend, 3, Int>::zeros([1, 2, 2], &device);

        assert_eq!(ClassPolicy::indexed(4).classes(&target), vec![0, 1, 2, 3]);
    }

    #[rstest]
    #[case(1, 3.0)]
    #[case(2, 1.0)]
    #[case(3, 1.0)]
    fn pets_weights(#[case] class: i64, #[case] weight: f64) {
        assert_eq!(ClassPolicy::pets().weight(class), weight);
    }
}
