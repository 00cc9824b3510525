//! Per-class overlap and boundary metrics for one batch of label maps.

use burn::{prelude::*, tensor::ElementConversion};

use crate::{
    error::{MetricError, MetricResult},
    hausdorff::{hausdorff_distance, BinaryVolume},
    policy::ClassPolicy,
};

/// Smoothing term added to every ratio.
pub const DEFAULT_SMOOTH: f64 = 1e-6;

/// Hausdorff distance recorded for a class present in the target but never predicted.
pub const EMPTY_PREDICTION_PENALTY: f64 = 100.0;

/// Mean metrics of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatchMetrics {
    pub dice: f64,
    pub precision: f64,
    pub recall: f64,
    pub hausdorff: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn count<B: Backend>(mask: Tensor<B, 3, Int>) -> u64 {
    mask.sum().into_scalar().elem::<i64>().max(0) as u64
}

/// Scores predicted labels against target labels, class by class.
///
/// Classes come from `policy`. A class is skipped when it is background
/// and the policy says so, or when it does not occur in the target. Dice,
/// precision and recall are scaled by the class weight. The Hausdorff distance
/// is measured over the whole `[N, H, W]` batch as one volume and is replaced
/// by [`EMPTY_PREDICTION_PENALTY`] when nothing of the class was predicted.
///
/// # Shapes
///   - prediction: `[batch_size, height, width]`
///   - target: `[batch_size, height, width]`
///
/// # Errors
///
/// Returns [`MetricError::ShapeMismatch`] when the label maps differ in shape.
pub fn calculate_metrics<B: Backend>(
    prediction: Tensor<B, 3, Int>,
    target: Tensor<B, 3, Int>,
    policy: &ClassPolicy,
    smooth: f64,
) -> MetricResult<BatchMetrics> {
    let dims = prediction.dims();
    if dims != target.dims() {
        return Err(MetricError::ShapeMismatch {
            prediction: dims.to_vec(),
            target: target.dims().to_vec(),
        });
    }

    let mut dice = Vec::new();
    let mut precision = Vec::new();
    let mut recall = Vec::new();
    let mut hausdorff = Vec::new();
    let mut host_labels: Option<(Vec<i64>, Vec<i64>)> = None;

    for class in policy.classes(&target) {
        if class == 0 && policy.skip_background {
            continue;
        }

        let predicted = prediction.clone().equal_elem(class).int();
        let expected = target.clone().equal_elem(class).int();
        let target_count = count(expected.clone());
        if target_count == 0 {
            continue;
        }
        let predicted_count = count(predicted.clone());
        let true_positive = count(predicted * expected);
        let false_positive = predicted_count - true_positive;
        let false_negative = target_count - true_positive;

        let weight = policy.weight(class);
        let tp = true_positive as f64;
        dice.push(weight * (2.0 * tp + smooth) / ((predicted_count + target_count) as f64 + smooth));
        precision.push(weight * (tp + smooth) / ((true_positive + false_positive) as f64 + smooth));
        recall.push(weight * (tp + smooth) / ((true_positive + false_negative) as f64 + smooth));

        if predicted_count == 0 {
            hausdorff.push(EMPTY_PREDICTION_PENALTY);
            continue;
        }

        let (predicted_labels, target_labels) = host_labels.get_or_insert_with(|| {
            (
                prediction.clone().into_data().iter::<i64>().collect(),
                target.clone().into_data().iter::<i64>().collect(),
            )
        });
        let volumes = BinaryVolume::from_labels(predicted_labels, dims, class)
            .zip(BinaryVolume::from_labels(target_labels, dims, class));
        match volumes.map(|(p, t)| hausdorff_distance(&p, &t)) {
            Some(Ok(distance)) => hausdorff.push(distance),
            Some(Err(error)) => {
                tracing::warn!(class, %error, "Hausdorff calculation failed");
            }
            None => tracing::warn!(class, "label buffer does not match the batch shape"),
        }
    }

    let metrics = BatchMetrics {
        dice: mean(&dice),
        precision: mean(&precision),
        recall: mean(&recall),
        hausdorff: mean(&hausdorff),
    };
    tracing::trace!(?metrics, classes = dice.len(), "scored batch");
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{policy::ClassRange, tests::TestBackend};

    fn labels(values: &[i64], dims: [usize; 3]) -> Tensor<TestBackend, 3, Int> {
        let device = Default::default();
        Tensor::<TestBackend, 1, Int>::from_ints(values, &device).reshape(dims)
    }

    #[test]
    fn perfect_prediction_scores_one() {
        let target = labels(&[0, 1, 1, 2, 2, 0, 1, 2, 0], [1, 3, 3]);

        let metrics =
            calculate_metrics(target.clone(), target, &ClassPolicy::indexed(3), DEFAULT_SMOOTH)
                .unwrap();

        assert_relative_eq!(metrics.dice, 1.0);
        assert_relative_eq!(metrics.precision, 1.0);
        assert_relative_eq!(metrics.recall, 1.0);
        assert_relative_eq!(metrics.hausdorff, 0.0);
    }

    #[test]
    fn partial_overlap_counts() {
        // class 1: predicted 3 pixels, target 2 pixels, 1 shared
        let prediction = labels(&[1, 1, 1, 0], [1, 2, 2]);
        let target = labels(&[1, 0, 0, 1], [1, 2, 2]);

        let metrics =
            calculate_metrics(prediction, target, &ClassPolicy::indexed(2), 0.0).unwrap();

        assert_relative_eq!(metrics.dice, 2.0 / 5.0);
        assert_relative_eq!(metrics.precision, 1.0 / 3.0);
        assert_relative_eq!(metrics.recall, 1.0 / 2.0);
        assert_relative_eq!(metrics.hausdorff, 1.0);
    }

    #[test]
    fn missing_prediction_is_penalised() {
        let prediction = labels(&[0, 0, 0, 0], [1, 2, 2]);
        let target = labels(&[0, 1, 0, 0], [1, 2, 2]);

        let metrics = calculate_metrics(prediction, target, &ClassPolicy::indexed(2), DEFAULT_SMOOTH)
            .unwrap();

        assert_relative_eq!(metrics.hausdorff, EMPTY_PREDICTION_PENALTY);
        assert!(metrics.dice < 1e-3);
    }

    #[test]
    fn classes_absent_from_target_are_skipped() {
        let prediction = labels(&[2, 2, 1, 1], [1, 2, 2]);
        let target = labels(&[1, 1, 1, 1], [1, 2, 2]);

        let metrics =
            calculate_metrics(prediction, target, &ClassPolicy::indexed(3), 0.0).unwrap();

        // only class 1 is scored
        assert_relative_eq!(metrics.precision, 1.0);
        assert_relative_eq!(metrics.recall, 0.5);
    }

    #[test]
    fn pets_weights_the_pet_class() {
        let target = labels(&[1, 1, 2, 3], [1, 2, 2]);

        let metrics =
            calculate_metrics(target.clone(), target, &ClassPolicy::pets(), DEFAULT_SMOOTH)
                .unwrap();

        // classes 1, 2, 3 with weights 3, 1, 1
        assert_relative_eq!(metrics.dice, 5.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn background_scored_when_policy_keeps_it() {
        let prediction = labels(&[0, 0, 1, 1], [1, 2, 2]);
        let target = labels(&[0, 1, 1, 1], [1, 2, 2]);
        let policy = ClassPolicy {
            range: ClassRange::Fixed(2),
            skip_background: false,
            class_weights: Vec::new(),
        };

        let metrics = calculate_metrics(prediction, target, &policy, 0.0).unwrap();

        // background: dice 2/3, class 1: dice 4/5
        assert_relative_eq!(metrics.dice, (2.0 / 3.0 + 4.0 / 5.0) / 2.0);
    }

    #[test]
    fn nothing_scored_gives_zeros() {
        let zeros = labels(&[0, 0, 0, 0], [1, 2, 2]);

        let metrics =
            calculate_metrics(zeros.clone(), zeros, &ClassPolicy::indexed(3), DEFAULT_SMOOTH)
                .unwrap();

        assert_eq!(metrics, BatchMetrics::default());
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let result = calculate_metrics(
            labels(&[0, 0, 0, 0], [1, 2, 2]),
            labels(&[0, 0, 0, 0], [1, 4, 1]),
            &ClassPolicy::indexed(2),
            DEFAULT_SMOOTH,
        );

        assert!(matches!(result, Err(MetricError::ShapeMismatch { .. })));
    }
}
