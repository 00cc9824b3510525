//! Metrics aggregator for batch processing.
//!
//! Accumulates per-batch metrics and averages them over the number of
//! batches seen.

use crate::segmentation::BatchMetrics;

/// Running sums of batch metrics.
///
/// A NaN value is left out of its sum, but the batch still counts towards
/// the divisor of every average.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsAggregator {
    dice_sum: f64,
    precision_sum: f64,
    recall_sum: f64,
    hausdorff_sum: f64,
    count: usize,
}

impl MetricsAggregator {
    /// Create a new metrics aggregator.
    pub const fn new() -> Self {
        Self {
            dice_sum: 0.0,
            precision_sum: 0.0,
            recall_sum: 0.0,
            hausdorff_sum: 0.0,
            count: 0,
        }
    }

    /// Add a batch of metrics.
    pub fn update(&mut self, metrics: &BatchMetrics) {
        let accumulate = |sum: &mut f64, value: f64| {
            if !value.is_nan() {
                *sum += value;
            }
        };
        accumulate(&mut self.dice_sum, metrics.dice);
        accumulate(&mut self.precision_sum, metrics.precision);
        accumulate(&mut self.recall_sum, metrics.recall);
        accumulate(&mut self.hausdorff_sum, metrics.hausdorff);
        self.count += 1;
    }

    /// Number of batches added since the last reset.
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Get the average metrics. All zeros before the first batch.
    pub fn averages(&self) -> BatchMetrics {
        if self.count == 0 {
            return BatchMetrics::default();
        }

        let count = self.count as f64;
        BatchMetrics {
            dice: self.dice_sum / count,
            precision: self.precision_sum / count,
            recall: self.recall_sum / count,
            hausdorff: self.hausdorff_sum / count,
        }
    }

    /// Reset the aggregator.
    pub const fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn batch(dice: f64, hausdorff: f64) -> BatchMetrics {
        BatchMetrics {
            dice,
            precision: 0.5,
            recall: 1.0,
            hausdorff,
        }
    }

    #[test]
    fn averages_over_batches() {
        let mut aggregator = MetricsAggregator::new();
        aggregator.update(&batch(0.2, 4.0));
        aggregator.update(&batch(0.6, 2.0));

        let averages = aggregator.averages();

        assert_eq!(aggregator.count(), 2);
        assert_relative_eq!(averages.dice, 0.4);
        assert_relative_eq!(averages.precision, 0.5);
        assert_relative_eq!(averages.hausdorff, 3.0);
    }

    #[test]
    fn nan_values_still_count_the_batch() {
        let mut aggregator = MetricsAggregator::new();
        aggregator.update(&batch(0.8, f64::NAN));
        aggregator.update(&batch(0.4, 6.0));

        let averages = aggregator.averages();

        assert_relative_eq!(averages.dice, 0.6);
        assert_relative_eq!(averages.hausdorff, 3.0);
    }

    #[test]
    fn empty_and_reset_give_zeros() {
        let mut aggregator = MetricsAggregator::default();
        assert_eq!(aggregator.averages(), BatchMetrics::default());

        aggregator.update(&batch(1.0, 1.0));
        aggregator.reset();

        assert_eq!(aggregator.count(), 0);
        assert_eq!(aggregator.averages(), BatchMetrics::default());
    }
}
