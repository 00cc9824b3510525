//! # segbench-metric
//!
//! Evaluation metrics for semantic segmentation benchmarks, built on the Burn
//! framework.
//!
//! ## Implemented Metrics
//!
//! - Dice coefficient, precision and recall per class, computed from
//!   label counts on the device.
//! - Symmetric Hausdorff distance between class surfaces, computed on the host
//!   with an exact Euclidean distance transform.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use segbench_metric::{calculate_metrics, ClassPolicy, MetricsAggregator, DEFAULT_SMOOTH};
//!
//! let mut aggregator = MetricsAggregator::new();
//! // predictions and targets: Tensor<B, 3, Int> of shape [batch, height, width]
//! let metrics = calculate_metrics(predictions, targets, &ClassPolicy::indexed(21), DEFAULT_SMOOTH)?;
//! aggregator.update(&metrics);
//! println!("Dice: {}", aggregator.averages().dice);
//! ```
//!
//! ## Dataset Quirks
//!
//! [`ClassPolicy`] captures how each dataset is scored: zero-indexed
//! datasets skip background, while the 1-indexed Pets trimaps score every
//! observed class and weight the pet class three times.

mod aggregator;
mod distance;
mod error;
mod hausdorff;
mod policy;
mod segmentation;

pub use aggregator::MetricsAggregator;
pub use distance::squared_distance_to;
pub use error::{MetricError, MetricResult};
pub use hausdorff::{hausdorff_distance, BinaryVolume};
pub use policy::{ClassPolicy, ClassRange};
pub use segmentation::{
    calculate_metrics, BatchMetrics, DEFAULT_SMOOTH, EMPTY_PREDICTION_PENALTY,
};
