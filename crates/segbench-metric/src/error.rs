use thiserror::Error;

/// The error type for metric computation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MetricError {
    /// A distance metric was asked for a mask without foreground voxels.
    #[error("The {mask} mask contains no foreground voxels")]
    EmptyMask {
        /// Which operand was empty.
        mask: &'static str,
    },

    /// Prediction and target label maps differ in shape.
    #[error("Shape mismatch: prediction {prediction:?}, target {target:?}")]
    ShapeMismatch {
        prediction: Vec<usize>,
        target: Vec<usize>,
    },
}

/// A specialized `Result` type for metric computation.
pub type MetricResult<T> = Result<T, MetricError>;
