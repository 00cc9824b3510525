use std::path::PathBuf;

use thiserror::Error;

/// The error type for model construction and weight loading.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The model name is known but there is no implementation to build.
    #[error("Unsupported model: {name}")]
    UnsupportedModel {
        /// The CLI name of the model.
        name: String,
    },

    /// The model name does not match any known model.
    #[error("Unknown model '{name}', expected one of: {available}")]
    UnknownModel {
        /// The name that failed to parse.
        name: String,
        /// Comma separated list of accepted names.
        available: String,
    },

    /// Error for when an invalid model configuration is provided.
    /// This can happen if configuration parameters are logically inconsistent.
    #[error("Invalid model configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Error for when loading model weights fails.
    #[error("Failed to load weights from {}: {reason}", path.display())]
    WeightLoadingFailed {
        /// The weight file.
        path: PathBuf,
        /// The reason for the weight loading failure.
        reason: String,
    },
}

/// A specialized `Result` type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
