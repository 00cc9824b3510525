//! Error types for dataset discovery and loading.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for dataset operations.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Error when the dataset name is not recognized.
    #[error("Invalid dataset selection: {name} (available: pets, voc, folder)")]
    UnknownDataset {
        /// The requested dataset name.
        name: String,
    },

    /// Error when a folder dataset is requested without a usable class count.
    #[error("Folder datasets need at least two classes, got {num_classes}")]
    InvalidClassCount {
        /// The requested number of classes.
        num_classes: usize,
    },

    /// Error when reading a directory fails.
    #[error("Failed to read directory: {path}")]
    DirectoryReadFailed {
        /// The directory path that failed to read.
        path: PathBuf,
        /// The underlying walk error.
        #[source]
        source: walkdir::Error,
    },

    /// Error when a split list cannot be read.
    #[error("Failed to read split file: {path}")]
    SplitFileReadFailed {
        /// The split file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Error when the image directory is not found.
    #[error("Image directory not found: {path}")]
    ImageDirectoryNotFound {
        /// The expected image directory path.
        path: PathBuf,
    },

    /// Error when the mask directory is not found.
    #[error("Mask directory not found: {path}")]
    MaskDirectoryNotFound {
        /// The expected mask directory path.
        path: PathBuf,
    },

    /// Error when no valid image/mask pairs are found in the dataset.
    #[error("No valid image/mask pairs found in: {path}")]
    NoValidPairs {
        /// The directory where no pairs were found.
        path: PathBuf,
    },

    /// Error when opening or decoding an image file fails.
    #[error("Failed to open image: {path}")]
    ImageOpenFailed {
        /// The image file path that failed to open.
        path: PathBuf,
        /// The underlying image processing error.
        #[source]
        source: image::ImageError,
    },

    /// Error when path components contain invalid UTF-8.
    #[error("Path contains invalid UTF-8: {path}")]
    InvalidUtf8Path {
        /// The path with invalid UTF-8.
        path: PathBuf,
    },
}

/// A specialized `Result` type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;
