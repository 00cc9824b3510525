//! Oxford-IIIT Pets sample discovery.
//!
//! Layout: `images/<name>.jpg` with trimaps in `annotations/trimaps/<name>.png`.
//! The test split is listed in `annotations/test.txt`.

use std::{fs, path::Path};

use crate::{
    dataset::Sample,
    error::{DatasetError, DatasetResult},
    folder::image_files,
};

/// Collect the test split, or every image with a trimap when no list exists.
pub fn collect_samples(root: &Path) -> DatasetResult<Vec<Sample>> {
    let image_root = root.join("images");
    let trimap_root = root.join("annotations").join("trimaps");

    if !image_root.is_dir() {
        return Err(DatasetError::ImageDirectoryNotFound { path: image_root });
    }
    if !trimap_root.is_dir() {
        return Err(DatasetError::MaskDirectoryNotFound { path: trimap_root });
    }

    let split_file = root.join("annotations").join("test.txt");
    let names = if split_file.is_file() {
        let content =
            fs::read_to_string(&split_file).map_err(|source| DatasetError::SplitFileReadFailed {
                path: split_file.clone(),
                source,
            })?;
        split_names(&content)
    } else {
        tracing::warn!(
            path = %split_file.display(),
            "split list missing, using every image with a trimap"
        );
        image_files(&image_root)?
            .iter()
            .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()))
            .map(str::to_string)
            .collect()
    };

    let mut samples = Vec::with_capacity(names.len());
    for name in names {
        let image = image_root.join(format!("{name}.jpg"));
        let mask = trimap_root.join(format!("{name}.png"));
        if image.is_file() && mask.is_file() {
            samples.push(Sample { image, mask });
        } else {
            tracing::warn!(sample = %name, "image or trimap missing, skipping");
        }
    }

    if samples.is_empty() {
        return Err(DatasetError::NoValidPairs { path: image_root });
    }
    Ok(samples)
}

/// First whitespace-separated token of every non-empty, non-comment line.
fn split_names(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}
