//! Pascal VOC 2012 sample discovery.
//!
//! Layout: `JPEGImages/<id>.jpg`, `SegmentationClass/<id>.png`, and the
//! validation ids in `ImageSets/Segmentation/val.txt`.

use std::{fs, path::Path};

use crate::{
    dataset::Sample,
    error::{DatasetError, DatasetResult},
};

/// Collect the segmentation validation split.
pub fn collect_samples(root: &Path) -> DatasetResult<Vec<Sample>> {
    let image_root = root.join("JPEGImages");
    let mask_root = root.join("SegmentationClass");

    if !image_root.is_dir() {
        return Err(DatasetError::ImageDirectoryNotFound { path: image_root });
    }
    if !mask_root.is_dir() {
        return Err(DatasetError::MaskDirectoryNotFound { path: mask_root });
    }

    let split_file = root.join("ImageSets").join("Segmentation").join("val.txt");
    let content =
        fs::read_to_string(&split_file).map_err(|source| DatasetError::SplitFileReadFailed {
            path: split_file.clone(),
            source,
        })?;

    let samples: Vec<Sample> = content
        .lines()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .filter_map(|id| {
            let image = image_root.join(format!("{id}.jpg"));
            let mask = mask_root.join(format!("{id}.png"));
            if image.is_file() && mask.is_file() {
                Some(Sample { image, mask })
            } else {
                tracing::warn!(sample = %id, "image or mask missing, skipping");
                None
            }
        })
        .collect();

    if samples.is_empty() {
        return Err(DatasetError::NoValidPairs { path: image_root });
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{fixture_dir, write_rgb};

    #[test]
    fn validation_ids_are_collected() {
        let root = fixture_dir("voc_val");
        write_rgb(&root.join("JPEGImages/2007_000033.jpg"), 4, 4);
        write_rgb(&root.join("SegmentationClass/2007_000033.png"), 4, 4);
        fs::create_dir_all(root.join("ImageSets/Segmentation")).unwrap();
        fs::write(
            root.join("ImageSets/Segmentation/val.txt"),
            "2007_000033\n2007_000042\n",
        )
        .unwrap();

        let samples = collect_samples(&root).unwrap();

        assert_eq!(samples.len(), 1);
        assert!(samples[0].mask.ends_with("2007_000033.png"));
    }

    #[test]
    fn missing_split_file_is_an_error() {
        let root = fixture_dir("voc_no_split");
        write_rgb(&root.join("JPEGImages/a.jpg"), 4, 4);
        write_rgb(&root.join("SegmentationClass/a.png"), 4, 4);

        assert!(matches!(
            collect_samples(&root),
            Err(DatasetError::SplitFileReadFailed { .. })
        ));
    }
}
