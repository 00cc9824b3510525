//! Generic `images/` + `masks/` datasets paired by file stem.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{
    dataset::Sample,
    error::{DatasetError, DatasetResult},
    transform::{has_supported_extension, supported_extensions},
};

/// Decodable image files directly inside `dir`, sorted by path.
pub fn image_files(dir: &Path) -> DatasetResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| DatasetError::DirectoryReadFailed {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && has_supported_extension(path) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Pair every image in `root/images` with a mask of the same stem in `root/masks`.
pub fn collect_samples(root: &Path) -> DatasetResult<Vec<Sample>> {
    let image_root = root.join("images");
    let mask_root = root.join("masks");

    if !image_root.is_dir() {
        return Err(DatasetError::ImageDirectoryNotFound { path: image_root });
    }
    if !mask_root.is_dir() {
        return Err(DatasetError::MaskDirectoryNotFound { path: mask_root });
    }

    let extensions = supported_extensions();
    let mut samples = Vec::new();
    for image in image_files(&image_root)? {
        let stem = image
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| DatasetError::InvalidUtf8Path {
                path: image.clone(),
            })?;

        let mask = extensions
            .iter()
            .map(|ext| mask_root.join(format!("{stem}.{ext}")))
            .find(|candidate| candidate.is_file());

        match mask {
            Some(mask) => samples.push(Sample { image, mask }),
            None => tracing::warn!(image = %image.display(), "no mask found for image"),
        }
    }

    if samples.is_empty() {
        return Err(DatasetError::NoValidPairs { path: image_root });
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::tests::{fixture_dir, write_gray, write_rgb};

    #[test]
    fn images_pair_with_masks_by_stem() {
        let root = fixture_dir("folder_pairs");
        write_rgb(&root.join("images/b.jpg"), 4, 4);
        write_rgb(&root.join("images/a.png"), 4, 4);
        write_rgb(&root.join("images/orphan.png"), 4, 4);
        write_gray(&root.join("masks/a.png"), 4, 4, 1);
        write_gray(&root.join("masks/b.png"), 4, 4, 0);
        fs::write(root.join("images/readme.txt"), "not an image").unwrap();

        let samples = collect_samples(&root).unwrap();

        assert_eq!(samples.len(), 2);
        assert!(samples[0].image.ends_with("a.png"));
        assert!(samples[1].mask.ends_with("b.png"));
    }

    #[test]
    fn no_pairs_is_an_error() {
        let root = fixture_dir("folder_empty");
        write_rgb(&root.join("images/a.png"), 4, 4);
        fs::create_dir_all(root.join("masks")).unwrap();

        assert!(matches!(
            collect_samples(&root),
            Err(DatasetError::NoValidPairs { .. })
        ));
    }

    #[test]
    fn missing_image_directory_is_an_error() {
        let root = fixture_dir("folder_missing");

        assert!(matches!(
            collect_samples(&root),
            Err(DatasetError::ImageDirectoryNotFound { .. })
        ));
    }
}
