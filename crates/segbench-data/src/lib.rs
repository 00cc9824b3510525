//! # segbench-data
//!
//! Segmentation datasets for benchmarking, built on Burn's data API.
//!
//! ## Datasets
//!
//! - **Oxford-IIIT Pets** (`pets`): test split trimaps, classes 1..=3.
//! - **Pascal VOC 2012** (`voc`): validation split, 21 classes, 255 marks void.
//! - **Folder** (`folder`): `images/` and `masks/` paired by file stem, with
//!   single-channel index masks.
//!
//! Each [`DatasetKind`] also says how the benchmark scores it, through
//! [`DatasetKind::policy`] and [`DatasetKind::label_offset`].

mod dataset;
mod error;
mod folder;
mod kind;
mod pets;
mod transform;
mod voc;

pub use dataset::{
    build_dataloader, DatasetConfig, LoadFailures, Sample, SegmentationBatch, SegmentationBatcher,
    SegmentationDataset, SegmentationItem,
};
pub use error::{DatasetError, DatasetResult};
pub use kind::{DatasetKind, PETS_CLASSES, VOC_CLASSES, VOID_LABEL};
pub use transform::{voc_colormap, IMAGENET_MEAN, IMAGENET_STD};

#[cfg(test)]
mod tests {
    use std::{
        fs,
        path::{Path, PathBuf},
    };

    use burn::backend::NdArray;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    pub type TestBackend = NdArray<f32>;

    /// Fresh per-test directory under the system temp dir.
    pub fn fixture_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "segbench-data-{name}-{}",
            std::process::id()
        ));
        if dir.exists() {
            fs::remove_dir_all(&dir).unwrap();
        }
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub fn write_rgb(path: &Path, width: u32, height: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(width, height, Rgb([120, 60, 30]))
            .save(path)
            .unwrap();
    }

    pub fn write_gray(path: &Path, width: u32, height: u32, value: u8) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        GrayImage::from_pixel(width, height, Luma([value]))
            .save(path)
            .unwrap();
    }
}
