//! Image and mask preprocessing.
//!
//! Images are resized with a triangle filter and kept as `[0, 1]` RGB floats in
//! HWC order; ImageNet normalization happens on the device in the batcher.
//! Masks are resized with nearest neighbour so class indices survive intact.

use std::{
    collections::HashMap,
    path::Path,
    sync::OnceLock,
};

use burn::prelude::*;
use image::{imageops::FilterType, DynamicImage, ImageError, ImageFormat, ImageReader};

use crate::{
    error::{DatasetError, DatasetResult},
    kind::{VOC_CLASSES, VOID_LABEL},
};

/// ImageNet per-channel mean.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet per-channel standard deviation.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Lowercase extensions of every format the image crate can decode.
pub fn supported_extensions() -> Vec<&'static str> {
    let mut extensions: Vec<&'static str> = ImageFormat::all()
        .filter(|format| format.reading_enabled())
        .flat_map(|format| format.extensions_str().iter().copied())
        .collect();
    extensions.sort_unstable();
    extensions.dedup();
    extensions
}

/// Whether `path` carries a decodable image extension.
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            supported_extensions().contains(&ext.as_str())
        })
}

/// Decode an image file.
pub fn load_image(path: &Path) -> DatasetResult<DynamicImage> {
    let open_failed = |source| DatasetError::ImageOpenFailed {
        path: path.to_path_buf(),
        source,
    };

    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|err| open_failed(ImageError::IoError(err)))?
        .decode()
        .map_err(open_failed)
}

/// Resize to `size = [height, width]` and flatten to RGB floats in HWC order.
pub fn image_to_array(image: &DynamicImage, size: [usize; 2]) -> Vec<f32> {
    let [height, width] = size;
    image
        .resize_exact(width as u32, height as u32, FilterType::Triangle)
        .to_rgb32f()
        .into_raw()
}

/// Resize a single-channel index mask and return its labels row-major.
pub fn index_mask_to_labels(mask: &DynamicImage, size: [usize; 2]) -> Vec<i64> {
    let [height, width] = size;
    let luma = mask.to_luma8();
    image::imageops::resize(&luma, width as u32, height as u32, FilterType::Nearest)
        .into_raw()
        .into_iter()
        .map(i64::from)
        .collect()
}

/// Resize a decoded VOC palette mask and map each colour back to its class.
///
/// The void colour and any colour outside the palette become [`VOID_LABEL`].
pub fn voc_mask_to_labels(mask: &DynamicImage, size: [usize; 2]) -> Vec<i64> {
    let [height, width] = size;
    let rgb = mask.to_rgb8();
    let lookup = voc_lookup();
    image::imageops::resize(&rgb, width as u32, height as u32, FilterType::Nearest)
        .pixels()
        .map(|pixel| lookup.get(&pixel.0).copied().unwrap_or(VOID_LABEL))
        .collect()
}

/// The Pascal VOC palette: colour of every label value `0..=255`.
pub fn voc_colormap() -> [[u8; 3]; 256] {
    let mut colormap = [[0u8; 3]; 256];
    for (label, colour) in colormap.iter_mut().enumerate() {
        let mut code = label;
        for shift in (0..8).rev() {
            for (channel, value) in colour.iter_mut().enumerate() {
                *value |= (((code >> channel) & 1) as u8) << shift;
            }
            code >>= 3;
        }
    }
    colormap
}

fn voc_lookup() -> &'static HashMap<[u8; 3], i64> {
    static LOOKUP: OnceLock<HashMap<[u8; 3], i64>> = OnceLock::new();
    LOOKUP.get_or_init(|| {
        let colormap = voc_colormap();
        (0..VOC_CLASSES)
            .map(|label| (colormap[label], label as i64))
            .chain(std::iter::once((colormap[VOID_LABEL as usize], VOID_LABEL)))
            .collect()
    })
}

/// Apply ImageNet normalization to a `[batch, 3, height, width]` tensor.
pub fn normalize<B: Backend>(images: Tensor<B, 4>) -> Tensor<B, 4> {
    let device = images.device();
    let mean = Tensor::<B, 1>::from_floats(IMAGENET_MEAN, &device).reshape([1, 3, 1, 1]);
    let std = Tensor::<B, 1>::from_floats(IMAGENET_STD, &device).reshape([1, 3, 1, 1]);
    (images - mean) / std
}
