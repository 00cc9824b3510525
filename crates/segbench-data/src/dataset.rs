//! Segmentation dataset and batcher.
//!
//! Following Burn's convention, the dataset returns raw preprocessed data and
//! the batcher creates tensors on the target device.

use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use burn::{
    config::Config,
    data::{
        dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    prelude::*,
};

use crate::{
    error::{DatasetError, DatasetResult},
    folder,
    kind::DatasetKind,
    pets,
    transform::{image_to_array, index_mask_to_labels, load_image, normalize, voc_mask_to_labels},
    voc,
};

/// Configuration for a benchmark dataset.
#[derive(Config, Debug)]
pub struct DatasetConfig {
    /// Which dataset layout to read.
    pub kind: DatasetKind,
    /// Dataset root directory.
    pub root: String,
    /// Model input size as `[height, width]`.
    #[config(default = "[512, 512]")]
    pub input_size: [usize; 2],
    /// Optional cap on the number of samples.
    pub limit: Option<usize>,
}

/// Paths of one image and its mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub image: PathBuf,
    pub mask: PathBuf,
}

/// A single preprocessed sample.
#[derive(Debug, Clone)]
pub struct SegmentationItem {
    /// RGB floats in `[0, 1]`, HWC order.
    pub image: Vec<f32>,
    /// Class index per pixel, row-major.
    pub mask: Vec<i64>,
    pub height: usize,
    pub width: usize,
}

/// A batch of normalized images and their label masks.
#[derive(Debug, Clone)]
pub struct SegmentationBatch<B: Backend> {
    /// `[batch_size, 3, height, width]`
    pub images: Tensor<B, 4>,
    /// `[batch_size, height, width]`
    pub masks: Tensor<B, 3, Int>,
}

/// Batcher converting [`SegmentationItem`]s into a [`SegmentationBatch`].
#[derive(Clone, Default)]
pub struct SegmentationBatcher<B: Backend> {
    _phantom: PhantomData<B>,
}

impl<B: Backend> SegmentationBatcher<B> {
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B: Backend> Batcher<B, SegmentationItem, SegmentationBatch<B>> for SegmentationBatcher<B> {
    fn batch(&self, items: Vec<SegmentationItem>, device: &B::Device) -> SegmentationBatch<B> {
        let mut images = Vec::with_capacity(items.len());
        let mut masks = Vec::with_capacity(items.len());

        for item in items {
            let image = Tensor::<B, 3>::from_data(
                TensorData::new(item.image, [item.height, item.width, 3])
                    .convert::<B::FloatElem>(),
                device,
            )
            .permute([2, 0, 1]);
            let mask = Tensor::<B, 2, Int>::from_data(
                TensorData::new(item.mask, [item.height, item.width]).convert::<B::IntElem>(),
                device,
            );

            images.push(image);
            masks.push(mask);
        }

        SegmentationBatch {
            images: normalize(Tensor::stack(images, 0)),
            masks: Tensor::stack(masks, 0),
        }
    }
}

/// First sample load error of a dataset, shared with every loader worker.
///
/// Once an error is recorded the dataset yields no further items, so all
/// workers stop instead of only the one that hit the broken file.
#[derive(Debug, Clone, Default)]
pub struct LoadFailures(Arc<Mutex<Option<DatasetError>>>);

impl LoadFailures {
    fn record(&self, err: DatasetError) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    pub fn is_failed(&self) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Removes and returns the recorded error, re-enabling the dataset.
    pub fn take(&self) -> Option<DatasetError> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Image/mask pairs of one dataset, preprocessed on access.
#[derive(Debug)]
pub struct SegmentationDataset {
    kind: DatasetKind,
    samples: Vec<Sample>,
    input_size: [usize; 2],
    failures: LoadFailures,
}

impl SegmentationDataset {
    /// Discover the samples described by `config`.
    pub fn new(config: &DatasetConfig) -> DatasetResult<Self> {
        let root = Path::new(&config.root);
        let mut samples = match config.kind {
            DatasetKind::Pets => pets::collect_samples(root)?,
            DatasetKind::Voc => voc::collect_samples(root)?,
            DatasetKind::Folder { .. } => folder::collect_samples(root)?,
        };

        if let Some(limit) = config.limit {
            samples.truncate(limit);
        }

        tracing::info!(
            dataset = %config.kind,
            root = %root.display(),
            samples = samples.len(),
            "dataset loaded"
        );

        Ok(Self {
            kind: config.kind,
            samples,
            input_size: config.input_size,
            failures: LoadFailures::default(),
        })
    }

    pub const fn kind(&self) -> DatasetKind {
        self.kind
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Handle to the load errors hit while iterating this dataset.
    pub fn failures(&self) -> LoadFailures {
        self.failures.clone()
    }

    fn load(&self, sample: &Sample) -> DatasetResult<SegmentationItem> {
        let image = load_image(&sample.image)?;
        let mask = load_image(&sample.mask)?;
        let [height, width] = self.input_size;

        let labels = match self.kind {
            DatasetKind::Voc => voc_mask_to_labels(&mask, self.input_size),
            DatasetKind::Pets | DatasetKind::Folder { .. } => {
                index_mask_to_labels(&mask, self.input_size)
            }
        };

        Ok(SegmentationItem {
            image: image_to_array(&image, self.input_size),
            mask: labels,
            height,
            width,
        })
    }
}

impl Dataset<SegmentationItem> for SegmentationDataset {
    fn get(&self, index: usize) -> Option<SegmentationItem> {
        if self.failures.is_failed() {
            return None;
        }
        let sample = self.samples.get(index)?;
        match self.load(sample) {
            Ok(item) => Some(item),
            Err(err) => {
                tracing::error!(index, error = %err, "failed to load sample");
                self.failures.record(err);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Data loader over `dataset`. Zero workers loads on the caller's thread.
///
/// A sample that fails to load ends the iteration of every worker; check
/// [`SegmentationDataset::failures`] afterwards.
pub fn build_dataloader<B: Backend>(
    dataset: SegmentationDataset,
    batch_size: usize,
    num_workers: usize,
    device: &B::Device,
) -> Arc<dyn DataLoader<B, SegmentationBatch<B>>> {
    let builder = DataLoaderBuilder::new(SegmentationBatcher::<B>::new())
        .batch_size(batch_size)
        .set_device(device.clone());
    let builder = if num_workers > 0 {
        builder.num_workers(num_workers)
    } else {
        builder
    };

    builder.build(dataset)
}
