//! Name-based construction of every benchmarked model.

use std::path::Path;

use burn::prelude::*;

use super::{
    deeplab::{DeepLabV3Plus, DeepLabV3PlusConfig},
    encoder::MobileNetV2Config,
    fpn::{Fpn, FpnConfig},
    segformer::{SegFormer, SegFormerConfig},
    unet::{UNet, UNetConfig},
};
use crate::{
    config::{ModelKind, Normalization},
    error::{ModelError, ModelResult},
    profile::Cost,
    weights::load_weights,
};

/// Configuration selecting and sizing one of the benchmarked models.
#[derive(Config, Debug)]
pub struct SegmentationModelConfig {
    pub kind: ModelKind,
    /// Number of predicted classes, including background.
    #[config(default = "3")]
    pub num_classes: usize,
    #[config(default = "3")]
    pub in_channels: usize,
    /// U-Net layout. Its input channels and class count are overridden.
    #[config(default = "UNetConfig::new().with_padding(1).with_normalization(Normalization::Batch)")]
    pub unet: UNetConfig,
    /// Width multiplier of the MobileNetV2 encoder.
    #[config(default = "1.0")]
    pub encoder_width: f64,
}

impl SegmentationModelConfig {
    fn encoder(&self) -> MobileNetV2Config {
        MobileNetV2Config::new()
            .with_in_channels(self.in_channels)
            .with_width_multiplier(self.encoder_width)
    }

    /// Builds the selected model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnsupportedModel`] for models without an
    /// implementation and propagates invalid layouts.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ModelResult<SegmentationModel<B>> {
        if self.num_classes == 0 {
            return Err(ModelError::InvalidConfiguration {
                reason: "a segmentation model needs at least one class".to_string(),
            });
        }

        let model = match self.kind {
            ModelKind::UNet => {
                let mut encoder_channels = self.unet.encoder_channels.clone();
                if let Some(first) = encoder_channels.first_mut() {
                    *first = self.in_channels;
                }
                let unet = self
                    .unet
                    .clone()
                    .with_encoder_channels(encoder_channels)
                    .with_segmentation_classes(self.num_classes)
                    .init(device)?;
                SegmentationModel::UNet(unet)
            }
            ModelKind::DeepLabV3Plus => SegmentationModel::DeepLabV3Plus(
                DeepLabV3PlusConfig::new(self.num_classes)
                    .with_encoder(self.encoder())
                    .init(device)?,
            ),
            ModelKind::Fpn => SegmentationModel::Fpn(
                FpnConfig::new(self.num_classes)
                    .with_encoder(self.encoder())
                    .init(device)?,
            ),
            ModelKind::SegFormer => SegmentationModel::SegFormer(
                SegFormerConfig::new(self.num_classes)
                    .with_encoder(self.encoder())
                    .init(device)?,
            ),
            ModelKind::Sam | ModelKind::MedSam | ModelKind::SwinUnet => {
                return Err(ModelError::UnsupportedModel {
                    name: self.kind.to_string(),
                })
            }
        };
        Ok(model)
    }
}

/// Any of the constructible segmentation models.
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output: `[batch_size, num_classes, height, width]` logits
#[derive(Module, Debug)]
pub enum SegmentationModel<B: Backend> {
    UNet(UNet<B>),
    DeepLabV3Plus(DeepLabV3Plus<B>),
    Fpn(Fpn<B>),
    SegFormer(SegFormer<B>),
}

impl<B: Backend> SegmentationModel<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::UNet(model) => model.forward(images),
            Self::DeepLabV3Plus(model) => model.forward(images),
            Self::Fpn(model) => model.forward(images),
            Self::SegFormer(model) => model.forward(images),
        }
    }

    /// Analytic compute cost of one forward pass on an input of shape `input`.
    pub fn profile(&self, input: [usize; 4]) -> Cost {
        match self {
            Self::UNet(model) => model.cost(input),
            Self::DeepLabV3Plus(model) => model.cost(input),
            Self::Fpn(model) => model.cost(input),
            Self::SegFormer(model) => model.cost(input),
        }
    }

    pub const fn kind(&self) -> ModelKind {
        match self {
            Self::UNet(_) => ModelKind::UNet,
            Self::DeepLabV3Plus(_) => ModelKind::DeepLabV3Plus,
            Self::Fpn(_) => ModelKind::Fpn,
            Self::SegFormer(_) => ModelKind::SegFormer,
        }
    }

    /// Loads weights saved for the concrete model into this instance.
    ///
    /// # Errors
    ///
    /// See [`load_weights`].
    pub fn load_weights(self, path: &Path, device: &B::Device) -> ModelResult<Self> {
        let model = match self {
            Self::UNet(model) => Self::UNet(load_weights(model, path, device)?),
            Self::DeepLabV3Plus(model) => Self::DeepLabV3Plus(load_weights(model, path, device)?),
            Self::Fpn(model) => Self::Fpn(load_weights(model, path, device)?),
            Self::SegFormer(model) => Self::SegFormer(load_weights(model, path, device)?),
        };
        Ok(model)
    }
}
