//! Enumeration types for segmentation model configuration.
//!
//! These enums select the building blocks of the U-Net style decoders and
//! name the models known to the benchmark.

use std::{fmt, str::FromStr};

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Normalization applied inside a convolutional block.
#[derive(Config, Debug, PartialEq, Eq, Hash)]
pub enum Normalization {
    /// No normalization.
    None,
    /// Batch normalization over the batch and spatial axes.
    Batch,
    /// Instance normalization, per sample and channel.
    Instance,
    /// Group normalization with the given number of groups.
    Group(usize),
}

impl Default for Normalization {
    fn default() -> Self {
        Self::None
    }
}

/// Non-linearity applied inside a convolutional block.
#[derive(Config, Debug, PartialEq)]
pub enum Activation {
    /// Rectified linear unit.
    Relu,
    /// ReLU clipped at 6, as used by MobileNetV2.
    Relu6,
    /// Leaky ReLU with the given negative slope.
    LeakyRelu(f64),
    /// Gaussian error linear unit.
    Gelu,
    /// No activation.
    Identity,
}

impl Default for Activation {
    fn default() -> Self {
        Self::Relu
    }
}

/// How a decoder block doubles the spatial resolution of its input.
#[derive(Config, Debug, PartialEq, Eq, Hash)]
pub enum UpsamplingType {
    /// Learned 2x2 transposed convolution with stride 2.
    TransposedConv,
    /// Nearest-neighbour interpolation.
    Nearest,
    /// Bilinear interpolation.
    Bilinear,
}

impl Default for UpsamplingType {
    fn default() -> Self {
        Self::TransposedConv
    }
}

/// Border handling of padded convolutions.
///
/// Only [`PaddingMode::Zeros`] can be executed; the other modes are accepted in
/// configuration files and rejected when the block is built.
#[derive(Config, Debug, PartialEq, Eq, Hash)]
pub enum PaddingMode {
    Zeros,
    Reflect,
    Replicate,
    Circular,
}

impl Default for PaddingMode {
    fn default() -> Self {
        Self::Zeros
    }
}

/// The segmentation models the benchmark knows by name.
///
/// Serialized with the command line names so configuration files and reports agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "u-net", alias = "unet")]
    UNet,
    #[serde(rename = "deeplab-v3", alias = "deeplabv3")]
    DeepLabV3Plus,
    #[serde(rename = "fpn")]
    Fpn,
    #[serde(rename = "seg-former", alias = "segformer")]
    SegFormer,
    #[serde(rename = "sam")]
    Sam,
    #[serde(rename = "medsam")]
    MedSam,
    #[serde(rename = "swin-unet", alias = "swinunet")]
    SwinUnet,
}

impl ModelKind {
    /// Every known model, in listing order.
    pub const fn all() -> [Self; 7] {
        [
            Self::DeepLabV3Plus,
            Self::Fpn,
            Self::SegFormer,
            Self::UNet,
            Self::Sam,
            Self::MedSam,
            Self::SwinUnet,
        ]
    }

    /// The models benchmarked when none are requested explicitly.
    pub const fn defaults() -> [Self; 4] {
        [Self::DeepLabV3Plus, Self::Fpn, Self::SegFormer, Self::UNet]
    }

    /// Name used on the command line and in reports.
    pub const fn name(self) -> &'static str {
        match self {
            Self::UNet => "u-net",
            Self::DeepLabV3Plus => "deeplab-v3",
            Self::Fpn => "fpn",
            Self::SegFormer => "seg-former",
            Self::Sam => "sam",
            Self::MedSam => "medsam",
            Self::SwinUnet => "swin-unet",
        }
    }

    /// The network this name builds.
    pub const fn description(self) -> &'static str {
        match self {
            Self::UNet => "classic encoder-free U-Net, not an encoder-backed U-Net",
            Self::DeepLabV3Plus => "DeepLabV3+ on a MobileNetV2 encoder",
            Self::Fpn => "FPN on a MobileNetV2 encoder",
            Self::SegFormer => "SegFormer-style MLP decoder on a MobileNetV2 encoder",
            Self::Sam => "Segment Anything",
            Self::MedSam => "MedSAM",
            Self::SwinUnet => "Swin-Unet",
        }
    }

    /// Whether a network can be built for this kind.
    pub const fn is_supported(self) -> bool {
        !matches!(self, Self::Sam | Self::MedSam | Self::SwinUnet)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let kind = match normalized.as_str() {
            "u-net" | "unet" => Self::UNet,
            "deeplab-v3" | "deeplabv3" | "deeplab-v3-plus" | "deeplabv3plus" => {
                Self::DeepLabV3Plus
            }
            "fpn" => Self::Fpn,
            "seg-former" | "segformer" => Self::SegFormer,
            "sam" => Self::Sam,
            "medsam" | "med-sam" => Self::MedSam,
            "swin-unet" | "swinunet" => Self::SwinUnet,
            _ => {
                return Err(ModelError::UnknownModel {
                    name: s.to_string(),
                    available: Self::all()
                        .iter()
                        .map(|kind| kind.name())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            }
        };
        Ok(kind)
    }
}
