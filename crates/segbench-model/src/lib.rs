//! # segbench-model
//!
//! Segmentation networks benchmarked by segbench, built with the Burn deep
//! learning framework.
//!
//! ## Modules
//!
//! - `config`: enums selecting normalization, activation, upsampling and the model kind.
//! - `error`: the [`ModelError`] type returned by every fallible constructor.
//! - `models`: U-Net, the MobileNetV2 encoder and the DeepLabV3+, FPN and
//!   SegFormer heads, plus the name-based [`SegmentationModel`] registry.
//! - `profile`: analytic multiply-accumulate counting for a given input shape.
//! - `weights`: loading Burn, PyTorch and safetensors weight files.
//!
//! ## Key Components
//!
//! - [`SegmentationModelConfig`]: selects a model by [`ModelKind`] and builds it.
//! - [`SegmentationModel`]: forward pass, cost profile and weight loading for any model.
//! - [`UNetConfig`]: the fully configurable U-Net.

mod config;
mod error;
mod models;
mod profile;
mod weights;

#[doc(inline)]
pub use config::{Activation, ModelKind, Normalization, PaddingMode, UpsamplingType};
#[doc(inline)]
pub use error::{ModelError, ModelResult};
#[doc(inline)]
pub use models::{
    deeplab::{DeepLabV3Plus, DeepLabV3PlusConfig},
    encoder::{MobileNetV2Config, MobileNetV2Encoder},
    fpn::{Fpn, FpnConfig},
    modules::{
        ConvolutionalBlock, ConvolutionalBlockConfig, DecoderBlock, DecoderBlockConfig,
        InvertedResidual, InvertedResidualConfig, ASPPConfig, ASPP,
    },
    registry::{SegmentationModel, SegmentationModelConfig},
    segformer::{SegFormer, SegFormerConfig},
    unet::{UNet, UNetConfig},
};
#[doc(inline)]
pub use profile::Cost;
#[doc(inline)]
pub use weights::load_weights;
