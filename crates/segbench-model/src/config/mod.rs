//! Configuration enums shared by the segmentation models.
//!
//! Model-specific configuration structures live next to the modules they
//! build (`UNetConfig`, `DeepLabV3PlusConfig`, ...), following Burn's
//! `XxxConfig::init` convention.

mod enums;

pub use enums::{Activation, ModelKind, Normalization, PaddingMode, UpsamplingType};
