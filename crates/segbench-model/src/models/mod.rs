//! # Model Architectures
//!
//! - `unet`: the configurable U-Net with center-cropped skip connections.
//! - `encoder`: the MobileNetV2 feature pyramid shared by the other models.
//! - `deeplab`, `fpn`, `segformer`: decoder heads on top of that encoder.
//! - `registry`: one enum over every constructible model, selected by name.
//! - `modules`: building blocks such as convolutional, decoder and ASPP blocks.

pub mod deeplab;
pub mod encoder;
pub mod fpn;
pub mod modules;
pub mod registry;
pub mod segformer;
pub mod unet;
