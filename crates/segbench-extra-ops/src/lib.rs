//! Additional operations for the Burn deep learning framework
//!
//! This crate provides operations that segbench models need but that are not
//! available in the core Burn framework.

mod crop;
mod identity;

// Convenient re-exports
#[doc(inline)]
pub use crop::{center_crop, crop_offsets};
#[doc(inline)]
pub use identity::Identity;
