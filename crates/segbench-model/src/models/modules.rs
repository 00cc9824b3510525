mod aspp;
mod conv_block;
mod decoder_block;
mod inverted_residual;
mod layers;

pub use aspp::*;
pub use conv_block::*;
pub use decoder_block::*;
pub use inverted_residual::*;
pub use layers::*;
