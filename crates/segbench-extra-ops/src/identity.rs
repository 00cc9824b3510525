//! Parameter-free pass-through layer.
//!
//! Lets convolution blocks keep a fixed conv/norm/activation shape when their
//! config turns normalization or activation off (`Normalization::None`,
//! `Activation::Identity`). It records no weights, so checkpoints of such
//! blocks carry no entry for the missing layer.

use core::marker::PhantomData;

use burn::prelude::*;

/// Layer whose forward pass hands its input back.
#[derive(Module, Debug)]
pub struct Identity<B: Backend> {
    _phantom: PhantomData<B>,
}

impl<B: Backend> Identity<B> {
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }

    /// Returns `input`, whatever its rank.
    pub const fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        input
    }
}

impl<B: Backend> Default for Identity<B> {
    fn default() -> Self {
        Self::new()
    }
}
