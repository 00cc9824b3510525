//! Backend and float precision selection.
//!
//! The backend is fixed at compile time by feature flags. GPU backends also
//! come in an `f16` variant, which a benchmark runs on when mixed precision
//! is requested; CPU runs always stay at `f32`.

use std::fmt;

use anyhow::Result;
use cfg_if::cfg_if;

use crate::{benchmark::run_benchmark, config::BenchmarkConfig, report::BenchmarkReport};

cfg_if! {
    if #[cfg(feature = "cuda")] {
        use burn::{backend::cuda::{Cuda, CudaDevice}, tensor::f16};

        pub type SelectedBackend = Cuda;
        /// [`SelectedBackend`] computing in `f16`.
        pub type HalfBackend = Cuda<f16>;
        pub type SelectedDevice = CudaDevice;

        pub const SUPPORTS_HALF_PRECISION: bool = true;
        const BACKEND_NAME: &str = "CUDA (NVIDIA GPU)";
    } else if #[cfg(feature = "wgpu")] {
        use burn::{backend::wgpu::{Wgpu, WgpuDevice}, tensor::f16};

        pub type SelectedBackend = Wgpu;
        /// [`SelectedBackend`] computing in `f16`. The adapter must support
        /// `shader-f16`.
        pub type HalfBackend = Wgpu<f16>;
        pub type SelectedDevice = WgpuDevice;

        pub const SUPPORTS_HALF_PRECISION: bool = true;
        const BACKEND_NAME: &str = "WGPU (GPU)";
    } else {
        use burn::backend::ndarray::{NdArray, NdArrayDevice};

        pub type SelectedBackend = NdArray;
        /// NdArray has no `f16` kernels, so this is the `f32` backend.
        pub type HalfBackend = NdArray;
        pub type SelectedDevice = NdArrayDevice;

        pub const SUPPORTS_HALF_PRECISION: bool = false;
        const BACKEND_NAME: &str = "NdArray (CPU)";
    }
}

/// Creates the default device of the selected backend.
pub fn create_device() -> SelectedDevice {
    SelectedDevice::default()
}

/// Human readable backend name for logs.
pub const fn get_backend_name() -> &'static str {
    BACKEND_NAME
}

/// Float precision a benchmark runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Full,
    Half,
}

impl Precision {
    /// Half precision when requested and the backend has it, full otherwise.
    pub const fn resolve(use_amp: bool) -> Self {
        if use_amp && SUPPORTS_HALF_PRECISION {
            Self::Half
        } else {
            Self::Full
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Full => "f32",
            Self::Half => "f16",
        })
    }
}

/// Runs the benchmark on the compiled-in backend at the precision `config`
/// asks for.
///
/// # Errors
///
/// Returns the error of [`run_benchmark`].
pub fn run_on_selected_backend(config: &BenchmarkConfig) -> Result<BenchmarkReport> {
    let device = create_device();
    let precision = Precision::resolve(config.use_amp);
    if config.use_amp && precision == Precision::Full {
        tracing::warn!(
            backend = get_backend_name(),
            "mixed precision needs a GPU backend, running in f32"
        );
    }
    tracing::info!(
        backend = get_backend_name(),
        %precision,
        "starting benchmark"
    );

    match precision {
        Precision::Full => run_benchmark::<SelectedBackend>(config, &device),
        Precision::Half => run_benchmark::<HalfBackend>(config, &device),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_precision_unless_requested() {
        assert_eq!(Precision::resolve(false), Precision::Full);
        assert_eq!(Precision::Full.to_string(), "f32");
        assert_eq!(Precision::Half.to_string(), "f16");
    }

    #[cfg(not(any(feature = "cuda", feature = "wgpu")))]
    #[test]
    fn cpu_backend_ignores_mixed_precision() {
        assert!(!SUPPORTS_HALF_PRECISION);
        assert_eq!(Precision::resolve(true), Precision::Full);
    }

    #[cfg(any(feature = "cuda", feature = "wgpu"))]
    #[test]
    fn gpu_backends_honour_mixed_precision() {
        assert_eq!(Precision::resolve(true), Precision::Half);
    }
}
