//! `segbench`: benchmark image segmentation models with Burn.
//!
//! Runs a fixed evaluation protocol. It loads a dataset, runs each model in
//! inference mode, measures per-class Dice, precision, recall and Hausdorff
//! distance together with time, memory and compute cost, and writes a
//! comparison report.

pub mod backend;
pub mod benchmark;
pub mod config;
pub mod logging;
pub mod memory;
pub mod report;
pub mod timestamp;

#[doc(inline)]
pub use backend::{
    create_device, get_backend_name, run_on_selected_backend, HalfBackend, Precision,
    SelectedBackend, SelectedDevice,
};
#[doc(inline)]
pub use benchmark::run_benchmark;
#[doc(inline)]
pub use config::{BenchmarkArgs, BenchmarkConfig};
#[doc(inline)]
pub use report::{BenchmarkReport, ModelReport};
#[doc(inline)]
pub use segbench_data as data;
#[doc(inline)]
pub use segbench_metric as metric;
#[doc(inline)]
pub use segbench_model as model;
