//! Benchmark configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use burn::config::Config;
use clap::Args;
use segbench_data::{DatasetConfig, DatasetKind};
use segbench_metric::DEFAULT_SMOOTH;
use segbench_model::ModelKind;

/// Everything a benchmark run needs.
///
/// Loaded from a JSON file via [`BenchmarkConfig::load`] or assembled from
/// command line options.
#[derive(Config, Debug)]
pub struct BenchmarkConfig {
    /// Dataset to evaluate on.
    pub dataset: DatasetConfig,

    /// Model names, in evaluation order.
    #[config(default = "default_models()")]
    pub models: Vec<String>,

    #[config(default = 8)]
    pub batch_size: usize,

    #[config(default = 4)]
    pub num_workers: usize,

    /// Directory receiving the CSV and JSON reports.
    #[config(default = "String::from(\"results\")")]
    pub save_path: String,

    /// Request mixed precision inference.
    #[config(default = true)]
    pub use_amp: bool,

    /// Smoothing term of the overlap metrics.
    #[config(default = "DEFAULT_SMOOTH")]
    pub smooth: f64,

    /// Directory holding `<model-name>.<mpk|pt|pth|safetensors>` weights.
    pub weights_dir: Option<String>,
}

/// Names of the models benchmarked by default.
pub fn default_models() -> Vec<String> {
    ModelKind::defaults()
        .iter()
        .map(|kind| kind.name().to_string())
        .collect()
}

impl BenchmarkConfig {
    /// Loads a benchmark configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&config_str)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Saves this configuration to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let config_str = serde_json::to_string_pretty(self)?;
        fs::write(path, config_str)?;
        Ok(())
    }
}

/// Command line options of the `benchmark` command.
#[derive(Args, Debug, Default, Clone)]
pub struct BenchmarkArgs {
    /// JSON configuration file; options below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Dataset layout: pets, voc or folder
    #[arg(long)]
    pub dataset: Option<String>,

    /// Dataset root directory
    #[arg(long)]
    pub data_root: Option<String>,

    /// Number of classes of a folder dataset
    #[arg(long)]
    pub num_classes: Option<usize>,

    /// Models to evaluate (see the `models` command; `u-net` is the classic
    /// encoder-free U-Net)
    #[arg(long, num_args = 1..)]
    pub models: Option<Vec<String>>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub num_workers: Option<usize>,

    /// Model input size as HEIGHT WIDTH
    #[arg(long, num_args = 2, value_names = ["HEIGHT", "WIDTH"])]
    pub input_size: Option<Vec<usize>>,

    /// Disable mixed precision
    #[arg(long)]
    pub no_amp: bool,

    /// Evaluate at most this many samples
    #[arg(long)]
    pub limit: Option<usize>,

    /// Directory holding pretrained weights named after each model
    #[arg(long)]
    pub weights_dir: Option<String>,
}

impl BenchmarkArgs {
    /// Merge these options into a [`BenchmarkConfig`].
    ///
    /// With `--config` the file is the base and every given option overrides
    /// it. Without it `--data-root` is required and the dataset defaults to
    /// `pets`. `output_path` replaces the report directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded, `--data-root` is
    /// missing without a config file, or the dataset selection is invalid.
    pub fn into_config(self, output_path: Option<String>) -> Result<BenchmarkConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let mut config = BenchmarkConfig::load(path)?;
                if let Some(root) = self.data_root {
                    config.dataset.root = root;
                }
                config.dataset.kind = match (&self.dataset, self.num_classes) {
                    (Some(name), num_classes) => DatasetKind::from_name(name, num_classes)?,
                    (None, Some(num_classes)) => {
                        DatasetKind::from_name(config.dataset.kind.name(), Some(num_classes))?
                    }
                    (None, None) => config.dataset.kind,
                };
                config
            }
            None => {
                let Some(root) = self.data_root else {
                    bail!("--data-root is required without --config");
                };
                let name = self.dataset.as_deref().unwrap_or("pets");
                let kind = DatasetKind::from_name(name, self.num_classes)?;
                BenchmarkConfig::new(DatasetConfig::new(kind, root))
            }
        };

        if let Some(models) = self.models {
            config.models = models;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(num_workers) = self.num_workers {
            config.num_workers = num_workers;
        }
        if let Some(size) = self.input_size {
            let Ok(input_size) = <[usize; 2]>::try_from(size.as_slice()) else {
                bail!("--input-size takes HEIGHT WIDTH, got {size:?}");
            };
            config.dataset.input_size = input_size;
        }
        if self.no_amp {
            config.use_amp = false;
        }
        if self.limit.is_some() {
            config.dataset.limit = self.limit;
        }
        if self.weights_dir.is_some() {
            config.weights_dir = self.weights_dir;
        }
        if let Some(output_path) = output_path {
            config.save_path = output_path;
        }

        Ok(config)
    }
}
