//! The benchmark runner.
//!
//! Loads a dataset once, then builds, profiles and evaluates every requested
//! model on it, and writes a CSV and JSON report.

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{bail, Context, Result};
use burn::{
    data::{dataloader::DataLoader, dataset::Dataset},
    prelude::*,
    tensor::activation::softmax,
};
use segbench_data::{
    build_dataloader, DatasetKind, LoadFailures, SegmentationBatch, SegmentationDataset,
};
use segbench_metric::{calculate_metrics, BatchMetrics, MetricsAggregator};
use segbench_model::{ModelKind, ModelResult, SegmentationModel, SegmentationModelConfig};

use crate::{
    config::BenchmarkConfig,
    memory::MemoryProbe,
    report::{BenchmarkReport, ModelReport},
    timestamp::session,
};

/// Weight file extensions tried, in order, under the weights directory.
const WEIGHT_EXTENSIONS: [&str; 4] = ["mpk", "safetensors", "pt", "pth"];

/// Averaged metrics and timing of one model over the whole dataset.
#[derive(Debug, Clone, Copy)]
struct Evaluation {
    metrics: BatchMetrics,
    inference_time_ms: f64,
}

/// Runs the benchmark described by `config` on `device`.
///
/// Models that fail to parse or build are logged and skipped.
///
/// # Errors
///
/// Returns an error if the dataset cannot be loaded, a sample fails to
/// decode, the dataset produces no batches, metrics cannot be computed, no
/// model could be evaluated, or the reports cannot be written.
pub fn run_benchmark<B: Backend>(
    config: &BenchmarkConfig,
    device: &B::Device,
) -> Result<BenchmarkReport> {
    if config.batch_size == 0 {
        bail!("batch size must be at least 1");
    }

    let dataset = SegmentationDataset::new(&config.dataset)?;
    let dataset_kind = dataset.kind();
    let samples = dataset.len();
    if samples == 0 {
        bail!("dataset {dataset_kind} has no samples");
    }

    tracing::info!(
        dataset = %dataset_kind,
        samples,
        classes = dataset_kind.num_classes(),
        batch_size = config.batch_size,
        ?device,
        float = std::any::type_name::<B::FloatElem>(),
        "benchmark configuration",
    );

    let failures = dataset.failures();
    let loader = build_dataloader::<B>(dataset, config.batch_size, config.num_workers, device);
    let [height, width] = config.dataset.input_size;

    let mut results = Vec::with_capacity(config.models.len());
    for name in &config.models {
        let kind = match name.parse::<ModelKind>() {
            Ok(kind) => kind,
            Err(err) => {
                tracing::error!(model = %name, error = %err, "skipping model");
                continue;
            }
        };

        tracing::info!(model = %kind, dataset = %dataset_kind, "evaluating model");
        let memory = MemoryProbe::start();

        let weights_dir = config.weights_dir.as_deref().map(Path::new);
        let model = match build_model::<B>(kind, dataset_kind.num_classes(), weights_dir, device) {
            Ok(model) => model,
            Err(err) => {
                tracing::error!(model = %kind, error = %err, "skipping model");
                continue;
            }
        };

        let cost = model.profile([config.batch_size, 3, height, width]);
        let parameters = model.num_params();
        tracing::info!(model = %kind, flops = cost.macs, parameters, "model profiled");

        let evaluation = evaluate(
            &model,
            loader.as_ref(),
            &failures,
            dataset_kind,
            config.smooth,
            device,
        )
        .with_context(|| format!("failed to evaluate {kind}"))?;

        let result = ModelReport {
            model: kind.name().to_string(),
            dice: evaluation.metrics.dice,
            precision: evaluation.metrics.precision,
            recall: evaluation.metrics.recall,
            hausdorff: evaluation.metrics.hausdorff,
            inference_time_ms: evaluation.inference_time_ms,
            peak_memory_mb: memory.peak_delta_mb(),
            flops: cost.macs,
            parameters,
        };
        tracing::info!(
            "results for {kind}: {}",
            serde_json::to_string_pretty(&result)?
        );
        results.push(result);
    }

    if results.is_empty() {
        bail!("no model could be evaluated");
    }

    let report = BenchmarkReport {
        dataset: dataset_kind.name().to_string(),
        timestamp: session().to_string(),
        results,
    };
    let paths = report.write(&config.save_path)?;
    tracing::info!(
        csv = %paths.csv.display(),
        json = %paths.json.display(),
        "reports written",
    );

    Ok(report)
}

/// Build a model sized for the dataset and load its weights when available.
fn build_model<B: Backend>(
    kind: ModelKind,
    num_classes: usize,
    weights_dir: Option<&Path>,
    device: &B::Device,
) -> ModelResult<SegmentationModel<B>> {
    let model = SegmentationModelConfig::new(kind)
        .with_num_classes(num_classes)
        .init::<B>(device)?;

    let Some(dir) = weights_dir else {
        return Ok(model);
    };

    match find_weights(dir, kind) {
        Some(path) => {
            tracing::info!(model = %kind, path = %path.display(), "loading weights");
            model.load_weights(&path, device)
        }
        None => {
            tracing::warn!(
                model = %kind,
                dir = %dir.display(),
                "no weights found, evaluating initialized model"
            );
            Ok(model)
        }
    }
}

/// First `{dir}/{model-name}.{ext}` that exists.
fn find_weights(dir: &Path, kind: ModelKind) -> Option<PathBuf> {
    WEIGHT_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{ext}", kind.name())))
        .find(|path| path.is_file())
}

/// Run the model over every batch and average the metrics.
///
/// A sample load error recorded during the pass is returned instead.
fn evaluate<B: Backend>(
    model: &SegmentationModel<B>,
    loader: &dyn DataLoader<B, SegmentationBatch<B>>,
    failures: &LoadFailures,
    dataset: DatasetKind,
    smooth: f64,
    device: &B::Device,
) -> Result<Evaluation> {
    let policy = dataset.policy();
    let offset = dataset.label_offset();
    let mut aggregator = MetricsAggregator::new();
    let mut inference_time = Duration::ZERO;

    for batch in loader.iter() {
        let start = Instant::now();
        let logits = model.forward(batch.images);
        B::sync(device);
        inference_time += start.elapsed();

        let predictions = softmax(logits, 1)
            .argmax(1)
            .squeeze::<3>(1)
            .add_scalar(offset);
        let metrics = calculate_metrics(predictions, batch.masks, &policy, smooth)?;
        tracing::debug!(
            batch = aggregator.count(),
            dice = metrics.dice,
            precision = metrics.precision,
            recall = metrics.recall,
            hausdorff = metrics.hausdorff,
            "batch evaluated",
        );
        aggregator.update(&metrics);
    }

    if let Some(err) = failures.take() {
        return Err(err.into());
    }

    let batches = aggregator.count();
    if batches == 0 {
        bail!("the data loader produced no batches");
    }

    Ok(Evaluation {
        metrics: aggregator.averages(),
        inference_time_ms: inference_time.as_secs_f64() * 1000.0 / batches as f64,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use image::{GrayImage, Luma, Rgb, RgbImage};
    use segbench_data::DatasetConfig;

    use super::*;
    use crate::tests::TestBackend;

    fn folder_fixture(name: &str, count: u32) -> PathBuf {
        let root = std::env::temp_dir().join(format!("segbench-{name}-{}", std::process::id()));
        if root.exists() {
            fs::remove_dir_all(&root).unwrap();
        }
        fs::create_dir_all(root.join("images")).unwrap();
        fs::create_dir_all(root.join("masks")).unwrap();

        for index in 0..count {
            RgbImage::from_pixel(20, 20, Rgb([40 * index as u8, 90, 200]))
                .save(root.join(format!("images/{index}.png")))
                .unwrap();
            let mask = GrayImage::from_fn(20, 20, |x, _| Luma([u8::from(x >= 10)]));
            mask.save(root.join(format!("masks/{index}.png"))).unwrap();
        }
        root
    }

    fn config(root: &Path, models: &[&str]) -> BenchmarkConfig {
        let dataset =
            DatasetConfig::new(DatasetKind::Folder { num_classes: 2 }, root.display().to_string())
                .with_input_size([32, 32]);
        BenchmarkConfig::new(dataset)
            .with_models(models.iter().map(|name| name.to_string()).collect())
            .with_batch_size(2)
            .with_num_workers(0)
            .with_use_amp(false)
            .with_save_path(root.join("results").display().to_string())
    }

    #[test]
    fn unet_is_benchmarked_and_unknown_models_are_skipped() {
        let root = folder_fixture("bench-unet", 3);
        let device = Default::default();

        let report =
            run_benchmark::<TestBackend>(&config(&root, &["u-net", "sam", "mask-rcnn"]), &device)
                .unwrap();

        assert_eq!(report.dataset, "folder");
        assert_eq!(report.results.len(), 1);
        let result = &report.results[0];
        assert_eq!(result.model, "u-net");
        assert!((0.0..=1.0).contains(&result.dice));
        assert!(result.flops > 0);
        assert!(result.parameters > 0);
        assert!(result.inference_time_ms >= 0.0);

        let csv = root
            .join("results")
            .join(format!("{}.csv", report.file_stem()));
        let rows = fs::read_to_string(csv).unwrap();
        assert_eq!(rows.lines().count(), 2);

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn only_unsupported_models_is_an_error() {
        let root = folder_fixture("bench-none", 1);
        let device = Default::default();

        let result = run_benchmark::<TestBackend>(&config(&root, &["medsam"]), &device);

        assert!(result.is_err());
        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn empty_limit_is_an_error() {
        let root = folder_fixture("bench-empty", 1);
        let device = Default::default();
        let mut config = config(&root, &["u-net"]);
        config.dataset.limit = Some(0);

        let err = run_benchmark::<TestBackend>(&config, &device).unwrap_err();

        assert!(err.to_string().contains("no samples"));
        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn missing_weights_fall_back_to_initialized_model() {
        let dir = std::env::temp_dir().join(format!("segbench-no-weights-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        assert!(find_weights(&dir, ModelKind::Fpn).is_none());
        fs::write(dir.join("fpn.pth"), b"").unwrap();
        assert_eq!(find_weights(&dir, ModelKind::Fpn), Some(dir.join("fpn.pth")));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn undecodable_sample_fails_the_run() {
        let root = folder_fixture("bench-broken", 4);
        fs::write(root.join("masks/2.png"), b"truncated").unwrap();
        let device = Default::default();
        let config = config(&root, &["u-net"]).with_num_workers(2);

        let err = run_benchmark::<TestBackend>(&config, &device).unwrap_err();

        assert!(err.to_string().contains("u-net"));
        assert!(format!("{err:#}").contains("masks"));
        fs::remove_dir_all(root).unwrap();
    }
}
