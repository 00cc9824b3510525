//! Benchmark reports in CSV and JSON.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;

/// Column headers of the CSV report, in order.
pub const CSV_COLUMNS: [&str; 9] = [
    "Model",
    "Dice Score",
    "Precision",
    "Recall",
    "Hausdorff",
    "Inference Time MS",
    "Peak Memory MB",
    "FLOPS",
    "Parameters",
];

/// Quality and cost of one model on one dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelReport {
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Dice Score")]
    pub dice: f64,
    #[serde(rename = "Precision")]
    pub precision: f64,
    #[serde(rename = "Recall")]
    pub recall: f64,
    #[serde(rename = "Hausdorff")]
    pub hausdorff: f64,
    /// Average forward pass time per batch.
    #[serde(rename = "Inference Time MS")]
    pub inference_time_ms: f64,
    #[serde(rename = "Peak Memory MB")]
    pub peak_memory_mb: f64,
    /// Multiply-accumulate count of one forward pass over a full batch.
    #[serde(rename = "FLOPS")]
    pub flops: u64,
    #[serde(rename = "Parameters")]
    pub parameters: usize,
}

impl ModelReport {
    fn csv_row(&self) -> String {
        [
            csv_field(&self.model),
            self.dice.to_string(),
            self.precision.to_string(),
            self.recall.to_string(),
            self.hausdorff.to_string(),
            self.inference_time_ms.to_string(),
            self.peak_memory_mb.to_string(),
            self.flops.to_string(),
            self.parameters.to_string(),
        ]
        .join(",")
    }
}

/// Results of every evaluated model on one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub dataset: String,
    pub timestamp: String,
    pub results: Vec<ModelReport>,
}

/// Where a report was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
}

impl BenchmarkReport {
    /// `{dataset}_benchmark_results_{timestamp}`
    pub fn file_stem(&self) -> String {
        format!("{}_benchmark_results_{}", self.dataset, self.timestamp)
    }

    /// Header plus one row per model.
    pub fn to_csv(&self) -> String {
        let mut csv = CSV_COLUMNS.join(",");
        csv.push('\n');
        for result in &self.results {
            csv.push_str(&result.csv_row());
            csv.push('\n');
        }
        csv
    }

    /// Write the CSV and JSON reports into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or either file cannot be written.
    pub fn write(&self, dir: impl AsRef<Path>) -> Result<ReportPaths> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create report directory {}", dir.display()))?;

        let stem = self.file_stem();
        let csv = dir.join(format!("{stem}.csv"));
        let json = dir.join(format!("{stem}.json"));

        fs::write(&csv, self.to_csv())
            .with_context(|| format!("failed to write {}", csv.display()))?;
        fs::write(&json, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("failed to write {}", json.display()))?;

        Ok(ReportPaths { csv, json })
    }
}

/// Quote a CSV field when it contains a separator, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn report() -> BenchmarkReport {
        BenchmarkReport {
            dataset: "pets".into(),
            timestamp: "20240102_030405".into(),
            results: vec![ModelReport {
                model: "u-net".into(),
                dice: 0.5,
                precision: 0.25,
                recall: 0.75,
                hausdorff: 12.0,
                inference_time_ms: 3.5,
                peak_memory_mb: 64.0,
                flops: 1_000,
                parameters: 42,
            }],
        }
    }

    #[test]
    fn csv_has_header_and_rows() {
        let csv = report().to_csv();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "Model,Dice Score,Precision,Recall,Hausdorff,Inference Time MS,Peak Memory MB,FLOPS,Parameters"
        );
        assert_eq!(lines[1], "u-net,0.5,0.25,0.75,12,3.5,64,1000,42");
        assert_eq!(lines.len(), 2);
    }

    #[rstest]
    #[case("fpn", "fpn")]
    #[case("a,b", "\"a,b\"")]
    #[case("say \"hi\"", "\"say \"\"hi\"\"\"")]
    fn csv_fields_are_quoted_when_needed(#[case] value: &str, #[case] expected: &str) {
        assert_eq!(csv_field(value), expected);
    }

    #[test]
    fn reports_are_written_with_dataset_and_timestamp() {
        let dir = std::env::temp_dir().join(format!("segbench-report-{}", std::process::id()));
        let paths = report().write(&dir).unwrap();

        assert!(paths
            .csv
            .ends_with("pets_benchmark_results_20240102_030405.csv"));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths.json).unwrap()).unwrap();
        assert_eq!(json["results"][0]["Model"], "u-net");
        assert_eq!(json["results"][0]["Parameters"], 42);

        fs::remove_dir_all(dir).unwrap();
    }
}
