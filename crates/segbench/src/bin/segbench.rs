use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use segbench::{
    backend::SUPPORTS_HALF_PRECISION, config::BenchmarkArgs, create_device, get_backend_name,
    logging::init_logging, model::ModelKind, run_on_selected_backend,
};

#[derive(Parser)]
#[command(name = "segbench")]
#[command(about = "Benchmark image segmentation models on public datasets")]
struct Cli {
    /// Minimum level of logged events (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "info")]
    logging_level: String,

    /// Directory receiving log files
    #[arg(long, global = true, default_value = "logs")]
    logging_path: PathBuf,

    /// Directory receiving benchmark reports
    #[arg(long, global = true)]
    output_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Benchmark segmentation models on a dataset
    Benchmark(BenchmarkArgs),

    /// List known models and whether they can be built.
    ///
    /// `u-net` is the classic encoder-free U-Net, not a U-Net on the
    /// MobileNetV2 encoder
    Models,

    /// Show backend information
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_file = init_logging(&cli.logging_level, &cli.logging_path)?;
    tracing::debug!(path = %log_file.display(), "logging to file");

    let result = run(cli);
    if let Err(err) = &result {
        tracing::error!(error = ?err, "unexpected error");
    }
    tracing::info!("exiting");
    result
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Benchmark(args) => {
            let config = args.into_config(cli.output_path)?;
            let report = run_on_selected_backend(&config)?;
            tracing::info!(
                dataset = %report.dataset,
                models = report.results.len(),
                "benchmark complete"
            );
            Ok(())
        }

        Commands::Models => {
            println!("Available models:");
            for kind in ModelKind::all() {
                let status = if kind.is_supported() {
                    "supported"
                } else {
                    "not supported"
                };
                println!("  - {kind}: {} ({status})", kind.description());
            }
            Ok(())
        }

        Commands::Info => {
            println!("segbench Information:");
            println!("  Backend: {}", get_backend_name());
            println!("  Half precision: {SUPPORTS_HALF_PRECISION}");
            println!("  Device: {:?}", create_device());
            Ok(())
        }
    }
}
