//! Evaluation CLI for the dense-block image classifier.
//!
//! Runs a trained model over a labeled image-folder dataset and reports
//! loss, accuracy and per-class precision/recall/F1.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use densecls::backend::{backend_name, default_device, DefaultBackend};
use densecls::dataset::{ClassificationDataset, LazyImageDataset};
use densecls::eval::{EvaluationReport, Evaluator};
use densecls::model::DenseClassifierConfig;
use densecls::utils::logging::setup_logging;
use densecls::{DEFAULT_BATCH_SIZE, DEFAULT_IMAGE_SIZE};

/// Dense-block image classification
#[derive(Parser, Debug)]
#[command(name = "densecls")]
#[command(version)]
#[command(about = "Evaluate a dense-block image classifier", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a model over a labeled dataset
    Evaluate {
        /// Path to the validation dataset (one subdirectory per class)
        val_dir: PathBuf,

        /// Path to trained model weights; random initialization if omitted
        #[arg(short, long)]
        weights: Option<PathBuf>,

        /// Square image size
        #[arg(short = 's', long, default_value_t = DEFAULT_IMAGE_SIZE)]
        img_size: usize,

        /// Batch size
        #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Number of evaluation worker threads
        #[arg(long, default_value = "4")]
        num_workers: usize,

        /// Evaluate at most this many samples (seeded subsample)
        #[arg(long)]
        max_samples: Option<usize>,

        /// Random seed for the subsample
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Write the report as JSON to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show dataset statistics
    Stats {
        /// Path to the dataset directory
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = setup_logging(cli.verbose);

    match cli.command {
        Commands::Evaluate {
            val_dir,
            weights,
            img_size,
            batch_size,
            num_workers,
            max_samples,
            seed,
            output,
        } => cmd_evaluate(
            &val_dir,
            weights.as_deref(),
            img_size,
            batch_size,
            num_workers,
            max_samples,
            seed,
            output.as_deref(),
        ),

        Commands::Stats { data_dir } => cmd_stats(&data_dir),
    }
}

fn cmd_evaluate(
    val_dir: &std::path::Path,
    weights: Option<&std::path::Path>,
    img_size: usize,
    batch_size: usize,
    num_workers: usize,
    max_samples: Option<usize>,
    seed: u64,
    output: Option<&std::path::Path>,
) -> Result<()> {
    use burn::module::Module;
    use burn::record::CompactRecorder;

    println!("{}", "Evaluation Configuration:".cyan().bold());
    println!("  Dataset:    {}", val_dir.display());
    println!(
        "  Weights:    {}",
        weights
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "random initialization".to_string())
    );
    println!("  Image size: {img_size}");
    println!("  Batch size: {batch_size}");
    println!("  Workers:    {num_workers}");
    println!("  Backend:    {}", backend_name());
    println!();

    let dataset = ClassificationDataset::new(val_dir)?;
    info!(
        "Dataset: {} samples, {} classes",
        dataset.samples.len(),
        dataset.num_classes()
    );

    let mut images = LazyImageDataset::new(dataset.sample_pairs(), img_size);
    if let Some(max) = max_samples {
        images = images.subsample(max, seed);
        info!("Subsampled to {} samples (seed {})", max, seed);
    }

    let device = default_device();
    let model = DenseClassifierConfig::new(dataset.num_classes())
        .init::<DefaultBackend>(&device)?;

    let model = match weights {
        Some(path) => {
            println!("{}", "Loading weights...".cyan());
            let recorder = CompactRecorder::new();
            model
                .load_file(path, &recorder, &device)
                .map_err(|e| anyhow::anyhow!("Failed to load weights: {e:?}"))?
        }
        None => {
            warn!("No weights given; evaluating a randomly initialized model");
            model
        }
    };

    println!("{}", "Running evaluation...".cyan());
    let evaluator = Evaluator::new(model, img_size, batch_size);
    let counters = evaluator.run_parallel(&images, &device, num_workers)?;

    let report = EvaluationReport::from_counters(&counters, &dataset.class_names);
    report.print_summary();

    if let Some(path) = output {
        report.save(path)?;
        println!("Report written to {}", path.display());
    }

    println!(
        "{} accuracy: {:.4}",
        "Done.".green().bold(),
        report.accuracy
    );

    Ok(())
}

fn cmd_stats(data_dir: &std::path::Path) -> Result<()> {
    let dataset = ClassificationDataset::new(data_dir)?;
    dataset.stats().print();
    Ok(())
}
