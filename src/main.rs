//! MaskVision CLI
//!
//! Entry point for training, dataset inspection and inference on the
//! mask-wearing face classification system.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use maskvision::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use maskvision::utils::logging::{init_logging, LogConfig};

/// Mask-wearing face classification
///
/// Trains a CNN over 18 composite classes (mask state x gender x age bucket)
/// with the Burn framework, with holdout, cross-validation and CutMix
/// training modes.
#[derive(Parser, Debug)]
#[command(name = "maskvision")]
#[command(version)]
#[command(about = "Mask-wearing face classification with Burn", long_about = None)]
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
    /// Train the classifier
    Train {
        /// Path to the dataset directory of profile folders
        #[arg(short, long, default_value = "data/train")]
        data_dir: String,

        /// Output directory for run folders
        #[arg(short, long, default_value = "output")]
        output_dir: String,

        /// Run name; directories disambiguate as name, name2, name3, ...
        #[arg(short, long, default_value = "exp")]
        name: String,

        /// Training mode: plain, k, s, g, cutmix
        #[arg(short, long, default_value = "plain")]
        mode: String,

        /// Number of training epochs
        #[arg(short, long, default_value = "30")]
        epochs: usize,

        /// Batch size for training
        #[arg(short, long, default_value = "64")]
        batch_size: usize,

        /// Batch size for validation
        #[arg(long, default_value = "256")]
        valid_batch_size: usize,

        /// Initial learning rate
        #[arg(short, long, default_value = "0.001")]
        learning_rate: f64,

        /// Halve the learning rate every this many epochs
        #[arg(long, default_value = "20")]
        lr_decay_step: usize,

        /// Model architecture: base, wide, lite
        #[arg(long, default_value = "base")]
        model: String,

        /// Optimizer: sgd, adam
        #[arg(long, default_value = "adam")]
        optimizer: String,

        /// Loss function: cross_entropy, label_smoothing, focal
        #[arg(long, default_value = "cross_entropy")]
        criterion: String,

        /// Augmentation pipeline: base, custom
        #[arg(long, default_value = "base")]
        augmentation: String,

        /// Sample training batches inversely to class frequency
        #[arg(long, default_value = "false")]
        balanced: bool,

        /// Apply the training augmentation pipeline to validation images too
        #[arg(long, default_value = "false")]
        augment_validation: bool,

        /// Number of folds for cross-validation modes
        #[arg(long, default_value = "5")]
        num_folds: usize,

        /// Validation fraction for holdout modes
        #[arg(long, default_value = "0.2")]
        val_ratio: f64,

        /// Early stopping patience in epochs (0 disables)
        #[arg(long, default_value = "0")]
        early_stopping: usize,

        /// Log running averages every this many batches
        #[arg(long, default_value = "20")]
        log_interval: usize,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Model input width in pixels
        #[arg(long, default_value = "96")]
        image_width: usize,

        /// Model input height in pixels
        #[arg(long, default_value = "128")]
        image_height: usize,
    },

    /// Show dataset statistics
    Stats {
        /// Path to the dataset directory
        #[arg(short, long, default_value = "data/train")]
        data_dir: String,
    },

    /// Run inference on an image with one or more trained checkpoints
    Infer {
        /// Path to input image or directory
        #[arg(short, long)]
        input: String,

        /// Checkpoint file(s); several paths form a fold ensemble
        #[arg(short, long, required = true, num_args = 1..)]
        model: Vec<PathBuf>,

        /// Model architecture the checkpoints were trained with
        #[arg(long, default_value = "base")]
        arch: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    print_banner();

    match cli.command {
        Commands::Train {
            data_dir,
            output_dir,
            name,
            mode,
            epochs,
            batch_size,
            valid_batch_size,
            learning_rate,
            lr_decay_step,
            model,
            optimizer,
            criterion,
            augmentation,
            balanced,
            augment_validation,
            num_folds,
            val_ratio,
            early_stopping,
            log_interval,
            seed,
            image_width,
            image_height,
        } => {
            let config = maskvision::TrainConfig {
                epochs,
                batch_size,
                valid_batch_size,
                learning_rate,
                lr_decay_step,
                model,
                optimizer,
                criterion,
                augmentation,
                mode,
                balanced,
                augment_validation,
                num_folds,
                val_ratio,
                early_stopping,
                log_interval,
                seed,
                image_width,
                image_height,
                ..Default::default()
            };

            info!("Backend: {}", backend_name());
            maskvision::run_training::<TrainingBackend>(
                Path::new(&data_dir),
                Path::new(&output_dir),
                &name,
                config,
                Default::default(),
            )?;
        }

        Commands::Stats { data_dir } => {
            cmd_stats(&data_dir)?;
        }

        Commands::Infer { input, model, arch } => {
            cmd_infer(&input, &model, &arch)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════╗
 ║   MaskVision                                     ║
 ║   Mask-Wearing Classification with Burn + Rust   ║
 ╚══════════════════════════════════════════════════╝
  "#
        .cyan()
    );
}

fn cmd_stats(data_dir: &str) -> Result<()> {
    info!("Computing dataset statistics for: {}", data_dir);

    if !Path::new(data_dir).exists() {
        println!(
            "{} Dataset directory not found: {}",
            "Error:".red(),
            data_dir
        );
        return Ok(());
    }

    match maskvision::MaskDataset::new(data_dir) {
        Ok(dataset) => {
            dataset.stats().print();
        }
        Err(e) => {
            println!("{} Failed to load dataset: {}", "Error:".red(), e);
        }
    }

    Ok(())
}

fn cmd_infer(input: &str, model_paths: &[PathBuf], arch: &str) -> Result<()> {
    use maskvision::dataset::{label, Augmenter, MaskBatcher, MaskItem, IMAGE_HEIGHT, IMAGE_WIDTH};
    use maskvision::model::{model_config, Scorer};

    use burn::data::dataloader::batcher::Batcher;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    info!("Running inference");
    info!("  Input: {}", input);
    info!("  Checkpoints: {:?}", model_paths);

    println!("{}", "Inference Configuration:".cyan().bold());
    println!("  Input:   {}", input);
    println!("  Models:  {}", model_paths.len());
    println!("  Backend: {}", backend_name());
    println!();

    let input_path = Path::new(input);
    if !input_path.exists() {
        println!("{} Input path not found: {}", "Error:".red(), input);
        return Ok(());
    }

    let device = default_device();
    let config = model_config(arch)?;
    let scorer = Scorer::<DefaultBackend>::from_files(model_paths, &config, &device)?;

    let files: Vec<PathBuf> = if input_path.is_dir() {
        std::fs::read_dir(input_path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| ["jpg", "jpeg", "png", "bmp"].contains(&e.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect()
    } else {
        vec![input_path.to_path_buf()]
    };

    // Resize-only preprocessing, same as validation
    let augmenter = Augmenter::base(IMAGE_WIDTH as u32, IMAGE_HEIGHT as u32);
    let batcher = MaskBatcher::<DefaultBackend>::new(device, IMAGE_WIDTH, IMAGE_HEIGHT);
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    for file_path in &files {
        let img = image::open(file_path).map_err(|e| {
            maskvision::MaskVisionError::ImageLoad(file_path.clone(), e.to_string())
        })?;
        let img = augmenter.apply(img, &mut rng);
        let item = MaskItem::from_image(&img, 0);
        let batch = batcher.batch(vec![item]);

        let start = std::time::Instant::now();
        let probs = scorer.score(batch.images);
        let inference_time = start.elapsed();

        let probs_vec: Vec<f32> = probs.into_data().to_vec().unwrap();
        let mut indexed: Vec<(usize, f32)> =
            probs_vec.iter().enumerate().map(|(i, &p)| (i, p)).collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        println!(
            "{}",
            file_path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .bold()
        );
        println!(
            "  Predicted: {} ({:.1}%)",
            label::class_name(indexed[0].0).green(),
            indexed[0].1 * 100.0
        );
        println!("  Time: {:.2}ms", inference_time.as_secs_f64() * 1000.0);
        println!("  Top-5:");
        for (i, (idx, prob)) in indexed.iter().take(5).enumerate() {
            println!(
                "    {}. {} ({:.1}%)",
                i + 1,
                label::class_name(*idx),
                prob * 100.0
            );
        }
        println!();
    }

    Ok(())
}
