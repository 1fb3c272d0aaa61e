//! Indoor/Outdoor Scene Classification CLI
//!
//! Entry points for dataset preparation (mean image computation, list
//! shuffling/splitting), training, evaluation and single-image
//! inference.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use ndarray::Array3;
use tracing::info;

use inoutdoor::backend::{self, DefaultBackend, TrainingBackend};
use inoutdoor::dataset::{
    compute_mean, load_mean_or_neutral, read_manifest, save_mean, shuffle_and_split,
    write_manifest, LabeledImageList, PreprocessConfig, PreprocessDataset, SceneBatcher,
    NUM_CLASSES,
};
use inoutdoor::inference::{InferenceConfig, Predictor};
use inoutdoor::model::{
    load_model_file, ModelVariant, SceneNet, SceneNetSmall, SceneNetSmall2, TrainingConfig,
};
use inoutdoor::training::{evaluate, train, EvalReport};
use inoutdoor::utils::logging::init_logging;
use inoutdoor::CropMode;

/// Indoor/outdoor scene classification for video frames
#[derive(Parser, Debug)]
#[command(name = "inoutdoor")]
#[command(version)]
#[command(about = "Train and run an indoor/outdoor frame classifier", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the mean image over a dataset list
    ComputeMean {
        /// Path to the image-label list file
        dataset: PathBuf,

        /// Path to write the mean image to
        #[arg(short, long, default_value = "mean.json")]
        output: PathBuf,

        /// Input image size
        #[arg(long, default_value = "224")]
        img_size: u32,

        /// Random seed for the crop draws
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Train a model on train/dev dataset lists
    Train {
        /// Path to the training image-label list file
        dataset_train: PathBuf,

        /// Path to the validation image-label list file
        dataset_dev: PathBuf,

        /// File with a precomputed mean image
        #[arg(long)]
        mean_image: Option<PathBuf>,

        /// Batch size
        #[arg(long, default_value = "32")]
        batch_size: usize,

        /// Maximum number of training epochs
        #[arg(long, default_value = "20")]
        max_epoch: usize,

        /// Adam learning rate
        #[arg(long, default_value = "0.001")]
        learning_rate: f64,

        /// Input image size
        #[arg(long, default_value = "224")]
        img_size: u32,

        /// Model variant: full, small or small2
        #[arg(long, default_value = "small")]
        model: ModelVariant,

        /// Output directory for checkpoint snapshots
        #[arg(short, long, default_value = "output/models")]
        output_dir: String,

        /// Random seed for shuffling, cropping and flipping
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Validate with random crops (the historical behavior)
        #[arg(long, default_value = "false")]
        legacy_eval: bool,

        /// GPU id, -1 for CPU
        #[arg(long, default_value = "-1")]
        gpu_id: i64,
    },

    /// Evaluate a trained model over a dataset list
    Eval {
        /// Path to the evaluation image-label list file
        dataset_eval: PathBuf,

        /// Path to the model checkpoint
        model_file: PathBuf,

        /// File with a precomputed mean image
        #[arg(long)]
        mean_image: Option<PathBuf>,

        /// Batch size
        #[arg(long, default_value = "32")]
        batch_size: usize,

        /// Input image size
        #[arg(long, default_value = "224")]
        img_size: u32,

        /// Model variant: full, small or small2
        #[arg(long, default_value = "small")]
        model: ModelVariant,

        /// Evaluate with random crops (the historical behavior)
        #[arg(long, default_value = "false")]
        legacy_eval: bool,

        /// Random seed for the crop draws in legacy mode
        #[arg(long, default_value = "42")]
        seed: u64,

        /// GPU id, -1 for CPU
        #[arg(long, default_value = "-1")]
        gpu_id: i64,
    },

    /// Classify a single image as indoor or outdoor
    Infer {
        /// Path to the image file
        image_file: PathBuf,

        /// Path to the model checkpoint
        model_file: PathBuf,

        /// File with a precomputed mean image
        #[arg(long)]
        mean_image: Option<PathBuf>,

        /// Input image size
        #[arg(long, default_value = "224")]
        img_size: u32,

        /// Number of random crops to average
        #[arg(long, default_value = "10")]
        samples: usize,

        /// Use a single deterministic center crop instead of random crops
        #[arg(long, default_value = "false")]
        center: bool,

        /// Model variant: full, small or small2
        #[arg(long, default_value = "small")]
        model: ModelVariant,

        /// Random seed for the crop draws
        #[arg(long, default_value = "42")]
        seed: u64,

        /// GPU id, -1 for CPU
        #[arg(long, default_value = "-1")]
        gpu_id: i64,
    },

    /// Shuffle a dataset list and split it into two folds
    Split {
        /// Input image-label list file
        input_list: PathBuf,

        /// Fraction of entries for the first fold
        ratio: f64,

        /// Output list for the first fold
        output_list1: PathBuf,

        /// Output list for the second fold
        output_list2: PathBuf,

        /// Keep the input order instead of shuffling
        #[arg(long, default_value = "false")]
        no_shuffle: bool,

        /// Random seed for shuffling
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose).map_err(|e| anyhow::anyhow!(e))?;
    info!("Backend: {}", backend::backend_name());

    match cli.command {
        Commands::ComputeMean {
            dataset,
            output,
            img_size,
            seed,
        } => run_compute_mean(&dataset, &output, img_size, seed),

        Commands::Train {
            dataset_train,
            dataset_dev,
            mean_image,
            batch_size,
            max_epoch,
            learning_rate,
            img_size,
            model,
            output_dir,
            seed,
            legacy_eval,
            gpu_id,
        } => {
            let config = TrainingConfig {
                max_epoch,
                batch_size,
                learning_rate,
                img_size,
                model,
                seed,
                output_dir,
                legacy_eval,
            };
            run_train(&dataset_train, &dataset_dev, mean_image.as_deref(), &config, gpu_id)
        }

        Commands::Eval {
            dataset_eval,
            model_file,
            mean_image,
            batch_size,
            img_size,
            model,
            legacy_eval,
            seed,
            gpu_id,
        } => run_eval(
            &dataset_eval,
            &model_file,
            mean_image.as_deref(),
            batch_size,
            img_size,
            model,
            legacy_eval,
            seed,
            gpu_id,
        ),

        Commands::Infer {
            image_file,
            model_file,
            mean_image,
            img_size,
            samples,
            center,
            model,
            seed,
            gpu_id,
        } => run_infer(
            &image_file,
            &model_file,
            mean_image.as_deref(),
            img_size,
            samples,
            center,
            model,
            seed,
            gpu_id,
        ),

        Commands::Split {
            input_list,
            ratio,
            output_list1,
            output_list2,
            no_shuffle,
            seed,
        } => run_split(&input_list, ratio, &output_list1, &output_list2, !no_shuffle, seed),
    }
}

/// Compute the dataset mean the same way training will see the images:
/// scaled and randomly cropped, with a zero mean and no flipping, then
/// rescaled to pixel units for storage.
fn run_compute_mean(dataset: &Path, output: &Path, img_size: u32, seed: u64) -> Result<()> {
    let source = LabeledImageList::open(dataset)?;
    let size = img_size as usize;
    let zero_mean = Array3::<f32>::zeros((3, size, size));
    let dataset =
        PreprocessDataset::with_seed(source, zero_mean, PreprocessConfig::legacy_eval(img_size), seed)?;

    let mean = compute_mean(dataset.iter_examples(), dataset.len())?;
    let mean = mean * 255.0;
    save_mean(output, &mean)?;

    println!(
        "{} mean image ({}x{}) written to {}",
        "Done:".green().bold(),
        img_size,
        img_size,
        output.display()
    );
    Ok(())
}

fn run_train(
    dataset_train: &Path,
    dataset_dev: &Path,
    mean_image: Option<&Path>,
    config: &TrainingConfig,
    gpu_id: i64,
) -> Result<()> {
    let device = backend::device(gpu_id);
    let mean = load_mean_or_neutral(mean_image, config.img_size)?;

    let train_source = LabeledImageList::open(dataset_train)?;
    let dev_source = LabeledImageList::open(dataset_dev)?;

    let train_dataset = PreprocessDataset::with_seed(
        train_source,
        mean.clone(),
        PreprocessConfig::train(config.img_size),
        config.seed,
    )?;
    let dev_config = if config.legacy_eval {
        PreprocessConfig::legacy_eval(config.img_size)
    } else {
        PreprocessConfig::eval(config.img_size)
    };
    let dev_dataset =
        PreprocessDataset::with_seed(dev_source, mean, dev_config, config.seed.wrapping_add(1))?;

    println!("{}", "Starting training...".green().bold());
    let report = match config.model {
        ModelVariant::Full => train(
            SceneNet::<TrainingBackend>::new(NUM_CLASSES, &device),
            &train_dataset,
            &dev_dataset,
            config,
            &device,
        )?,
        ModelVariant::Small => train(
            SceneNetSmall::<TrainingBackend>::new(NUM_CLASSES, &device),
            &train_dataset,
            &dev_dataset,
            config,
            &device,
        )?,
        ModelVariant::Small2 => train(
            SceneNetSmall2::<TrainingBackend>::new(NUM_CLASSES, &device),
            &train_dataset,
            &dev_dataset,
            config,
            &device,
        )?,
    };

    println!(
        "{} best val acc {:.2}% at epoch {} (snapshots in {})",
        "Training complete:".green().bold(),
        100.0 * report.best_val_accuracy,
        report.best_epoch,
        report.run_dir.display()
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_eval(
    dataset_eval: &Path,
    model_file: &Path,
    mean_image: Option<&Path>,
    batch_size: usize,
    img_size: u32,
    variant: ModelVariant,
    legacy_eval: bool,
    seed: u64,
    gpu_id: i64,
) -> Result<()> {
    let device = backend::device(gpu_id);
    let mean = load_mean_or_neutral(mean_image, img_size)?;

    let source = LabeledImageList::open(dataset_eval)?;
    let config = if legacy_eval {
        PreprocessConfig::legacy_eval(img_size)
    } else {
        PreprocessConfig::eval(img_size)
    };
    let dataset = PreprocessDataset::with_seed(source, mean, config, seed)?;
    let batcher = SceneBatcher::<DefaultBackend>::new(device.clone(), img_size as usize);

    let report = match variant {
        ModelVariant::Full => {
            let model =
                load_model_file(SceneNet::<DefaultBackend>::new(NUM_CLASSES, &device), model_file, &device)?;
            evaluate(&model, &dataset, &batcher, batch_size)?
        }
        ModelVariant::Small => {
            let model = load_model_file(
                SceneNetSmall::<DefaultBackend>::new(NUM_CLASSES, &device),
                model_file,
                &device,
            )?;
            evaluate(&model, &dataset, &batcher, batch_size)?
        }
        ModelVariant::Small2 => {
            let model = load_model_file(
                SceneNetSmall2::<DefaultBackend>::new(NUM_CLASSES, &device),
                model_file,
                &device,
            )?;
            evaluate(&model, &dataset, &batcher, batch_size)?
        }
    };

    print_eval_report(&report);
    Ok(())
}

fn print_eval_report(report: &EvalReport) {
    println!("{}", "Evaluation results:".cyan().bold());
    println!("  Samples:  {}", report.metrics.total_samples);
    println!("  Loss:     {:.4}", report.loss);
    println!("  Accuracy: {:.2}%", report.metrics.accuracy * 100.0);

    for class in &report.metrics.per_class {
        let name = inoutdoor::SceneClass::from_label(class.class_index)
            .map(|c| c.name())
            .unwrap_or("?");
        println!(
            "  {:8} precision {:.3}  recall {:.3}  f1 {:.3}  (n = {})",
            name, class.precision, class.recall, class.f1, class.support
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn run_infer(
    image_file: &Path,
    model_file: &Path,
    mean_image: Option<&Path>,
    img_size: u32,
    samples: usize,
    center: bool,
    variant: ModelVariant,
    seed: u64,
    gpu_id: i64,
) -> Result<()> {
    let device = backend::device(gpu_id);
    let mean = load_mean_or_neutral(mean_image, img_size)?;

    let config = if center {
        InferenceConfig::deterministic(img_size)
    } else {
        InferenceConfig {
            img_size,
            num_samples: samples,
            crop_mode: CropMode::Random,
            random_flip: false,
        }
    };

    let prediction = match variant {
        ModelVariant::Full => {
            let model =
                load_model_file(SceneNet::<DefaultBackend>::new(NUM_CLASSES, &device), model_file, &device)?;
            Predictor::with_seed(model, mean, config, device, seed)?.predict_file(image_file)?
        }
        ModelVariant::Small => {
            let model = load_model_file(
                SceneNetSmall::<DefaultBackend>::new(NUM_CLASSES, &device),
                model_file,
                &device,
            )?;
            Predictor::with_seed(model, mean, config, device, seed)?.predict_file(image_file)?
        }
        ModelVariant::Small2 => {
            let model = load_model_file(
                SceneNetSmall2::<DefaultBackend>::new(NUM_CLASSES, &device),
                model_file,
                &device,
            )?;
            Predictor::with_seed(model, mean, config, device, seed)?.predict_file(image_file)?
        }
    };

    println!("{}", prediction.to_string().bold());
    println!(
        "  outdoor {:.4}  indoor {:.4}",
        prediction.probabilities[inoutdoor::LABEL_OUTDOOR],
        prediction.probabilities[inoutdoor::LABEL_INDOOR]
    );
    Ok(())
}

fn run_split(
    input_list: &Path,
    ratio: f64,
    output_list1: &Path,
    output_list2: &Path,
    shuffle: bool,
    seed: u64,
) -> Result<()> {
    anyhow::ensure!(
        (0.0..=1.0).contains(&ratio),
        "ratio must be between 0.0 and 1.0"
    );

    let entries = read_manifest(input_list)?;
    let total = entries.len();
    let (first, second) = shuffle_and_split(entries, ratio, shuffle, seed);

    write_manifest(output_list1, &first)?;
    write_manifest(output_list2, &second)?;

    println!(
        "{} {} entries split into {} + {}",
        "Done:".green().bold(),
        total,
        first.len(),
        second.len()
    );
    Ok(())
}
