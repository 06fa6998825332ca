use anyhow::{bail, Context};
use clap::Parser;
use image::GrayImage;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::info;

use forestcut::dataset::TrainingSet;
use forestcut::features::{window_radius_from_size, FeatureExtractor};
use forestcut::forest::{Forest, TrainParams};
use forestcut::{crf::PixelCrf, eval, gibbs, maxflow, model, Labeling};

#[derive(Debug, clap::Parser)]
#[command(about = "Random-forest image segmentation with CRF smoothing")]
struct Args {
    /// Show debug output.
    #[clap(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::Subcommand)]
enum Command {
    /// Learn a forest from labeled images and write it to a model file.
    Train(TrainArgs),
    /// Segment an image with a trained model.
    Segment(SegmentArgs),
}

#[derive(Debug, Clone, clap::Parser)]
struct TrainArgs {
    /// Training images (grayscale), one per label image.
    #[clap(short, long, num_args = 1.., required = true)]
    images: Vec<PathBuf>,

    /// Label images: 0 = unlabeled, two nonzero intensities for the two
    /// classes, the brighter one being foreground.
    #[clap(short, long, num_args = 1.., required = true)]
    labels: Vec<PathBuf>,

    /// Where to write the model; ".json" is appended when missing.
    #[clap(short = 'f', long)]
    model: PathBuf,

    /// Number of trees.
    #[clap(long, default_value_t = 7)]
    forest_size: u32,

    /// Maximum number of splits on any root-to-leaf path.
    #[clap(long, default_value_t = 3)]
    max_tree_depth: u32,

    /// Random split candidates drawn per node.
    #[clap(long, default_value_t = 600)]
    testobject_tries: u32,

    /// Side length of the feature window; must be odd.
    #[clap(short, long, default_value_t = 9)]
    window_size: u32,

    /// 0 = all hardware threads, 1 = sequential, N = exactly N workers.
    #[clap(short, long, default_value_t = 0)]
    threads: usize,

    /// Seed for reproducible training; random when omitted.
    #[clap(long)]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Method {
    /// Exact minimum-cut labeling (default).
    Maxflow,
    /// Approximate Gibbs-sampling labeling.
    Gibbs,
}

#[derive(Debug, Clone, clap::Parser)]
struct SegmentArgs {
    /// Image to segment.
    #[clap(short, long)]
    input: PathBuf,

    /// Trained model file.
    #[clap(short = 'f', long)]
    model: PathBuf,

    /// Where to write the result labeling image.
    #[clap(short, long)]
    output: PathBuf,

    /// Smoothness pressure between neighboring pixels.
    #[clap(short, long, default_value_t = 10.0)]
    edge_weight: f64,

    #[clap(short, long, value_enum, default_value_t = Method::Maxflow)]
    method: Method,

    /// Sampling sweeps for the gibbs method.
    #[clap(long, default_value_t = 2000)]
    gibbs_steps: u32,

    /// Also write the forest's probability map as a grayscale image.
    #[clap(short, long)]
    probability_out: Option<PathBuf>,

    /// Ground-truth label image; when given, an F-measure report is printed
    /// and written next to the result.
    #[clap(short, long)]
    ground_truth: Option<PathBuf>,

    /// Seed for the gibbs sampler.
    #[clap(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();

    match &args.command {
        Command::Train(train_args) => train(train_args),
        Command::Segment(segment_args) => segment(segment_args),
    }
}

fn train(args: &TrainArgs) -> anyhow::Result<()> {
    // All configuration checks happen before any image is decoded.
    let window_radius = window_radius_from_size(args.window_size)?;
    if args.images.len() != args.labels.len() {
        bail!(
            "got {} training images but {} label images",
            args.images.len(),
            args.labels.len()
        );
    }
    if args.forest_size == 0 {
        bail!("forest size must be at least 1");
    }

    let mut pairs = Vec::with_capacity(args.images.len());
    for (image_path, label_path) in args.images.iter().zip(&args.labels) {
        pairs.push((open_gray(image_path)?, open_gray(label_path)?));
    }

    let seed = args.seed.unwrap_or_else(rand::random);
    info!("training with seed {seed}");

    let extractor = FeatureExtractor::new(window_radius);
    let mut rng = StdRng::seed_from_u64(seed);
    let set = TrainingSet::build(&pairs, &extractor, &mut rng)?;
    info!("{} balanced training samples", set.samples.len());

    let forest = Forest::train(
        &set,
        window_radius,
        &TrainParams {
            forest_size: args.forest_size,
            max_tree_depth: args.max_tree_depth,
            testobject_tries: args.testobject_tries,
            threads: args.threads,
        },
        seed,
    )?;

    // The model is only written once training has fully succeeded, so a
    // failure never leaves a partial file behind.
    let path = ensure_json_extension(&args.model);
    model::save(&forest, &path)
        .with_context(|| format!("cannot write model to {}", path.display()))?;
    info!("model written to {}", path.display());

    Ok(())
}

fn segment(args: &SegmentArgs) -> anyhow::Result<()> {
    if !args.edge_weight.is_finite() || args.edge_weight < 0.0 {
        bail!("edge weight must be finite and non-negative");
    }

    let forest = model::load(&ensure_json_extension(&args.model))
        .with_context(|| format!("cannot load model from {}", args.model.display()))?;
    let image = open_gray(&args.input)?;

    info!(
        "classifying with {} trees, window radius {}",
        forest.trees.len(),
        forest.window_radius
    );
    let probabilities = forest.probability_map(&image);

    if let Some(path) = &args.probability_out {
        probabilities
            .to_image()
            .save(path)
            .with_context(|| format!("cannot write probability image to {}", path.display()))?;
    }

    let crf = PixelCrf::build(&image, &probabilities, args.edge_weight)?;
    let labeling = match args.method {
        Method::Maxflow => maxflow::solve(&crf),
        Method::Gibbs => {
            gibbs::solve(&crf, args.gibbs_steps, args.seed.unwrap_or_else(rand::random))
        }
    };

    labeling
        .to_image(forest.colors)
        .save(&args.output)
        .with_context(|| format!("cannot write result to {}", args.output.display()))?;
    info!("labeling written to {}", args.output.display());

    if let Some(path) = &args.ground_truth {
        let truth = Labeling::from_image(&open_gray(path)?, forest.colors);
        let scores = eval::score(&labeling, &truth)?;
        let report = format!(
            "precision = {:.4}\nrecall = {:.4}\nf-measure = {:.4}\n",
            scores.precision, scores.recall, scores.f_measure
        );
        print!("{report}");
        let report_path = args.output.with_extension("scores.txt");
        std::fs::write(&report_path, report)
            .with_context(|| format!("cannot write report to {}", report_path.display()))?;
    }

    Ok(())
}

fn open_gray(path: &Path) -> anyhow::Result<GrayImage> {
    Ok(image::open(path)
        .with_context(|| format!("cannot read image {}", path.display()))?
        .to_luma8())
}

fn ensure_json_extension(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".json");
            PathBuf::from(name)
        }
    }
}
