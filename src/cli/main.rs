//! Car dataset CLI
//!
//! Subcommands cover the whole dataset lifecycle: download, annotate,
//! flatten labels and inspect class balance.

use super::config::CliConfigBuilder;
use super::progress::CliProgressReporter;
use crate::{
    labels::{class_distribution, flatten_labels},
    layout::{DatasetLayout, Split},
    orchestrator::{AcquisitionOrchestrator, AcquisitionReport},
    services::TracingProgressReporter,
    tracing_config::{init_cli_tracing, spans, TracingFormat, TracingOutput},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{info, Instrument};

/// Build a labelled car image dataset
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "car-dataset")]
pub struct Cli {
    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON configuration file (missing fields use defaults)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Console, global = true)]
    pub log_format: LogFormat,

    /// Append log lines to this file instead of stderr
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log line formats accepted by `--log-format`
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Console,
    Compact,
    /// Needs the `tracing-json` feature
    Json,
}

impl Cli {
    /// Resolve the logging flags against the compiled-in features
    pub fn tracing_target(&self) -> Result<(TracingFormat, TracingOutput)> {
        let format = match self.log_format {
            LogFormat::Console => TracingFormat::Console,
            LogFormat::Compact => TracingFormat::Compact,
            #[cfg(feature = "tracing-json")]
            LogFormat::Json => TracingFormat::Json,
            #[cfg(not(feature = "tracing-json"))]
            LogFormat::Json => {
                anyhow::bail!("--log-format json requires the 'tracing-json' feature")
            },
        };

        let output = match &self.log_file {
            None => TracingOutput::Console,
            #[cfg(feature = "tracing-files")]
            Some(path) => TracingOutput::File(path.clone()),
            #[cfg(not(feature = "tracing-files"))]
            Some(_) => anyhow::bail!("--log-file requires the 'tracing-files' feature"),
        };

        Ok((format, output))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search, download and split images for each subject
    Download(DownloadArgs),
    /// Write YOLO labels for downloaded images with a detector model
    #[cfg(feature = "onnx")]
    Annotate(AnnotateArgs),
    /// Run a detector on individual images and print the detections
    #[cfg(feature = "onnx")]
    Predict(PredictArgs),
    /// Merge per-class label directories into one directory per split
    Flatten(FlattenArgs),
    /// Count labelled boxes per class
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Dataset root directory
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Subject to acquire (repeatable; replaces the configured list)
    #[arg(long, value_name = "NAME")]
    pub subject: Vec<String>,

    /// Fraction of each subject's images routed to train
    #[arg(long)]
    pub train_fraction: Option<f64>,

    /// Locators requested per query
    #[arg(long)]
    pub images_per_query: Option<usize>,

    /// Upper bound on queries per subject
    #[arg(long)]
    pub queries_per_subject: Option<usize>,

    /// Shuffle locators with this seed before splitting
    #[arg(long, value_name = "SEED")]
    pub shuffle_seed: Option<u64>,

    /// Log progress lines instead of drawing a progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[cfg(feature = "onnx")]
#[derive(Args, Debug)]
pub struct AnnotateArgs {
    /// YOLOv8 ONNX model
    #[arg(long, value_name = "FILE")]
    pub model: PathBuf,

    /// Dataset root directory
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Minimum detection confidence
    #[arg(long)]
    pub confidence: Option<f32>,
}

#[cfg(feature = "onnx")]
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// YOLOv8 ONNX model
    #[arg(long, value_name = "FILE")]
    pub model: PathBuf,

    /// Images to run detection on
    #[arg(value_name = "IMAGES", required = true)]
    pub images: Vec<PathBuf>,

    /// Minimum detection confidence
    #[arg(long)]
    pub confidence: Option<f32>,
}

#[derive(Args, Debug)]
pub struct FlattenArgs {
    /// Dataset root directory
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Output directory [default: <root>/labels_flat]
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Dataset root directory
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Only count this split (train or val)
    #[arg(long)]
    pub split: Option<Split>,

    /// Count the flattened label tree instead of the per-class one
    #[arg(long)]
    pub flat: bool,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (format, output) = cli.tracing_target()?;
    init_cli_tracing(cli.verbose, format, output).context("Failed to initialize tracing")?;

    match &cli.command {
        Command::Download(args) => download(&cli, args).await,
        #[cfg(feature = "onnx")]
        Command::Annotate(args) => annotate(&cli, args).await,
        #[cfg(feature = "onnx")]
        Command::Predict(args) => predict(args).await,
        Command::Flatten(args) => flatten(&cli, args),
        Command::Stats(args) => stats(&cli, args),
    }
}

/// Dataset root from the flag, falling back to the configuration
fn resolve_root(cli: &Cli, root: Option<&PathBuf>) -> Result<PathBuf> {
    match root {
        Some(root) => Ok(root.clone()),
        None => Ok(CliConfigBuilder::base_config(cli.config.as_deref())?.dataset_root),
    }
}

async fn download(cli: &Cli, args: &DownloadArgs) -> Result<()> {
    let config = CliConfigBuilder::acquisition_config(cli.config.as_deref(), args)?;
    let span = spans::acquisition(&config.dataset_root, config.subjects.len());

    let progress = (!args.no_progress).then(CliProgressReporter::new);
    let mut builder = AcquisitionOrchestrator::builder(config);
    builder = match &progress {
        Some(reporter) => builder.reporter(Box::new(reporter.clone())),
        None => builder.reporter(Box::new(TracingProgressReporter)),
    };
    let orchestrator = builder.build().context("Failed to set up acquisition")?;

    let result = orchestrator.run().instrument(span).await;
    if let Some(reporter) = &progress {
        reporter.bar().finish_and_clear();
    }
    let report = result.context("Acquisition failed")?;

    print_acquisition_report(&report);
    Ok(())
}

fn print_acquisition_report(report: &AcquisitionReport) {
    println!("📊 Acquisition summary");
    for subject in &report.subjects {
        println!(
            "  • {}: {} train, {} val ({} candidates, {} skipped)",
            subject.subject,
            subject.train_saved,
            subject.val_saved,
            subject.locators,
            subject.skipped_total()
        );
        for (kind, count) in &subject.skipped {
            println!("      └─ {kind}: {count}");
        }
    }
    println!(
        "✅ Saved {} image(s), skipped {} in {:.1}s",
        report.total_saved(),
        report.total_skipped(),
        report.elapsed_secs
    );
}

#[cfg(feature = "onnx")]
async fn annotate(cli: &Cli, args: &AnnotateArgs) -> Result<()> {
    use crate::annotate::{Annotator, ClassMap, YoloDetector};

    let base = CliConfigBuilder::base_config(cli.config.as_deref())?;
    let root = args.root.clone().unwrap_or_else(|| base.dataset_root.clone());
    let classes = ClassMap::from_subjects(&base.subject_list());
    let annotation = CliConfigBuilder::annotation_config(args.confidence)?;

    let span = spans::annotation(&root, &args.model);
    let model = args.model.clone();
    let layout = DatasetLayout::new(root);

    let summary = tokio::task::spawn_blocking(move || -> Result<_> {
        let _guard = span.enter();
        let detector = YoloDetector::from_file(&model)
            .with_context(|| format!("Failed to load model {}", model.display()))?;
        let mut annotator = Annotator::new(detector, classes, annotation)?;
        Ok(annotator.annotate_dataset(&layout)?)
    })
    .await
    .context("Annotation task panicked")??;

    println!(
        "✅ Annotated {} image(s): {} label file(s), {} box(es)",
        summary.images, summary.label_files, summary.boxes
    );
    if summary.skipped_images > 0 || summary.skipped_dirs > 0 {
        println!(
            "⚠️  Skipped {} unreadable image(s) and {} unknown class director(ies)",
            summary.skipped_images, summary.skipped_dirs
        );
    }
    Ok(())
}

#[cfg(feature = "onnx")]
async fn predict(args: &PredictArgs) -> Result<()> {
    use crate::annotate::{describe_detections, Detector, YoloDetector};
    use crate::services::ImageIOService;

    let annotation = CliConfigBuilder::annotation_config(args.confidence)?;
    let mut detector = YoloDetector::from_file(&args.model)
        .with_context(|| format!("Failed to load model {}", args.model.display()))?;
    let images = args.images.clone();

    tokio::task::spawn_blocking(move || -> Result<()> {
        for path in &images {
            let image = ImageIOService::load_image(path)?;
            let detections = detector.detect(&image, annotation.confidence_threshold)?;
            println!("🔍 {} ({} detection(s))", path.display(), detections.len());
            print!("{}", describe_detections(&detections));
        }
        Ok(())
    })
    .await
    .context("Prediction task panicked")?
}

fn flatten(cli: &Cli, args: &FlattenArgs) -> Result<()> {
    let root = resolve_root(cli, args.root.as_ref())?;
    let layout = DatasetLayout::new(&root);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| root.join("labels_flat"));

    let summary = flatten_labels(&layout.labels_dir(), &output)?;
    info!(output = %output.display(), "Flatten finished");
    println!(
        "✅ Copied {} label file(s) into {}",
        summary.copied,
        output.display()
    );
    if summary.overwritten > 0 {
        println!("⚠️  {} file(s) overwritten by name collisions", summary.overwritten);
    }
    Ok(())
}

fn stats(cli: &Cli, args: &StatsArgs) -> Result<()> {
    let base = CliConfigBuilder::base_config(cli.config.as_deref())?;
    let root = args.root.clone().unwrap_or_else(|| base.dataset_root.clone());
    let labels_root = if args.flat {
        root.join("labels_flat")
    } else {
        DatasetLayout::new(&root).labels_dir()
    };
    let subjects = base.subject_list();
    let splits: Vec<Split> = match args.split {
        Some(split) => vec![split],
        None => Split::ALL.to_vec(),
    };

    for split in splits {
        let dir = labels_root.join(split.as_str());
        let counts = class_distribution(&dir)?;
        println!("📋 {split} ({})", dir.display());
        if counts.is_empty() {
            println!("  (no labels)");
            continue;
        }
        for (class_id, count) in &counts {
            let name = subjects
                .get(*class_id as usize)
                .map_or("unknown", |s| s.name());
            println!("  {class_id:>3} {name:<28} {count}");
        }
    }
    Ok(())
}
