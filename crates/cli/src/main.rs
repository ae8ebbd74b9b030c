use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use facesync_core::catalog::domain::video_catalog::VideoCatalog;
use facesync_core::catalog::infrastructure::ffmpeg_prober::FfmpegProber;
use facesync_core::catalog::sequence_store::SequenceStore;
use facesync_core::detection::domain::emotion_extractor::EmotionExtractor;
use facesync_core::detection::domain::face_detector::FaceDetector;
use facesync_core::detection::domain::face_embedder::FaceEmbedder;
use facesync_core::detection::infrastructure::model_resolver::{self, ModelResolveError};
use facesync_core::detection::infrastructure::onnx_emotion_extractor::OnnxEmotionExtractor;
use facesync_core::detection::infrastructure::onnx_face_detector::OnnxFaceDetector;
use facesync_core::detection::infrastructure::onnx_face_embedder::OnnxFaceEmbedder;
use facesync_core::layout::sequence_layout::{CatalogMode, SequenceLayout};
use facesync_core::pipeline::pipeline_context::PipelineContext;
use facesync_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facesync_core::pipeline::sequence_pipeline::{Collaborators, FailurePolicy, SequencePipeline};
use facesync_core::pipeline::stage::Stage;
use facesync_core::shared::constants::{
    DETECTOR_MODEL_NAME, EMBEDDING_MODEL_NAME, EMOTION_MODEL_NAME,
};
use facesync_core::shared::settings::{ModelSource, Settings};
use facesync_core::video::infrastructure::ffmpeg_frame_extractor::FfmpegFrameExtractor;
use facesync_core::video::infrastructure::image_file_store::ImageFileStore;

/// Prepares face video datasets: frames, face crops, identities and
/// validated annotations.
#[derive(Parser)]
#[command(name = "facesync")]
struct Cli {
    /// Settings file (JSON). Defaults to the per-user settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Treat ROOT as a single video file instead of a dataset directory.
    #[arg(long)]
    single_video: bool,

    /// Dataset root directory, or a video file with --single-video.
    root: PathBuf,

    /// Output root for all derived artifacts.
    output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Gather the video catalog, or load it if it already exists.
    Prepare,
    /// Extract frames of every sequence.
    Extract,
    /// Detect faces and write crops and landmarks.
    Detect,
    /// Embed face crops and cluster them into identities.
    Recognize {
        /// DBSCAN distance threshold.
        #[arg(long)]
        distance_threshold: Option<f64>,
    },
    /// Extract emotion features per face crop.
    Emotions,
    /// Assign annotation files to identities.
    Resolve {
        /// Distance threshold of the recognition to resolve against.
        #[arg(long)]
        distance_threshold: Option<f64>,
    },
    /// Run every stage in order.
    Run {
        /// Log failing sequences and continue with the next one.
        #[arg(long)]
        keep_going: bool,
    },
    /// Print the artifact directory of one sequence.
    Layout {
        /// Position of the sequence in the catalog.
        index: usize,
        /// Artifact kind, e.g. videos, detections, landmarks, reconstructions.
        kind: String,
        /// Reconstruction method (deca, emoca, deep3dface).
        #[arg(long)]
        method: Option<String>,
        /// Suffix appended to the kind directory.
        #[arg(long)]
        suffix: Option<String>,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    validate(&cli)?;

    let layout = SequenceLayout::new(&cli.output, settings.catalog_mode);
    let store = SequenceStore::new(
        &cli.root,
        &layout,
        &settings.video_extension,
        &settings.annotation_extension,
    );
    let catalog = store.prepare(&FfmpegProber::new())?;

    let (stages, policy) = match &cli.command {
        Command::Prepare => {
            log::info!(
                "Catalog at {} lists {} sequences and {} annotation files",
                layout.catalog_file().display(),
                catalog.len(),
                catalog.annotations.len()
            );
            return Ok(());
        }
        Command::Layout {
            index,
            kind,
            method,
            suffix,
        } => {
            let entry = catalog.entry(*index)?;
            let dir = layout.resolve(
                &entry.relative_path,
                kind,
                method.as_deref(),
                suffix.as_deref(),
            )?;
            println!("{}", dir.display());
            return Ok(());
        }
        Command::Extract => (Stage::Extract.with_prerequisites(), FailurePolicy::Halt),
        Command::Detect => (Stage::Detect.with_prerequisites(), FailurePolicy::Halt),
        Command::Recognize { .. } => (Stage::Recognize.with_prerequisites(), FailurePolicy::Halt),
        Command::Emotions => (Stage::Emotions.with_prerequisites(), FailurePolicy::Halt),
        Command::Resolve { .. } => (Stage::Resolve.with_prerequisites(), FailurePolicy::Halt),
        Command::Run { keep_going } => (
            Stage::ALL.to_vec(),
            if *keep_going {
                FailurePolicy::Continue
            } else {
                FailurePolicy::Halt
            },
        ),
    };

    run_stages(&settings, &layout, &store.catalog_root(), &catalog, &stages, policy)
}

fn run_stages(
    settings: &Settings,
    layout: &SequenceLayout,
    catalog_root: &Path,
    catalog: &VideoCatalog,
    stages: &[Stage],
    policy: FailurePolicy,
) -> Result<(), Box<dyn std::error::Error>> {
    let collaborators = build_collaborators(settings, stages)?;
    let ctx = PipelineContext {
        layout,
        settings,
        catalog_root,
    };
    let mut pipeline = SequencePipeline::new(
        ctx,
        catalog,
        collaborators,
        Box::new(StdoutPipelineLogger::default()),
    );
    let summary = pipeline.run_all(stages, policy)?;
    pipeline.logger().summary();

    if !summary.failures.is_empty() {
        for failure in &summary.failures {
            eprintln!(
                "Sequence {} ({}): {}",
                failure.index,
                failure.video.display(),
                failure.error
            );
        }
        return Err(format!("{} of {} sequences failed", summary.failures.len(), catalog.len()).into());
    }
    Ok(())
}

/// Settings from `--config` or the per-user file, with command-line
/// overrides applied.
fn load_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    if cli.single_video {
        settings.catalog_mode = CatalogMode::SingleVideo;
    }
    match cli.command {
        Command::Recognize {
            distance_threshold: Some(t),
        }
        | Command::Resolve {
            distance_threshold: Some(t),
        } => settings.distance_threshold = t,
        _ => {}
    }
    settings.validate()?;
    Ok(settings)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.root.exists() {
        return Err(format!("Root not found: {}", cli.root.display()).into());
    }
    if cli.single_video && !cli.root.is_file() {
        return Err(format!(
            "--single-video expects a video file, got {}",
            cli.root.display()
        )
        .into());
    }
    if cli.output.exists() && !cli.output.is_dir() {
        return Err(format!(
            "Output root is not a directory: {}",
            cli.output.display()
        )
        .into());
    }
    Ok(())
}

/// Loads only the models the requested stages can use. A model that is
/// neither configured nor cached is left out; stages whose caches exist
/// still run without it.
fn build_collaborators(
    settings: &Settings,
    stages: &[Stage],
) -> Result<Collaborators, Box<dyn std::error::Error>> {
    let detector: Option<Box<dyn FaceDetector>> = if stages.contains(&Stage::Detect) {
        load_model::<dyn FaceDetector>(DETECTOR_MODEL_NAME, &settings.models.detector, |path| {
            Ok(Box::new(OnnxFaceDetector::new(path)?))
        })?
    } else {
        None
    };
    let embedder: Option<Box<dyn FaceEmbedder>> = if stages.contains(&Stage::Recognize) {
        load_model::<dyn FaceEmbedder>(EMBEDDING_MODEL_NAME, &settings.models.embedder, |path| {
            Ok(Box::new(OnnxFaceEmbedder::new(path)?))
        })?
    } else {
        None
    };
    let emotion_extractor: Option<Box<dyn EmotionExtractor>> = if stages.contains(&Stage::Emotions) {
        load_model::<dyn EmotionExtractor>(EMOTION_MODEL_NAME, &settings.models.emotion, |path| {
            Ok(Box::new(OnnxEmotionExtractor::new(path)?))
        })?
    } else {
        None
    };

    Ok(Collaborators {
        frame_extractor: Box::new(FfmpegFrameExtractor::default()),
        detector,
        embedder,
        emotion_extractor,
        images: Box::new(ImageFileStore::new()),
    })
}

fn load_model<T: ?Sized>(
    name: &str,
    source: &ModelSource,
    open: impl FnOnce(&Path) -> Result<Box<T>, Box<dyn std::error::Error>>,
) -> Result<Option<Box<T>>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {name}");
    let progress = name.to_string();
    let path = match model_resolver::resolve(
        name,
        source,
        Some(Box::new(move |downloaded, total| {
            download_progress(&progress, downloaded, total)
        })),
    ) {
        Ok(path) => path,
        Err(ModelResolveError::Unconfigured(_)) => {
            log::warn!("No path or URL configured for {name}; only cached results can be used");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Some(open(&path)?))
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
    if total > 0 && downloaded >= total {
        eprintln!();
    }
}
