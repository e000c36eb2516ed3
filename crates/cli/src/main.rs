use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use facecrop_core::detection::infrastructure::face_finder_factory::create_face_finder;
use facecrop_core::normalization::domain::geom_normalizer::GeomNormalizer;
use facecrop_core::normalization::infrastructure::ground_truth_file::GroundTruthFile;
use facecrop_core::params::face_finder_params::FaceFinderParams;
use facecrop_core::params::geom_norm_params::GeomNormParams;
use facecrop_core::pipeline::crop_faces_use_case::{CropFacesUseCase, PatternSource};
use facecrop_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facecrop_core::shared::constants::{IMAGE_EXTENSIONS, MANIFEST_FILE_NAME};
use facecrop_core::video::domain::video_reader::VideoReader;
use facecrop_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use facecrop_core::video::infrastructure::image_file_reader::ImageFileReader;
use facecrop_core::video::infrastructure::image_file_writer::ImageFileWriter;

/// Find faces in a video (or image) and write geometrically normalized crops.
#[derive(Parser)]
#[command(name = "facecrop", version)]
struct Cli {
    /// Input video or image file.
    input: PathBuf,

    /// Face finder parameter file (*.params).
    #[arg(long)]
    finder: Option<PathBuf>,

    /// Geometric normalization parameter file (*.cfg).
    #[arg(long)]
    geom_norm: PathBuf,

    /// Directory receiving frameNNNNN_faceKK.png crops.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Landmark annotations (frame x0 y0 x1 y1 ...) used instead of the face finder.
    #[arg(long)]
    annotations: Option<PathBuf>,

    /// Also write manifest.json describing every crop.
    #[arg(long)]
    manifest: bool,

    /// Print the effective parameters and exit.
    #[arg(long)]
    dump_params: bool,

    /// Log every pattern.
    #[arg(long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.debug { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(level));

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    validate(&cli)?;

    let finder_params = match &cli.finder {
        Some(path) => FaceFinderParams::load(path)?,
        None => FaceFinderParams::default(),
    };
    let geom_params = GeomNormParams::load(&cli.geom_norm)?;

    if cli.dump_params {
        println!("# --- face finder ---");
        print!("{}", finder_params.to_parameter_set()?);
        println!("# --- geometric normalization ---");
        print!("{}", geom_params.to_parameter_set()?);
        return Ok(());
    }

    let output = cli
        .output
        .as_deref()
        .ok_or("--output is required unless --dump-params is given")?;
    let source = build_pattern_source(&cli, &finder_params)?;

    let mut reader = open_reader(&cli.input);
    let metadata = reader.open(&cli.input)?;
    log::info!(
        "Input {}: {}x{}, {} frames",
        cli.input.display(),
        metadata.width,
        metadata.height,
        metadata.total_frames
    );

    let mut use_case = CropFacesUseCase::new(
        reader,
        source,
        GeomNormalizer::new(geom_params),
        Box::new(ImageFileWriter::new()),
        Box::new(StdoutPipelineLogger::default()),
        None,
        None,
    );
    let report = use_case.execute(&metadata, output, cli.max_frames)?;

    if cli.manifest {
        let path = output.join(MANIFEST_FILE_NAME);
        report.write_manifest(&path)?;
        log::info!("Manifest written to {}", path.display());
    }
    log::info!(
        "{} crops written to {}, {} of {} frames skipped",
        report.crops.len(),
        output.display(),
        report.frames_skipped,
        report.frames_read
    );
    Ok(())
}

fn build_pattern_source(
    cli: &Cli,
    finder_params: &FaceFinderParams,
) -> Result<PatternSource, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.annotations {
        if cli.finder.is_some() {
            log::warn!("--annotations given; ignoring --finder");
        }
        return Ok(PatternSource::Annotations(GroundTruthFile::load(path)?));
    }
    let detector = create_face_finder(finder_params, Some(Box::new(download_progress)))?;
    Ok(PatternSource::Detector(detector))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if cli.max_frames == Some(0) {
        return Err("--max-frames must be at least 1".into());
    }
    if cli.dump_params {
        return Ok(());
    }
    if cli.finder.is_none() && cli.annotations.is_none() {
        return Err("--finder is required unless --annotations is given".into());
    }
    if cli.output.is_none() {
        return Err("--output is required".into());
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn open_reader(input: &Path) -> Box<dyn VideoReader> {
    if is_image(input) {
        Box::new(ImageFileReader::new())
    } else {
        Box::new(FfmpegReader::new())
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading face model... {downloaded} bytes");
    }
}
