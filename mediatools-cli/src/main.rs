use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use std::path::{Path, PathBuf};

use mediatools::export::{ExportOptions, Exporter};
use mediatools::session::DEFAULT_BASE_NAME;
use mediatools::video::{ConversionRequest, JobEvent, JobState, PresetKey};
use mediatools::{AppConfig, ExportFormat, ExportScope, ResolutionPreset, Session};

#[derive(Parser)]
#[command(name = "mediatools")]
#[command(about = "Resize and re-export images, convert videos to web-friendly MP4", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true, default_value_t)]
    verbose: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true, default_value_t)]
    quiet: bool,

    /// Store the given options as the new defaults
    #[arg(long, global = true, default_value_t)]
    save_config: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Export one or more images
    Image(ImageArgs),
    /// Convert a video to MP4
    Video(VideoArgs),
}

#[derive(Args)]
struct ImageArgs {
    /// Input images
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// Target width in pixels
    #[arg(long, value_name = "PIXELS")]
    width: Option<String>,

    /// Target height in pixels
    #[arg(long, value_name = "PIXELS")]
    height: Option<String>,

    /// Let width and height change independently
    #[arg(long, default_value_t, conflicts_with = "lock")]
    no_lock: bool,

    /// Keep the aspect ratio locked (undoes a saved --no-lock)
    #[arg(long, default_value_t)]
    lock: bool,

    /// Export format
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Base name for exported files
    #[arg(short, long, value_name = "NAME")]
    name: Option<String>,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// JPEG quality (1-100)
    #[arg(long, value_name = "QUALITY")]
    quality: Option<u8>,

    /// Export every loaded image instead of only the selected one
    #[arg(long, default_value_t)]
    all: bool,

    /// Which loaded image to export, starting at 0
    #[arg(long, value_name = "INDEX")]
    index: Option<usize>,
}

#[derive(Args)]
struct VideoArgs {
    /// Input video
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Quality preset; the main download (medium at --resolution) if omitted
    #[arg(short, long, value_enum)]
    preset: Option<PresetArg>,

    /// Resolution used when the preset keeps the original size
    #[arg(short, long, value_enum)]
    resolution: Option<ResolutionArg>,

    /// Conversion server used when ffmpeg is not installed
    #[arg(long, value_name = "URL")]
    remote_url: Option<String>,

    /// Base name for the converted file
    #[arg(short, long, value_name = "NAME")]
    name: Option<String>,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Png,
    #[value(alias = "jpeg")]
    Jpg,
    Svg,
    Ico,
    Pdf,
    Zip,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => ExportFormat::Png,
            FormatArg::Jpg => ExportFormat::Jpg,
            FormatArg::Svg => ExportFormat::Svg,
            FormatArg::Ico => ExportFormat::Ico,
            FormatArg::Pdf => ExportFormat::Pdf,
            FormatArg::Zip => ExportFormat::Zip,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum PresetArg {
    Minimal,
    Low,
    Medium,
    High,
}

impl From<PresetArg> for PresetKey {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Minimal => PresetKey::Minimal,
            PresetArg::Low => PresetKey::Low,
            PresetArg::Medium => PresetKey::Medium,
            PresetArg::High => PresetKey::High,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ResolutionArg {
    Fullhd,
    Hdplus,
    Hd,
    Sd,
}

impl From<ResolutionArg> for ResolutionPreset {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::Fullhd => ResolutionPreset::FullHd,
            ResolutionArg::Hdplus => ResolutionPreset::HdPlus,
            ResolutionArg::Hd => ResolutionPreset::Hd,
            ResolutionArg::Sd => ResolutionPreset::Sd,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = AppConfig::load().unwrap_or_default();

    match &cli.command {
        Command::Image(args) => export_images(args, &mut config)?,
        Command::Video(args) => convert_video(args, &mut config)?,
    }

    if cli.save_config {
        match config.save() {
            Some(()) => log::info!("Saved defaults"),
            None => log::warn!("Could not save config"),
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn prepare_output_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).context("Failed to create output directory")?;
    }
    Ok(())
}

fn export_images(args: &ImageArgs, config: &mut AppConfig) -> Result<()> {
    for file in &args.files {
        if !file.exists() {
            anyhow::bail!("Input file does not exist: {}", file.display());
        }
    }
    prepare_output_dir(&args.output_dir)?;
    apply_image_flags(args, config)?;

    let images = mediatools::image::load_batch(&args.files);
    if images.is_empty() {
        anyhow::bail!("None of the input files could be decoded");
    }
    log::info!("Loaded {} of {} images", images.len(), args.files.len());
    for image in &images {
        log::info!(
            "  {} {}x{} {} {}",
            image.file_name,
            image.width,
            image.height,
            image.display_size(),
            image.device_label
        );
    }

    let mut session = Session::new(images);
    if let Some(index) = args.index {
        if !session.select(index) {
            anyhow::bail!("Index {index} is out of range ({} images)", session.len());
        }
    }

    // the first image's stem wins over an unchanged default name
    if args.name.is_some() || config.base_name != DEFAULT_BASE_NAME {
        session.set_base_name(&config.base_name);
    }

    session.set_locked(config.lock_ratio);
    if let Some(width) = &args.width {
        session.set_width(width).context("Invalid --width")?;
    }
    if let Some(height) = &args.height {
        if args.width.is_some() && session.dimensions().is_locked() {
            log::warn!("Ignoring --height: ratio is locked and --width was given");
        } else {
            session.set_height(height).context("Invalid --height")?;
        }
    }

    let scope = if args.all {
        ExportScope::All
    } else {
        ExportScope::Current
    };
    let mut options = ExportOptions::new(config.export_format).with_scope(scope);
    options.jpeg_quality = config.jpeg_quality;

    let outputs = Exporter::default()
        .export(&session, &options)
        .context("Export failed")?;

    for output in &outputs {
        let path = output
            .write_to(&args.output_dir)
            .with_context(|| format!("Failed to write {}", output.file_name))?;
        log::info!("Done: {}", path.display());
    }

    Ok(())
}

// Flags become the config that is saved with --save-config.
fn apply_image_flags(args: &ImageArgs, config: &mut AppConfig) -> Result<()> {
    if let Some(format) = args.format {
        config.export_format = format.into();
    }
    if let Some(quality) = args.quality {
        if !(1..=100).contains(&quality) {
            anyhow::bail!("Quality must be between 1 and 100");
        }
        config.jpeg_quality = quality;
    }
    if let Some(name) = &args.name {
        config.base_name = name.clone();
    }
    if args.no_lock {
        config.lock_ratio = false;
    }
    if args.lock {
        config.lock_ratio = true;
    }

    Ok(())
}

fn convert_video(args: &VideoArgs, config: &mut AppConfig) -> Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }
    prepare_output_dir(&args.output_dir)?;

    if let Some(preset) = args.preset {
        config.video_preset = Some(preset.into());
    }
    if let Some(resolution) = args.resolution {
        config.resolution = resolution.into();
    }
    if let Some(url) = &args.remote_url {
        config.remote_endpoint = url.clone();
    }

    let request = match config.video_preset {
        Some(key) => ConversionRequest::new(key, config.resolution),
        None => ConversionRequest::main_download(config.resolution),
    };

    let name = args.name.clone().unwrap_or_else(|| {
        args.input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("video")
            .to_string()
    });
    let output_path = args.output_dir.join(format!("{name}.mp4"));

    let transcoder = mediatools::video::select_transcoder(&config.remote_endpoint)?;
    log::info!(
        "Converting: `{}` with the {} preset via {}",
        args.input.display(),
        request.preset.key.as_str(),
        transcoder.name()
    );

    let (stream, handle) = mediatools::video::spawn(transcoder, args.input.clone(), request);
    let mut last_percent = -1.0;
    for event in stream {
        match event {
            JobEvent::State(JobState::Uploading) => log::info!("Uploading..."),
            JobEvent::State(JobState::Converting { percent, eta }) => {
                // one line per whole percent
                if percent.floor() > last_percent {
                    last_percent = percent.floor();
                    match eta {
                        Some(eta) => log::info!("{percent:.0}% (~{}s left)", eta.as_secs()),
                        None => log::info!("{percent:.0}%"),
                    }
                }
            }
            JobEvent::State(JobState::Failed { message }) => log::error!("{message}"),
            JobEvent::State(_) => {}
            JobEvent::Log(line) => log::debug!("{line}"),
        }
    }

    let bytes = handle
        .join()
        .map_err(|_| anyhow::anyhow!("Conversion thread panicked"))?
        .context("Video conversion failed")?;

    std::fs::write(&output_path, bytes).context("Failed to write output file")?;
    log::info!("Done: {}", output_path.display());

    Ok(())
}
