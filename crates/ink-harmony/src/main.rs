//! ink-harmony: command-line front end for the ink compositing pipeline.
//!
//! Renders an uploaded photo as black ink over a chosen paper background
//! and writes the download artifact, or lists the backgrounds available
//! for an image.
//!
//! # Usage
//!
//! ```text
//! ink-harmony render photo.jpg --background rice --threshold 110
//! ink-harmony backgrounds photo.jpg --assets ./public --json
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use ink_harmony_io::{BackgroundLibrary, Discovery, FsProber, PreviewRequest};
use ink_harmony_pipeline::{
    BackgroundKind, CatalogConfig, PipelineConfig, PipelineError, RenderMode, Session, Threshold,
};
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

/// Turn photographed calligraphy into black ink on paper.
#[derive(Parser)]
#[command(name = "ink-harmony", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render an image and write the result.
    Render(RenderArgs),
    /// List the background options offered for an image.
    Backgrounds(BackgroundsArgs),
}

/// Options shared by every subcommand.
#[derive(Args)]
struct SourceArgs {
    /// Path to the input image (PNG or JPEG).
    image_path: PathBuf,

    /// Directory background resources are resolved against.
    #[arg(long, default_value = ".")]
    assets: PathBuf,

    /// Background catalog as a JSON file.
    ///
    /// When omitted, the built-in catalog is used.
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[derive(Args)]
struct RenderArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Luminance threshold (0-255). Darker pixels become ink.
    #[arg(long, default_value_t = u32::from(Threshold::DEFAULT.get()))]
    threshold: u32,

    /// Background key (see the `backgrounds` subcommand).
    #[arg(long, default_value = "original")]
    background: String,

    /// Render mode. Only final renders are written as JPEG downloads;
    /// realtime renders are written as PNG previews.
    #[arg(long, value_enum, default_value_t = Mode::Final)]
    mode: Mode,

    /// Output path. Defaults to the download name in the current
    /// directory (final mode only).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = ink_harmony_export::DEFAULT_JPEG_QUALITY)]
    quality: u8,

    /// Full pipeline config as a JSON string.
    ///
    /// The JSON must be a valid `PipelineConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

impl RenderArgs {
    fn threshold(&self) -> Result<Threshold, PipelineError> {
        Threshold::try_from(self.threshold)
    }
}

#[derive(Args)]
struct BackgroundsArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output the option list as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Native resolution, noise suppression always on.
    Final,
    /// Downscaled preview path.
    Realtime,
}

impl From<Mode> for RenderMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Final => Self::Final,
            Mode::Realtime => Self::Realtime,
        }
    }
}

/// Errors reported by the CLI.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("error reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error writing {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error parsing {what}: {source}")]
    Json {
        what: &'static str,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Export(#[from] ink_harmony_export::ExportError),

    #[error("error saving preview: {0}")]
    Preview(#[from] image::ImageError),

    #[error("realtime renders need an explicit --output path")]
    PreviewNeedsOutput,

    #[error("invalid log filter: {0}")]
    LogFilter(String),
}

fn init_tracing(verbosity: u8) -> Result<(), CliError> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let mut filter = EnvFilter::from_default_env();
    for krate in ["ink_harmony", "ink_harmony_pipeline", "ink_harmony_io"] {
        let directive = format!("{krate}={level}")
            .parse()
            .map_err(|e| CliError::LogFilter(format!("{e}")))?;
        filter = filter.add_directive(directive);
    }
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Command::Render(args) => render(args).await,
        Command::Backgrounds(args) => backgrounds(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn load_catalog(path: Option<&Path>) -> Result<CatalogConfig, CliError> {
    let Some(path) = path else {
        return Ok(CatalogConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        what: "--catalog",
        source,
    })
}

fn load_config(json: Option<&str>) -> Result<PipelineConfig, CliError> {
    json.map_or_else(
        || Ok(PipelineConfig::default()),
        |json| {
            serde_json::from_str(json).map_err(|source| CliError::Json {
                what: "--config-json",
                source,
            })
        },
    )
}

/// Load the image into a session and run background discovery for it.
async fn open_session(
    source: &SourceArgs,
    config: PipelineConfig,
) -> Result<(Session, Discovery), CliError> {
    let catalog = load_catalog(source.catalog.as_deref())?;
    let bytes = std::fs::read(&source.image_path).map_err(|e| CliError::Read {
        path: source.image_path.clone(),
        source: e,
    })?;

    let mut session = Session::new(config, catalog);
    let aspect = session.load_bytes(&bytes)?;
    tracing::info!(
        image = %source.image_path.display(),
        bytes = bytes.len(),
        %aspect,
        "loaded image"
    );

    let library = BackgroundLibrary::new(FsProber::new(&source.assets));
    let discovery = library.discover(session.catalog(), aspect).await;
    if discovery.options.discovery_exhausted() {
        tracing::warn!(
            assets = %source.assets.display(),
            "no background textures found, offering fallback entries"
        );
    }
    session.set_options(discovery.options.clone());
    Ok((session, discovery))
}

async fn render(args: RenderArgs) -> Result<(), CliError> {
    let threshold = args.threshold()?;
    let config = load_config(args.config_json.as_deref())?;
    let (mut session, discovery) = open_session(&args.source, config).await?;
    session.select(&args.background)?;

    match args.mode {
        Mode::Final => {
            let rendered =
                ink_harmony_io::render_final(session.snapshot(), threshold, discovery.images)
                    .await?;
            let file = ink_harmony_export::export(&rendered, args.quality, unix_millis())?;
            let path = args.output.unwrap_or_else(|| PathBuf::from(&file.filename));
            std::fs::write(&path, &file.bytes).map_err(|source| CliError::Write {
                path: path.clone(),
                source,
            })?;
            eprintln!(
                "Wrote {} ({} bytes, background {})",
                path.display(),
                file.bytes.len(),
                rendered.background_key,
            );
        }
        Mode::Realtime => {
            let path = args.output.ok_or(CliError::PreviewNeedsOutput)?;
            let (handle, mut frames) = ink_harmony_io::preview::spawn(
                ink_harmony_io::preview::DEFAULT_DEBOUNCE,
            );
            handle.request(PreviewRequest {
                snapshot: session.snapshot(),
                threshold,
                images: discovery.images,
            })?;
            handle.shutdown().await;

            let frame = frames.borrow_and_update().clone();
            let Some(frame) = frame else {
                // The realtime path never surfaces its own failures; rerun
                // in final mode to report what went wrong.
                let err = session
                    .run(threshold, RenderMode::Final, &ink_harmony_pipeline::NoBackgroundImages)
                    .err()
                    .unwrap_or(PipelineError::NotReady(
                        ink_harmony_pipeline::NotReadyReason::BackendUnavailable,
                    ));
                return Err(err.into());
            };
            frame
                .rendered
                .image
                .save_with_format(&path, image::ImageFormat::Png)?;
            eprintln!("Wrote preview {}", path.display());
        }
    }
    Ok(())
}

async fn backgrounds(args: BackgroundsArgs) -> Result<(), CliError> {
    let (session, _discovery) = open_session(&args.source, PipelineConfig::default()).await?;
    let options = Arc::clone(session.options());

    if args.json {
        let json = serde_json::to_string_pretty(options.as_ref()).map_err(|source| {
            CliError::Json {
                what: "option list",
                source,
            }
        })?;
        println!("{json}");
        return Ok(());
    }

    println!("{:<16} {:<20} Source", "Key", "Name");
    println!("{}", "-".repeat(60));
    for option in options.iter() {
        let source = match &option.kind {
            BackgroundKind::Original => "uploaded image".to_owned(),
            BackgroundKind::SolidColor { color } => color.to_string(),
            BackgroundKind::Image { path } => path.clone(),
        };
        println!("{:<16} {:<20} {source}", option.key, option.display_name);
    }
    if options.discovery_exhausted() {
        println!();
        println!("(no textures found under the assets directory; showing fallbacks)");
    }
    Ok(())
}

/// Milliseconds since the Unix epoch, for download names.
fn unix_millis() -> u128 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;
    use ink_harmony_pipeline::DenoiseKind;

    use super::*;

    fn parse_render(args: &[&str]) -> RenderArgs {
        let cli = Cli::try_parse_from(
            ["ink-harmony", "render", "photo.jpg"].iter().chain(args).copied(),
        )
        .unwrap();
        match cli.command {
            Command::Render(args) => args,
            Command::Backgrounds(_) => unreachable!("parsed a render command"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn render_defaults() {
        let args = parse_render(&[]);
        assert_eq!(args.threshold().unwrap(), Threshold::DEFAULT);
        assert_eq!(args.background, "original");
        assert!(matches!(args.mode, Mode::Final));
        assert_eq!(args.quality, ink_harmony_export::DEFAULT_JPEG_QUALITY);
        assert_eq!(args.source.assets, PathBuf::from("."));
    }

    #[test]
    fn threshold_above_255_is_rejected() {
        let args = parse_render(&["--threshold", "256"]);
        assert!(matches!(
            args.threshold(),
            Err(PipelineError::InvalidThreshold(256))
        ));
        assert_eq!(parse_render(&["--threshold", "255"]).threshold().unwrap().get(), 255);
    }

    #[test]
    fn negative_threshold_fails_to_parse() {
        assert!(
            Cli::try_parse_from(["ink-harmony", "render", "photo.jpg", "--threshold", "-1"])
                .is_err()
        );
    }

    #[test]
    fn verbosity_is_counted_after_subcommand() {
        let cli = Cli::try_parse_from(["ink-harmony", "backgrounds", "photo.jpg", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn realtime_mode_parses() {
        let args = parse_render(&["--mode", "realtime", "-o", "preview.png"]);
        assert_eq!(RenderMode::from(args.mode), RenderMode::Realtime);
        assert_eq!(args.output, Some(PathBuf::from("preview.png")));
    }

    #[test]
    fn partial_config_json_keeps_other_defaults() {
        let config = load_config(Some(r#"{"realtime_denoise": false}"#)).unwrap();
        assert!(!config.realtime_denoise);
        assert_eq!(
            config.realtime_max_dimension,
            Some(PipelineConfig::DEFAULT_REALTIME_MAX_DIMENSION)
        );
        assert_eq!(config.denoise, DenoiseKind::Block2x2);
    }

    #[test]
    fn missing_config_json_is_default() {
        assert_eq!(load_config(None).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn malformed_config_json_is_reported() {
        let err = load_config(Some("{not json")).unwrap_err();
        assert!(matches!(err, CliError::Json { what: "--config-json", .. }));
    }

    #[test]
    fn missing_catalog_file_is_a_read_error() {
        let err = load_catalog(Some(Path::new("/nonexistent/catalog.json"))).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
    }
}
