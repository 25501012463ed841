use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cricket_highlights::{
    analysis::GoogleVisionOracle,
    assembly::FfmpegEncoder,
    config::Config,
    error::Result,
    pipeline::{HighlightPipeline, PipelineReport},
};

#[derive(Parser)]
#[command(
    name = "cricket-highlights",
    version,
    about = "Cut a highlights reel out of a cricket match recording",
    long_about = "Samples frames from a match video, reads scoreboard text and on-field objects with Google Cloud Vision, and joins a short clip after every score change or piece of action into one highlights video."
)]
struct Cli {
    /// Match video to summarise
    #[arg(short, long)]
    input: PathBuf,

    /// Output video file path
    #[arg(short, long, default_value = "cricket_highlights.mp4")]
    output: PathBuf,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between sampled frames
    #[arg(long)]
    interval: Option<f64>,

    /// Seconds of video kept after each highlight
    #[arg(long)]
    clip_length: Option<f64>,

    /// Merge overlapping clips instead of repeating footage
    #[arg(long)]
    merge_overlaps: bool,

    /// Save every sampled frame as a JPEG in this directory
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Video codec for the output
    #[arg(long)]
    codec: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(config_path) => {
                info!("Loading configuration from {:?}", config_path);
                Config::from_file(config_path)?
            }
            None => {
                info!("Using default configuration");
                Config::default()
            }
        };

        if let Some(interval) = self.interval {
            config.sampling.interval_seconds = interval;
        }
        if let Some(clip_length) = self.clip_length {
            config.assembly.clip_length_seconds = clip_length;
        }
        if self.merge_overlaps {
            config.assembly.merge_overlaps = true;
        }
        if let Some(dir) = &self.frames_dir {
            config.sampling.frames_dir = Some(dir.clone());
        }
        if let Some(codec) = &self.codec {
            config.assembly.codec = codec.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

async fn run(cli: &Cli) -> Result<PipelineReport> {
    let config = cli.load_config()?;

    if !FfmpegEncoder::check_ffmpeg_available() {
        warn!("FFmpeg was not found on PATH; decoding and encoding will fail");
    }

    let oracle = Arc::new(GoogleVisionOracle::from_config(&config.analysis)?);
    let encoder = Arc::new(FfmpegEncoder::new());

    let pipeline = HighlightPipeline::new(config, oracle, encoder);
    pipeline.run(&cli.input, &cli.output).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG takes precedence over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting cricket-highlights v{}", env!("CARGO_PKG_VERSION"));
    info!("Input: {:?}", cli.input);
    info!("Output: {:?}", cli.output);

    match run(&cli).await {
        Ok(report) => {
            info!(
                "Done! {} highlights, {:.1}s of video saved to {:?}",
                report.highlights.len(),
                report.output.duration,
                report.output.path
            );
            if report.analysis_failures > 0 {
                warn!(
                    "{} of {} frames could not be analysed",
                    report.analysis_failures, report.frames_sampled
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) if e.is_no_highlights() => {
            warn!("{}", e.user_message());
            ExitCode::from(e.exit_code())
        }
        Err(e) => {
            let code = e.exit_code();
            let message = e.user_message();
            let report = anyhow::Error::new(e).context(format!("highlights run for {:?} failed", cli.input));
            error!("{:#}", report);
            eprintln!("Error: {}", message);
            ExitCode::from(code)
        }
    }
}
