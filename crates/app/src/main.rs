use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

use clap::{Args, Parser, Subcommand};
use gonioscope_core::{
    format_time, AnalysisWindow, AppConfig, AudioEngine, BeatDetector, ColorMode, Framebuffer,
    GonioError, HeadlessOutput, ManualClock, Player, RenderMode, SymphoniaDecoder,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod playlist;

use playlist::Playlist;

type HeadlessPlayer = Player<ManualClock, HeadlessOutput>;

fn main() -> gonioscope_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => run_render(args),
        Commands::Analyse {
            input,
            output,
            config,
            fps,
        } => run_analyse(&input, &output, config.as_deref(), fps),
    }
}

fn run_render(args: RenderArgs) -> gonioscope_core::Result<()> {
    let config = apply_overrides(load_config(args.config.as_deref())?, &args)?;
    let frame_interval = frame_interval(args.fps)?;
    let max_frames = args
        .max_seconds
        .map(|seconds| (seconds.max(0.0) * f64::from(args.fps)).ceil() as u64);

    let clock = ManualClock::new();
    let mut frame = Framebuffer::new(args.width, args.height);
    let mut player = match args.seed {
        Some(seed) => Player::with_seed(&config, clock.clone(), HeadlessOutput::new(), &mut frame, seed)?,
        None => Player::new(&config, clock.clone(), HeadlessOutput::new(), &mut frame)?,
    };

    let mut playlist = Playlist::new(args.inputs);
    if playlist.is_empty() {
        return Err(GonioError::InvalidInput("no tracks to render"));
    }
    tracing::info!(tracks = playlist.len(), fps = args.fps, "starting render");

    while let Some(path) = playlist.current().cloned() {
        tracing::info!(
            track = %path.display(),
            number = playlist.index() + 1,
            of = playlist.len(),
            "loading track"
        );
        match load_track(&mut player, &path) {
            Ok(()) => {
                let summary = play_track(&mut player, &clock, &mut frame, frame_interval, max_frames)?;
                tracing::info!(
                    track = %path.display(),
                    frames = summary.frames,
                    beats = summary.beats,
                    reached = %format_time(summary.position),
                    length = %format_time(player.engine().duration()),
                    "track done"
                );
            }
            Err(err) if err.is_recoverable() => {
                tracing::warn!(track = %path.display(), error = %err, "skipping track");
            }
            Err(err) => return Err(err),
        }

        if playlist.advance().is_none() {
            break;
        }
    }

    if let Some(output) = &args.output {
        fs::write(output, frame.to_ppm())?;
        tracing::info!(output = %output.display(), "wrote final frame");
    }
    Ok(())
}

fn load_track(player: &mut HeadlessPlayer, path: &Path) -> gonioscope_core::Result<()> {
    let raw = fs::read(path)?;
    player.load(&SymphoniaDecoder::for_path(path), raw)
}

struct TrackSummary {
    frames: u64,
    beats: u64,
    position: f64,
}

fn play_track(
    player: &mut HeadlessPlayer,
    clock: &ManualClock,
    frame: &mut Framebuffer,
    frame_interval: f64,
    max_frames: Option<u64>,
) -> gonioscope_core::Result<TrackSummary> {
    let mut summary = TrackSummary {
        frames: 0,
        beats: 0,
        position: 0.0,
    };

    player.play()?;
    loop {
        clock.advance(frame_interval);
        let report = player.tick(frame)?;
        summary.position = report.position;
        if report.ended {
            break;
        }

        summary.frames += 1;
        if report.beat {
            summary.beats += 1;
            tracing::debug!(at = %format_time(report.position), "beat");
        }
        if max_frames.is_some_and(|max| summary.frames >= max) {
            player.pause()?;
            break;
        }
    }
    Ok(summary)
}

#[derive(Debug, Serialize)]
struct AnalysisReport {
    input: String,
    sample_rate: u32,
    duration_seconds: f64,
    fps: u32,
    frames: u64,
    beats: Vec<f64>,
}

fn run_analyse(input: &Path, output: &Path, config: Option<&Path>, fps: u32) -> gonioscope_core::Result<()> {
    tracing::info!(?input, ?output, "running offline beat analysis");

    let config = load_config(config)?;
    let frame_interval = frame_interval(fps)?;
    let raw = fs::read(input)?;

    let clock = ManualClock::new();
    let mut engine = AudioEngine::new(
        clock.clone(),
        HeadlessOutput::new(),
        config.analysis.window_size,
        config.transport.initial_volume,
    )?;
    engine.load(&SymphoniaDecoder::for_path(input), raw)?;

    let mut detector = BeatDetector::new(&config.beat);
    let mut window = AnalysisWindow::silent(engine.window_size());
    let mut beats = Vec::new();
    let mut frames = 0u64;

    engine.play()?;
    loop {
        clock.advance(frame_interval);
        if engine.finish_if_ended()? {
            break;
        }
        engine.capture_windows(&mut window);
        if detector.detect(&window.left, &window.right) {
            beats.push(engine.current_position());
        }
        frames += 1;
    }

    let report = AnalysisReport {
        input: input.display().to_string(),
        sample_rate: engine.buffer().map_or(0, |buffer| buffer.sample_rate()),
        duration_seconds: engine.duration(),
        fps,
        frames,
        beats,
    };
    tracing::info!(frames, beats = report.beats.len(), "analysis complete");

    serde_json::to_writer_pretty(BufWriter::new(File::create(output)?), &report)?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> gonioscope_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(config = %path.display(), "loading configuration");
            AppConfig::load(path)
        }
        None => Ok(AppConfig::default()),
    }
}

fn apply_overrides(mut config: AppConfig, args: &RenderArgs) -> gonioscope_core::Result<AppConfig> {
    if let Some(mode) = &args.color_mode {
        config.visual.color_mode = mode.parse::<ColorMode>()?;
    }
    if let Some(mode) = &args.render_mode {
        config.visual.render_mode = mode.parse::<RenderMode>()?;
    }
    if args.particles {
        config.visual.particles_enabled = true;
    }
    if let Some(volume) = args.volume {
        config.transport.initial_volume = volume;
    }
    config.validate()?;
    Ok(config)
}

fn frame_interval(fps: u32) -> gonioscope_core::Result<f64> {
    if fps == 0 {
        return Err(GonioError::InvalidInput("fps must be greater than zero"));
    }
    Ok(1.0 / f64::from(fps))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Stereo phase player and goniometer renderer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a list of tracks headlessly, drawing the goniometer every frame.
    Render(RenderArgs),
    /// Run beat detection over a file and write the timestamps as JSON.
    Analyse {
        /// Audio file to analyse.
        input: PathBuf,
        /// Destination of the JSON report.
        output: PathBuf,
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Simulated frames per second.
        #[arg(long, default_value_t = 60)]
        fps: u32,
    },
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Tracks to play, in order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Optional JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 60)]
    fps: u32,
    #[arg(long, default_value_t = 800)]
    width: u32,
    #[arg(long, default_value_t = 800)]
    height: u32,
    /// Stop each track after this many seconds.
    #[arg(long)]
    max_seconds: Option<f64>,
    /// static, gradient or spectrum.
    #[arg(long)]
    color_mode: Option<String>,
    /// dots or line.
    #[arg(long)]
    render_mode: Option<String>,
    /// Enable the particle layer.
    #[arg(long)]
    particles: bool,
    /// Seed for particle spawning.
    #[arg(long)]
    seed: Option<u64>,
    /// Initial volume in [0, 1].
    #[arg(long)]
    volume: Option<f32>,
    /// Write the last rendered frame here as a binary PPM.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_args(extra: &[&str]) -> RenderArgs {
        let mut argv = vec!["gonioscope", "render", "track.wav"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Render(args) => args,
            Commands::Analyse { .. } => panic!("expected render"),
        }
    }

    #[test]
    fn overrides_replace_configured_modes() {
        let args = render_args(&["--color-mode", "spectrum", "--render-mode", "line", "--particles"]);
        let config = apply_overrides(AppConfig::default(), &args).unwrap();
        assert_eq!(config.visual.color_mode, ColorMode::Spectrum);
        assert_eq!(config.visual.render_mode, RenderMode::Line);
        assert!(config.visual.particles_enabled);
    }

    #[test]
    fn rejects_unknown_mode_and_out_of_range_volume() {
        let args = render_args(&["--color-mode", "plaid"]);
        assert!(apply_overrides(AppConfig::default(), &args).is_err());

        let args = render_args(&["--volume", "1.5"]);
        assert!(apply_overrides(AppConfig::default(), &args).is_err());
    }

    #[test]
    fn zero_fps_is_rejected() {
        assert!(frame_interval(0).is_err());
        assert_eq!(frame_interval(50).unwrap(), 0.02);
    }
}
