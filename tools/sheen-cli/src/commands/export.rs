//! Export a recording bundle to video or GIF.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tokio::sync::watch;

use sheen_common::config::{AppConfig, ExportDefaults};
use sheen_project_model::export::{
    AnimatedImageSettings, ExportFormat, ExportSettings, FrameRate, Quality, Resolution,
};
use sheen_project_model::recording::LoadedRecording;
use sheen_render_engine::{
    ExportJob, ExportOrchestrator, ExportOutcome, ExportPhase, ExportStatus, RawRecording,
};

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Path to the bundle directory
    pub path: PathBuf,

    /// Output file path (defaults to <exports_dir>/<name>.<ext>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format: general | archival | gif
    #[arg(long)]
    pub format: Option<ExportFormat>,

    /// Quality tier: low | medium | high | maximum
    #[arg(long)]
    pub quality: Option<Quality>,

    /// Resolution preset: original | 2160p | 1080p | 720p | 480p
    #[arg(long)]
    pub resolution: Option<Resolution>,

    /// Output frame rate: 24 | 30 | 60
    #[arg(long)]
    pub fps: Option<u32>,

    /// Trim start in seconds (overrides the bundle's effects)
    #[arg(long)]
    pub trim_in: Option<f64>,

    /// Trim end in seconds (overrides the bundle's effects)
    #[arg(long)]
    pub trim_out: Option<f64>,

    /// GIF frame rate
    #[arg(long)]
    pub gif_fps: Option<u32>,

    /// GIF palette size (2-256)
    #[arg(long)]
    pub gif_colors: Option<u16>,

    /// GIF loop count (0 loops forever)
    #[arg(long)]
    pub gif_loop: Option<u16>,

    /// Longest GIF edge in pixels
    #[arg(long)]
    pub gif_max_dimension: Option<u32>,
}

pub async fn run(args: ExportArgs, config: &AppConfig) -> anyhow::Result<()> {
    println!("Exporting recording at: {}", args.path.display());

    let bundle = LoadedRecording::load(&args.path)
        .map_err(|e| anyhow::anyhow!("Failed to load recording: {e}"))?;
    let missing = bundle.validate_sources();
    if !missing.is_empty() {
        anyhow::bail!("Recording is incomplete: {}", missing.join("; "));
    }

    let settings = resolve_settings(&args, &config.export)?;
    let destination = args.output.clone().unwrap_or_else(|| {
        config
            .exports_dir
            .join(format!("{}.{}", bundle.manifest.name, settings.format.extension()))
    });

    println!("  Output: {}", destination.display());
    println!("  Format: {:?} ({:?})", settings.format, settings.quality);
    println!("  Resolution: {:?} @ {}fps", settings.resolution, settings.frame_rate);

    let job = ExportJob {
        effects: bundle.effects.clone(),
        settings,
        destination,
    };
    let recording = Arc::new(RawRecording::from_bundle(&bundle));
    let orchestrator = Arc::new(ExportOrchestrator::new());
    let printer = tokio::spawn(print_progress(orchestrator.subscribe()));

    let mut task = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.export(recording, job).await }
    });

    let joined = tokio::select! {
        res = &mut task => res,
        _ = tokio::signal::ctrl_c() => {
            println!("\n  Cancelling...");
            orchestrator.cancel();
            (&mut task).await
        }
    };
    printer.abort();

    match joined.context("export task failed")? {
        Ok(ExportOutcome::Completed(report)) => {
            println!(
                "\nExport complete: {} ({} frames, {:.1}s of media in {:.1}s)",
                report.output.display(),
                report.frames_encoded,
                report.duration_secs,
                report.elapsed_secs()
            );
            Ok(())
        }
        Ok(ExportOutcome::Cancelled) => {
            println!("\nExport cancelled; no file was written.");
            Ok(())
        }
        Err(e) => {
            println!();
            Err(anyhow::anyhow!("Export failed: {e}"))
        }
    }
}

/// Merge command-line flags over the configured defaults.
fn resolve_settings(args: &ExportArgs, defaults: &ExportDefaults) -> anyhow::Result<ExportSettings> {
    let format = match args.format {
        Some(f) => f,
        None => defaults.format.parse().map_err(anyhow::Error::msg)?,
    };
    let quality = match args.quality {
        Some(q) => q,
        None => defaults.quality.parse().map_err(anyhow::Error::msg)?,
    };
    let resolution = match args.resolution {
        Some(r) => r,
        None => defaults.resolution.parse().map_err(anyhow::Error::msg)?,
    };
    let frame_rate = FrameRate::try_from(args.fps.unwrap_or(defaults.fps)).map_err(anyhow::Error::msg)?;

    let animated_image = AnimatedImageSettings {
        target_fps: args.gif_fps.unwrap_or(defaults.gif_fps),
        max_colors: args.gif_colors.unwrap_or(defaults.gif_max_colors),
        loop_count: args.gif_loop.unwrap_or(defaults.gif_loop_count),
        max_dimension: args
            .gif_max_dimension
            .or(AnimatedImageSettings::default().max_dimension),
    };
    if animated_image.target_fps == 0 {
        anyhow::bail!("--gif-fps must be positive");
    }

    Ok(ExportSettings {
        format,
        quality,
        resolution,
        frame_rate,
        trim_in: args.trim_in,
        trim_out: args.trim_out,
        animated_image,
    })
}

async fn print_progress(mut rx: watch::Receiver<ExportStatus>) {
    while rx.changed().await.is_ok() {
        let status = rx.borrow_and_update().clone();
        if !status.phase.is_running() {
            continue;
        }
        let frames = if status.phase == ExportPhase::Rendering {
            format!(" ({}/{} frames, ETA: {:.0}s)", status.frames_rendered, status.total_frames, status.eta_secs)
        } else {
            String::new()
        };
        print!(
            "\r  {:<14} {:>5.1}%{frames}  ",
            status.phase.label(),
            status.progress * 100.0
        );
        let _ = std::io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ExportArgs,
    }

    fn parse(argv: &[&str]) -> ExportArgs {
        Harness::parse_from(std::iter::once("sheen").chain(argv.iter().copied())).args
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = parse(&[
            "bundle",
            "--format",
            "gif",
            "--fps",
            "60",
            "--trim-in",
            "1.5",
            "--gif-colors",
            "32",
        ]);
        let settings = resolve_settings(&args, &ExportDefaults::default()).unwrap();
        assert_eq!(settings.format, ExportFormat::AnimatedImage);
        assert_eq!(settings.frame_rate, FrameRate::Fps60);
        assert_eq!(settings.trim_in, Some(1.5));
        assert_eq!(settings.trim_out, None);
        assert_eq!(settings.animated_image.max_colors, 32);
        assert_eq!(settings.quality, Quality::High);
        assert_eq!(settings.resolution, Resolution::P1080);
    }

    #[test]
    fn test_defaults_come_from_config() {
        let defaults = ExportDefaults {
            format: "archival".to_string(),
            quality: "max".to_string(),
            resolution: "720p".to_string(),
            fps: 24,
            ..ExportDefaults::default()
        };
        let settings = resolve_settings(&parse(&["bundle"]), &defaults).unwrap();
        assert_eq!(settings.format, ExportFormat::Archival);
        assert_eq!(settings.quality, Quality::Maximum);
        assert_eq!(settings.resolution, Resolution::P720);
        assert_eq!(settings.frame_rate, FrameRate::Fps24);
    }

    #[test]
    fn test_unsupported_frame_rate_is_rejected() {
        let args = parse(&["bundle", "--fps", "25"]);
        assert!(resolve_settings(&args, &ExportDefaults::default()).is_err());
    }

    #[test]
    fn test_unknown_format_fails_to_parse() {
        let result = Harness::try_parse_from(["sheen", "bundle", "--format", "webm"]);
        assert!(result.is_err());
    }
}
