//! Show recording bundle information.

use std::path::PathBuf;

use sheen_project_model::recording::LoadedRecording;
use sheen_render_engine::{FfmpegSource, MediaSource};

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let bundle = LoadedRecording::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load recording: {e}"))?;
    let m = &bundle.manifest;

    println!("Recording: {}", m.name);
    println!("  Version: {}", m.version);
    println!("  Created: {}", m.created_at);
    println!(
        "  Capture: {}x{} @ {}fps",
        m.capture_width, m.capture_height, m.fps
    );
    println!();

    println!("Tracks:");
    println!(
        "  Screen: {} ({:.1}s)",
        m.tracks.screen.path, m.tracks.screen.duration_secs
    );
    if let Some(ref t) = m.tracks.webcam {
        println!("  Webcam: {} ({:.1}s)", t.path, t.duration_secs);
    }
    if sheen_render_engine::ffmpeg::is_ffprobe_on_path() {
        match FfmpegSource::new(bundle.screen_path()).describe() {
            Ok(info) => {
                println!(
                    "  Probed: {}x{}, {:.2}s",
                    info.width, info.height, info.duration_secs
                );
                match info.audio {
                    Some((rate, channels)) => println!("  Audio: {rate} Hz, {channels} ch"),
                    None => println!("  Audio: none"),
                }
            }
            Err(e) => println!("  Probe failed: {e}"),
        }
    }
    println!();

    let events = &bundle.events;
    println!("Events:");
    println!("  Cursor samples: {}", events.cursor.len());
    println!("  Clicks: {}", events.clicks().count());
    println!("  Keystrokes: {}", events.keystrokes.len());
    println!("  Caption segments: {}", events.captions.len());
    println!();

    let fx = &bundle.effects;
    println!("Effects:");
    println!("  Background: {:?}", fx.background.kind);
    println!(
        "  Frame: padding {}px, corner radius {}px",
        fx.frame.padding, fx.frame.corner_radius
    );
    println!("  Shadow: {}", on_off(fx.shadow.enabled));
    println!("  Webcam overlay: {}", on_off(fx.webcam.enabled));
    println!("  Cursor: {}", on_off(fx.cursor.enabled));
    println!("  Zoom: {}", on_off(fx.zoom.enabled));
    println!("  Keystrokes: {}", on_off(fx.keystrokes.enabled));
    println!("  Captions: {}", on_off(fx.captions.enabled));
    match (fx.trim.in_secs, fx.trim.out_secs) {
        (None, None) => println!("  Trim: full recording"),
        (a, b) => println!(
            "  Trim: {:.2}s to {}",
            a.unwrap_or(0.0),
            b.map(|s| format!("{s:.2}s")).unwrap_or_else(|| "end".to_string())
        ),
    }

    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
