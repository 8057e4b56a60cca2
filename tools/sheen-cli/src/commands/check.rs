//! Check that external encoder tools are available.

use sheen_render_engine::ffmpeg::{is_ffmpeg_on_path, is_ffprobe_on_path};

pub fn run() -> anyhow::Result<()> {
    println!("Sheen System Check");
    println!("{}", "=".repeat(50));

    let ffmpeg = is_ffmpeg_on_path();
    let ffprobe = is_ffprobe_on_path();
    report("ffmpeg", ffmpeg, "required for MP4/MOV export and file sources");
    report("ffprobe", ffprobe, "required to read recording media");
    println!("[OK] GIF encoder: built in");

    println!();
    if ffmpeg && ffprobe {
        println!("All required tools are available. Sheen is ready.");
    } else {
        println!("Some tools are missing. Install ffmpeg and make sure it is on PATH.");
    }

    Ok(())
}

fn report(tool: &str, available: bool, why: &str) {
    if available {
        println!("[OK] {tool}");
    } else {
        println!("[MISSING] {tool} ({why})");
    }
}
