//! Validate a Sheen recording bundle.

use std::path::PathBuf;

use sheen_project_model::recording::LoadedRecording;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating recording at: {}", path.display());

    let bundle = LoadedRecording::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load recording: {e}"))?;

    println!("  Name: {}", bundle.manifest.name);
    println!("  Version: {}", bundle.manifest.version);
    println!(
        "  Capture: {}x{}",
        bundle.manifest.capture_width, bundle.manifest.capture_height
    );
    println!("  Cursor samples: {}", bundle.events.cursor.len());

    let mut issues = bundle.validate_sources();
    let trim = &bundle.effects.trim;
    if let (Some(a), Some(b)) = (trim.in_secs, trim.out_secs) {
        if b <= a {
            issues.push(format!("Trim window is empty: {a:.2}s to {b:.2}s"));
        }
    }

    if issues.is_empty() {
        println!("  Sources: All present");
        println!("\nRecording is valid.");
        Ok(())
    } else {
        println!("\nValidation issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
        anyhow::bail!("{} issue(s) found", issues.len())
    }
}
