//! Seed a bundle with the default effects configuration.

use std::path::PathBuf;

use sheen_project_model::effects::EffectsConfiguration;
use sheen_project_model::recording::{LoadedRecording, EFFECTS_FILE};

pub fn run(path: PathBuf, force: bool) -> anyhow::Result<()> {
    let mut bundle = LoadedRecording::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load recording: {e}"))?;

    let target = bundle.meta_dir().join(EFFECTS_FILE);
    if target.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            target.display()
        );
    }

    bundle.effects = EffectsConfiguration::default();
    let written = bundle
        .save_effects()
        .map_err(|e| anyhow::anyhow!("Failed to write effects: {e}"))?;
    tracing::info!(path = %written.display(), "Wrote default effects");

    println!("Wrote default style to {}", written.display());
    println!("Edit it to change the background, padding, zoom and overlays.");
    Ok(())
}
