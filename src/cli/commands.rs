//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context};
use log::{info, warn};

use crate::cli::ControlArgs;
use crate::config::EngineConfig;
use crate::engine::{io, linear_to_db, Engine};
use crate::params::ParameterSet;
use crate::presets::PresetStore;

/// Load the configuration file, or defaults when none is given
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Resolve `--preset` and `--set` into one parameter set
pub fn resolve_controls(controls: &ControlArgs) -> anyhow::Result<ParameterSet> {
    let store = PresetStore::builtin();
    let mut params = match &controls.preset {
        Some(name) => {
            store
                .find(name)
                .ok_or_else(|| anyhow!("unknown preset '{}'", name))?
                .controls
        }
        None => store.default_preset().controls,
    };
    for assignment in &controls.sets {
        params = params
            .with_assignment(assignment)
            .with_context(|| format!("invalid --set '{}'", assignment))?;
    }
    Ok(params)
}

fn open_engine(
    config: EngineConfig,
    input: &Path,
    controls: &ControlArgs,
) -> anyhow::Result<Engine> {
    let params = resolve_controls(controls)?;
    let asset =
        io::load_file(input).with_context(|| format!("failed to load {}", input.display()))?;

    let mut engine = Engine::new(config)?;
    engine.load(asset);
    engine.apply_preset(params)?;
    Ok(engine)
}

/// Render a file offline and write the WAV.
pub async fn render(
    config: EngineConfig,
    input: &Path,
    output: &Path,
    controls: &ControlArgs,
) -> anyhow::Result<()> {
    info!("Rendering {} -> {}", input.display(), output.display());

    let engine = open_engine(config, input, controls)?;
    let bytes = engine.export_wav().await?;
    tokio::fs::write(output, &bytes)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Rendered {:.2}s to {} ({} bytes)",
        engine.duration(),
        output.display(),
        bytes.len()
    );
    Ok(())
}

/// Play a file through the live graph until it ends or Ctrl-C.
pub async fn play(
    config: EngineConfig,
    input: &Path,
    controls: &ControlArgs,
    start: f64,
) -> anyhow::Result<()> {
    let poll = Duration::from_millis(config.poll_interval_ms);
    let mut engine = open_engine(config, input, controls)?;

    engine.seek(start)?;
    engine.play()?;
    println!("Playing {} ({:.2}s)", input.display(), engine.duration());

    let mut interval = tokio::time::interval(poll);
    let mut last_second = -1i64;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let state = engine.tick();
                if !state.is_playing {
                    break;
                }
                let second = state.position.floor() as i64;
                if second != last_second {
                    last_second = second;
                    let level = linear_to_db(peak(&engine.tap().snapshot()));
                    println!("{:>7.2}s / {:.2}s  peak {:>6.1} dB", state.position, state.duration, level);
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Ctrl-C handler failed: {}", e);
                }
                println!("Interrupted at {:.2}s", engine.position());
                break;
            }
        }
    }

    engine.stop();
    Ok(())
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// List built-in presets.
pub fn list_presets() -> anyhow::Result<()> {
    let store = PresetStore::builtin();

    println!("Built-in presets:");
    println!("{:-<60}", "");
    for preset in store.list() {
        let c = &preset.controls;
        println!(
            "{:<12} vol {:.2}  eq {:+.0}/{:+.0}/{:+.0} dB  rev {:.2}  dly {:.2}s  dist {:.2}  rate {:.2}  pitch {:+.0}",
            preset.name,
            c.volume,
            c.bass,
            c.mid,
            c.treble,
            c.reverb,
            c.delay,
            c.distortion,
            c.playback_rate,
            c.pitch
        );
    }
    Ok(())
}

/// Print format and levels of a WAV file.
pub fn inspect(input: &Path) -> anyhow::Result<()> {
    let asset =
        io::load_file(input).with_context(|| format!("failed to load {}", input.display()))?;

    println!("File:        {}", input.display());
    println!("Channels:    {}", asset.channels());
    println!("Sample rate: {} Hz", asset.sample_rate());
    println!("Frames:      {}", asset.frames());
    println!("Duration:    {:.3}s", asset.duration_secs());
    println!("Peak:        {:.1} dBFS", linear_to_db(asset.peak()));
    println!("RMS:         {:.1} dBFS", linear_to_db(asset.rms()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_controls_defaults_to_normal() {
        let params = resolve_controls(&ControlArgs::default()).unwrap();
        assert_eq!(params, ParameterSet::default());
    }

    #[test]
    fn test_resolve_controls_applies_sets_after_preset() {
        let controls = ControlArgs {
            preset: Some("LoFi".to_string()),
            sets: vec!["volume=0.25".to_string()],
        };
        let params = resolve_controls(&controls).unwrap();
        let lofi = PresetStore::builtin().find("LoFi").unwrap().controls;
        assert_eq!(params.volume, 0.25);
        assert_eq!(params.reverb, lofi.reverb);
    }

    #[test]
    fn test_resolve_controls_rejects_unknown_preset() {
        let controls = ControlArgs {
            preset: Some("Nope".to_string()),
            sets: Vec::new(),
        };
        assert!(resolve_controls(&controls).is_err());
    }

    #[test]
    fn test_resolve_controls_rejects_bad_assignment() {
        let controls = ControlArgs {
            preset: None,
            sets: vec!["wobble=1".to_string()],
        };
        assert!(resolve_controls(&controls).is_err());
    }

    #[test]
    fn test_load_config_default() {
        let config = load_config(None).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
