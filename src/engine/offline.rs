//! Offline rendering
//!
//! Builds a private copy of the effects graph on an offline context sized to
//! the asset, runs it to the end, and returns the result. Nothing is shared
//! with the live graph.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::dsp::impulse::ImpulseSynthesizer;
use crate::engine::buffer::AudioAsset;
use crate::engine::context::OfflineContext;
use crate::engine::graph::build_graph;
use crate::error::{Result, StudioError};
use crate::params::ParameterSet;

/// Renders assets through the effects graph without a device
#[derive(Debug, Clone, Copy)]
pub struct OfflineRenderer {
    block_size: usize,
    impulse: ImpulseSynthesizer,
}

impl OfflineRenderer {
    /// Create a renderer
    ///
    /// # Arguments
    /// * `block_size` - Render quantum
    /// * `impulse` - Reverb impulse generator
    pub fn new(block_size: usize, impulse: ImpulseSynthesizer) -> Self {
        Self {
            block_size,
            impulse,
        }
    }

    /// Create a renderer from engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.block_size, ImpulseSynthesizer::new(config.impulse_seed))
    }

    /// Render on a blocking worker and await the result
    ///
    /// The output has the asset's channel count, sample rate and length.
    ///
    /// # Errors
    /// * `RenderFailure` - If the worker fails
    pub async fn render(&self, asset: Arc<AudioAsset>, params: ParameterSet) -> Result<AudioAsset> {
        let renderer = *self;
        tokio::task::spawn_blocking(move || renderer.render_blocking(asset, &params))
            .await
            .map_err(|e| StudioError::RenderFailure {
                reason: format!("render task failed: {}", e),
            })?
    }

    /// Render on the current thread
    pub fn render_blocking(&self, asset: Arc<AudioAsset>, params: &ParameterSet) -> Result<AudioAsset> {
        let started = Instant::now();
        let ctx = OfflineContext::new(
            asset.channels(),
            asset.frames(),
            asset.sample_rate(),
            self.block_size,
            self.impulse,
        );
        debug!(
            "Offline render: {} frames, {} channel(s), {} Hz",
            ctx.length(),
            asset.channels(),
            asset.sample_rate()
        );

        let graph = build_graph(&ctx, asset, params, 0.0);
        let rendered = ctx.render(graph).map_err(|e| StudioError::RenderFailure {
            reason: e.to_string(),
        })?;

        // Unclamped feedback can blow up; the WAV encoder clips it
        if !rendered.is_finite() {
            warn!("Offline render produced non-finite samples");
        }

        info!(
            "Rendered {:.2}s of audio in {:.1} ms",
            rendered.duration_secs(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(rendered)
    }
}

impl Default for OfflineRenderer {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::generate_test_tone;
    use crate::params::ParameterName;

    fn renderer() -> OfflineRenderer {
        OfflineRenderer::new(256, ImpulseSynthesizer::new(Some(11)))
    }

    #[test]
    fn test_length_matches_input() {
        let asset = Arc::new(generate_test_tone(220.0, 0.3, 8000, 2, 0.5).unwrap());
        let rendered = renderer()
            .render_blocking(asset.clone(), &ParameterSet::default())
            .unwrap();
        assert_eq!(rendered.frames(), asset.frames());
        assert_eq!(rendered.channels(), 2);
        assert_eq!(rendered.sample_rate(), 8000);
    }

    #[test]
    fn test_seeded_renders_are_deterministic() {
        let asset = Arc::new(generate_test_tone(330.0, 0.2, 8000, 1, 0.5).unwrap());
        let params = ParameterSet::default().with(ParameterName::Reverb, 0.8);
        let a = renderer().render_blocking(asset.clone(), &params).unwrap();
        let b = renderer().render_blocking(asset, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_volume_is_silent() {
        let asset = Arc::new(generate_test_tone(440.0, 0.1, 8000, 1, 0.8).unwrap());
        let params = ParameterSet::default().with(ParameterName::Volume, 0.0);
        let rendered = renderer().render_blocking(asset, &params).unwrap();
        assert_eq!(rendered.peak(), 0.0);
    }

    #[test]
    fn test_runaway_feedback_still_exports() {
        let asset = Arc::new(generate_test_tone(440.0, 3.0, 8000, 1, 0.5).unwrap());
        let params = ParameterSet::default()
            .with(ParameterName::Delay, 0.01)
            .with(ParameterName::EchoFeedback, 2.0);
        let rendered = renderer().render_blocking(asset.clone(), &params).unwrap();
        assert_eq!(rendered.frames(), asset.frames());

        let bytes = crate::engine::wav::encode(&rendered).unwrap();
        assert_eq!(bytes.len(), crate::engine::wav::WAV_HEADER_LEN + asset.frames() * 2);
        let clipped = bytes[crate::engine::wav::WAV_HEADER_LEN..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .filter(|&s| s == i16::MAX || s == i16::MIN)
            .count();
        assert!(clipped > 0);
    }

    #[test]
    fn test_empty_asset_renders_empty() {
        let asset = Arc::new(AudioAsset::new(vec![Vec::new(), Vec::new()], 8000).unwrap());
        let rendered = renderer()
            .render_blocking(asset, &ParameterSet::default())
            .unwrap();
        assert_eq!(rendered.frames(), 0);
        assert_eq!(rendered.channels(), 2);
    }

    #[tokio::test]
    async fn test_async_render() {
        let asset = Arc::new(generate_test_tone(440.0, 0.25, 8000, 1, 0.5).unwrap());
        let rendered = renderer()
            .render(asset.clone(), ParameterSet::default())
            .await
            .unwrap();
        assert_eq!(rendered.frames(), asset.frames());
    }
}
