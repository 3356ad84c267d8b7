//! Effects graph
//!
//! One fixed topology, built the same way for live and offline contexts:
//!
//! ```text
//! source -> bass shelf -> mid peak -> treble shelf -+-> wave shaper ------------+
//!                                                   +-> delay (feedback) -> send +-> output gain -> out, tap
//!                                                   +-> convolver -> wet gain ---+
//! ```
//!
//! Branches stay wired; a zero gain silences a branch without removing it.
//! All tunable fields live in [`GraphSettings`], a pure function of the
//! [`ParameterSet`], so retuning never touches topology.

use std::sync::Arc;

use log::debug;

use crate::dsp::biquad::{FilterType, ToneFilter};
use crate::dsp::convolver::Convolver;
use crate::dsp::curve::synthesize_curve;
use crate::dsp::delay::{FeedbackDelay, MAX_DELAY_SECONDS};
use crate::dsp::source::{BufferSource, CompletionSignal};
use crate::dsp::waveshaper::{Oversample, WaveShaper};
use crate::engine::buffer::AudioAsset;
use crate::engine::context::RenderContext;
use crate::engine::tap::VisualizationTap;
use crate::params::ParameterSet;

// ============================================================================
// Topology constants
// ============================================================================

/// Bass shelf corner frequency
pub const BASS_FREQUENCY: f64 = 320.0;

/// Mid peak center frequency
pub const MID_FREQUENCY: f64 = 1000.0;

/// Mid peak quality factor
pub const MID_Q: f64 = 0.5;

/// Treble shelf corner frequency
pub const TREBLE_FREQUENCY: f64 = 3200.0;

/// Delay send gain per second of delay time
const DELAY_SEND_SCALE: f32 = 0.5;

// ============================================================================
// Settings
// ============================================================================

/// Every tunable field of the graph, derived from a parameter set
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSettings {
    /// volume x gain
    pub output_gain: f32,
    pub bass_db: f32,
    pub mid_db: f32,
    pub treble_db: f32,
    /// Delay line time in seconds, at most one second
    pub delay_time: f32,
    /// delay x 0.5
    pub delay_send: f32,
    pub feedback: f32,
    /// Wave shaper transfer curve
    pub curve: Arc<[f32]>,
    /// Convolution branch gain
    pub convolution_gain: f32,
    pub playback_rate: f32,
    /// pitch x 100
    pub detune_cents: f32,
}

impl GraphSettings {
    /// Map a parameter set onto unit fields
    pub fn from_parameters(params: &ParameterSet) -> Self {
        Self {
            output_gain: params.volume * params.gain,
            bass_db: params.bass,
            mid_db: params.mid,
            treble_db: params.treble,
            delay_time: params.delay.clamp(0.0, MAX_DELAY_SECONDS as f32),
            delay_send: params.delay * DELAY_SEND_SCALE,
            feedback: params.echo_feedback,
            curve: synthesize_curve(params.distortion),
            convolution_gain: params.reverb,
            playback_rate: params.playback_rate,
            detune_cents: params.pitch * 100.0,
        }
    }
}

// ============================================================================
// Graph
// ============================================================================

/// A wired graph instance bound to one context and one asset
#[derive(Debug)]
pub struct EffectsGraph {
    channels: usize,
    block_size: usize,
    source: BufferSource,
    bass: ToneFilter,
    mid: ToneFilter,
    treble: ToneFilter,
    shaper: WaveShaper,
    delay: FeedbackDelay,
    convolver: Convolver,
    settings: GraphSettings,
    tap: Option<VisualizationTap>,
    completion: CompletionSignal,
    // Per-branch scratch, one Vec per channel
    dry: Vec<Vec<f32>>,
    shaped: Vec<Vec<f32>>,
    echoed: Vec<Vec<f32>>,
    wet: Vec<Vec<f32>>,
}

/// Build the effects topology on `ctx`
///
/// # Arguments
/// * `ctx` - Live or offline rendering context
/// * `asset` - Asset the source plays
/// * `params` - Parameter snapshot applied before the first quantum
/// * `offset_secs` - Source start offset
pub fn build_graph(
    ctx: &dyn RenderContext,
    asset: Arc<AudioAsset>,
    params: &ParameterSet,
    offset_secs: f64,
) -> EffectsGraph {
    let sample_rate = ctx.sample_rate();
    let channels = ctx.channel_count();
    let block_size = ctx.block_size();
    let settings = GraphSettings::from_parameters(params);

    let completion = CompletionSignal::new();
    let source = BufferSource::new(asset, sample_rate, offset_secs, completion.clone());
    let impulse = ctx.impulse_synthesizer().synthesize(sample_rate);

    debug!(
        "Building graph: {} Hz, {} channel(s), quantum {}, offset {:.3}s",
        sample_rate, channels, block_size, offset_secs
    );

    let scratch = vec![vec![0.0_f32; block_size]; channels];
    let mut graph = EffectsGraph {
        channels,
        block_size,
        source,
        bass: ToneFilter::new(FilterType::LowShelf, BASS_FREQUENCY, 1.0, sample_rate, channels),
        mid: ToneFilter::new(FilterType::Peak, MID_FREQUENCY, MID_Q, sample_rate, channels),
        treble: ToneFilter::new(
            FilterType::HighShelf,
            TREBLE_FREQUENCY,
            1.0,
            sample_rate,
            channels,
        ),
        shaper: WaveShaper::new(settings.curve.clone(), Oversample::X4, sample_rate, channels),
        delay: FeedbackDelay::new(sample_rate, channels),
        convolver: Convolver::new(&impulse, block_size, channels),
        settings: settings.clone(),
        tap: ctx.monitor_tap(),
        completion,
        dry: scratch.clone(),
        shaped: scratch.clone(),
        echoed: scratch.clone(),
        wet: scratch,
    };
    graph.tune(&settings);
    graph
}

impl EffectsGraph {
    /// Retune every unit from a parameter set
    ///
    /// Applying the same set twice leaves the graph unchanged.
    pub fn apply_parameters(&mut self, params: &ParameterSet) {
        self.apply_settings(GraphSettings::from_parameters(params));
    }

    /// Install new settings, returning the previous ones
    ///
    /// The previous settings still own the old curve, so the caller decides
    /// where it is freed.
    pub fn apply_settings(&mut self, mut settings: GraphSettings) -> GraphSettings {
        self.swap_settings(&mut settings);
        settings
    }

    /// Install `settings` in place; afterwards it holds the previous ones
    pub fn swap_settings(&mut self, settings: &mut GraphSettings) {
        self.tune(settings);
        std::mem::swap(&mut self.settings, settings);
    }

    fn tune(&mut self, settings: &GraphSettings) {
        self.bass.set_gain_db(settings.bass_db);
        self.mid.set_gain_db(settings.mid_db);
        self.treble.set_gain_db(settings.treble_db);
        if !Arc::ptr_eq(self.shaper.curve(), &settings.curve) {
            self.shaper.set_curve(settings.curve.clone());
        }
        self.delay.set_delay_time(settings.delay_time);
        self.delay.set_feedback(settings.feedback);
        self.delay.set_send(settings.delay_send);
        self.convolver.set_gain(settings.convolution_gain);
        self.source.set_playback_rate(settings.playback_rate);
        self.source.set_detune(settings.detune_cents);
    }

    /// Current settings
    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    /// Output channel count
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frames per quantum
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Signal raised when the source runs out
    pub fn completion(&self) -> &CompletionSignal {
        &self.completion
    }

    /// Whether the source has finished
    pub fn is_finished(&self) -> bool {
        self.source.is_finished()
    }

    /// Stop the source; later quanta carry only effect tails
    pub fn stop_source(&mut self) {
        self.source.stop();
    }

    /// Render one quantum into `output` (`channels` Vecs of at least `block_size`)
    pub fn render_quantum(&mut self, output: &mut [Vec<f32>]) {
        let frames = self.block_size;

        self.source.render(&mut self.dry, frames);
        self.bass.process(&mut self.dry, frames);
        self.mid.process(&mut self.dry, frames);
        self.treble.process(&mut self.dry, frames);

        self.shaper.process(&self.dry, &mut self.shaped, frames);
        self.delay.process(&self.dry, &mut self.echoed, frames);
        self.convolver.process(&self.dry, &mut self.wet);

        let gain = self.settings.output_gain;
        for (c, out) in output.iter_mut().enumerate().take(self.channels) {
            let branches = self.shaped[c].iter().zip(&self.echoed[c]).zip(&self.wet[c]);
            for (y, ((s, e), w)) in out[..frames].iter_mut().zip(branches) {
                *y = (s + e + w) * gain;
            }
        }

        if let Some(tap) = &self.tap {
            tap.write(output, frames);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::impulse::ImpulseSynthesizer;
    use crate::engine::context::OfflineContext;
    use crate::params::ParameterName;
    use approx::assert_relative_eq;

    fn constant_asset(value: f32, frames: usize, sample_rate: u32) -> Arc<AudioAsset> {
        Arc::new(AudioAsset::new(vec![vec![value; frames]], sample_rate).unwrap())
    }

    fn context(frames: usize) -> OfflineContext {
        OfflineContext::new(1, frames, 8000, 256, ImpulseSynthesizer::new(Some(3)))
    }

    #[test]
    fn test_mapping() {
        let params = ParameterSet::default()
            .with(ParameterName::Volume, 0.5)
            .with(ParameterName::Gain, 1.5)
            .with(ParameterName::Delay, 0.4)
            .with(ParameterName::Pitch, -3.0)
            .with(ParameterName::Reverb, 0.25);
        let settings = GraphSettings::from_parameters(&params);

        assert_relative_eq!(settings.output_gain, 0.75);
        assert_relative_eq!(settings.delay_time, 0.4);
        assert_relative_eq!(settings.delay_send, 0.2);
        assert_relative_eq!(settings.detune_cents, -300.0);
        assert_relative_eq!(settings.convolution_gain, 0.25);
        assert_relative_eq!(settings.feedback, 0.2);
        assert_eq!(settings.curve.len(), crate::dsp::curve::CURVE_LENGTH);
    }

    #[test]
    fn test_delay_time_capped_but_send_is_not() {
        let params = ParameterSet::default().with(ParameterName::Delay, 1.6);
        let settings = GraphSettings::from_parameters(&params);
        assert_eq!(settings.delay_time, 1.0);
        assert_relative_eq!(settings.delay_send, 0.8);
    }

    #[test]
    fn test_apply_parameters_is_idempotent() {
        let ctx = context(1024);
        let params = ParameterSet::default()
            .with(ParameterName::Bass, 6.0)
            .with(ParameterName::Distortion, 0.4);
        let mut graph = build_graph(&ctx, constant_asset(0.1, 1024, 8000), &ParameterSet::default(), 0.0);

        graph.apply_parameters(&params);
        let once = graph.settings().clone();
        graph.apply_parameters(&params);
        assert_eq!(graph.settings(), &once);
        assert_eq!(once, GraphSettings::from_parameters(&params));
    }

    #[test]
    fn test_default_parameters_scale_by_third_and_volume() {
        let frames = 4096;
        let ctx = context(frames);
        let graph = build_graph(&ctx, constant_asset(0.6, frames, 8000), &ParameterSet::default(), 0.0);
        let rendered = ctx.render(graph).unwrap();

        assert_eq!(rendered.frames(), frames);
        // 0.6 / 3 through the curve, then volume 0.7
        assert_relative_eq!(rendered.channel(0)[frames - 1], 0.14, epsilon = 1e-3);
    }

    #[test]
    fn test_branches_add_when_enabled() {
        let frames = 2048;
        let dry_only = {
            let ctx = context(frames);
            let graph = build_graph(&ctx, constant_asset(0.3, frames, 8000), &ParameterSet::default(), 0.0);
            ctx.render(graph).unwrap()
        };
        let with_echo = {
            let ctx = context(frames);
            let params = ParameterSet::default().with(ParameterName::Delay, 0.05);
            let graph = build_graph(&ctx, constant_asset(0.3, frames, 8000), &params, 0.0);
            ctx.render(graph).unwrap()
        };
        assert!(with_echo.rms() > dry_only.rms());
    }

    #[test]
    fn test_completion_raised_at_end() {
        let ctx = context(2048);
        let mut graph = build_graph(&ctx, constant_asset(0.1, 300, 8000), &ParameterSet::default(), 0.0);
        let mut block = vec![vec![0.0; 256]];
        graph.render_quantum(&mut block);
        assert!(!graph.completion().is_raised());
        graph.render_quantum(&mut block);
        assert!(graph.is_finished());
        assert!(graph.completion().is_raised());
    }

    #[test]
    fn test_tap_receives_output() {
        struct TappedContext {
            tap: VisualizationTap,
        }
        impl RenderContext for TappedContext {
            fn sample_rate(&self) -> u32 {
                8000
            }
            fn channel_count(&self) -> usize {
                2
            }
            fn block_size(&self) -> usize {
                128
            }
            fn monitor_tap(&self) -> Option<VisualizationTap> {
                Some(self.tap.clone())
            }
            fn impulse_synthesizer(&self) -> ImpulseSynthesizer {
                ImpulseSynthesizer::new(Some(1))
            }
        }

        let ctx = TappedContext {
            tap: VisualizationTap::new(64),
        };
        let mut graph = build_graph(&ctx, constant_asset(0.5, 1000, 8000), &ParameterSet::default(), 0.0);
        assert_eq!(graph.channels(), 2);
        let mut block = vec![vec![0.0; 128]; 2];
        graph.render_quantum(&mut block);
        assert!(!ctx.tap.is_silent());
    }
}
