//! Rendering contexts
//!
//! [`RenderContext`] is the capability the graph topology is built against.
//! The live context adds a device and a monitor tap; the offline context
//! renders a fixed number of frames as fast as possible and hands back the
//! buffer.

use log::debug;

use crate::dsp::impulse::ImpulseSynthesizer;
use crate::engine::buffer::AudioAsset;
use crate::engine::graph::EffectsGraph;
use crate::engine::tap::VisualizationTap;
use crate::error::Result;

/// What a graph needs to know about the backend it renders on
pub trait RenderContext {
    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Output channel count
    fn channel_count(&self) -> usize;

    /// Frames per render quantum
    fn block_size(&self) -> usize;

    /// Tap fed from the graph output, if this backend is monitored
    fn monitor_tap(&self) -> Option<VisualizationTap>;

    /// Generator for the reverb impulse
    fn impulse_synthesizer(&self) -> ImpulseSynthesizer;
}

/// Non-real-time backend with a fixed output length
#[derive(Debug, Clone)]
pub struct OfflineContext {
    sample_rate: u32,
    channels: usize,
    length: usize,
    block_size: usize,
    impulse: ImpulseSynthesizer,
}

impl OfflineContext {
    /// Create a context that will render `length` frames
    ///
    /// # Arguments
    /// * `channels` - Output channel count
    /// * `length` - Output length in frames
    /// * `sample_rate` - Output sample rate
    /// * `block_size` - Render quantum
    /// * `impulse` - Reverb impulse generator
    pub fn new(
        channels: usize,
        length: usize,
        sample_rate: u32,
        block_size: usize,
        impulse: ImpulseSynthesizer,
    ) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            length,
            block_size: block_size.max(1),
            impulse,
        }
    }

    /// Output length in frames
    pub fn length(&self) -> usize {
        self.length
    }

    /// Drive `graph` until `length` frames are rendered
    ///
    /// The final quantum is rendered whole and truncated.
    pub fn render(&self, mut graph: EffectsGraph) -> Result<AudioAsset> {
        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(self.length); self.channels];
        let mut block = vec![vec![0.0_f32; self.block_size]; self.channels];
        let mut rendered = 0;

        while rendered < self.length {
            graph.render_quantum(&mut block);
            let take = (self.length - rendered).min(self.block_size);
            for (dst, src) in output.iter_mut().zip(&block) {
                dst.extend_from_slice(&src[..take]);
            }
            rendered += take;
        }

        debug!(
            "Offline render complete: {} frames x {} channel(s) at {} Hz",
            rendered, self.channels, self.sample_rate
        );
        AudioAsset::new(output, self.sample_rate)
    }
}

impl RenderContext for OfflineContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> usize {
        self.channels
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn monitor_tap(&self) -> Option<VisualizationTap> {
        None
    }

    fn impulse_synthesizer(&self) -> ImpulseSynthesizer {
        self.impulse
    }
}
