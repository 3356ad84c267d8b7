//! Buffer source unit
//!
//! Plays an [`AudioAsset`] from an offset at a variable rate. Speed and
//! detune both scale the read increment, so pitch follows rate the way a
//! tape would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::engine::buffer::AudioAsset;

/// Raised once by a source when it runs out of frames
///
/// Cloned handles share one flag; the audio side raises it, the transport
/// consumes it.
#[derive(Debug, Clone, Default)]
pub struct CompletionSignal(Arc<AtomicBool>);

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the source as finished
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Check without consuming
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Consume the signal, returning whether it was raised
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Reads an asset with linear interpolation and channel mixing
#[derive(Debug)]
pub struct BufferSource {
    asset: Arc<AudioAsset>,
    /// Read position in asset frames
    position: f64,
    playback_rate: f32,
    detune_cents: f32,
    /// Asset rate over context rate
    rate_ratio: f64,
    finished: bool,
    completion: CompletionSignal,
}

impl BufferSource {
    /// Create a source starting `offset_secs` into the asset
    ///
    /// # Arguments
    /// * `asset` - Asset to play
    /// * `context_rate` - Sample rate of the rendering context
    /// * `offset_secs` - Start offset; negative values start at zero
    /// * `completion` - Raised when the asset is exhausted
    pub fn new(
        asset: Arc<AudioAsset>,
        context_rate: u32,
        offset_secs: f64,
        completion: CompletionSignal,
    ) -> Self {
        let rate_ratio = asset.sample_rate() as f64 / context_rate.max(1) as f64;
        let position = offset_secs.max(0.0) * asset.sample_rate() as f64;
        Self {
            asset,
            position,
            playback_rate: 1.0,
            detune_cents: 0.0,
            rate_ratio,
            finished: false,
            completion,
        }
    }

    /// Set the speed multiplier
    pub fn set_playback_rate(&mut self, rate: f32) {
        self.playback_rate = rate;
    }

    /// Set the detune in cents
    pub fn set_detune(&mut self, cents: f32) {
        self.detune_cents = cents;
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    pub fn detune(&self) -> f32 {
        self.detune_cents
    }

    /// Asset frames advanced per context frame
    pub fn increment(&self) -> f64 {
        self.playback_rate as f64 * 2f64.powf(self.detune_cents as f64 / 1200.0) * self.rate_ratio
    }

    /// Whether the source has run out of frames
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Halt output; later blocks are silent
    pub fn stop(&mut self) {
        self.finished = true;
    }

    /// Render one block into `output`, one Vec per context channel
    ///
    /// Frames past the end of the asset are zero. The completion signal is
    /// raised the first time the read position passes the last frame.
    pub fn render(&mut self, output: &mut [Vec<f32>], frames: usize) {
        let asset_frames = self.asset.frames();
        let increment = self.increment();

        for i in 0..frames {
            if self.finished || self.position < 0.0 || self.position >= asset_frames as f64 {
                if !self.finished {
                    self.finished = true;
                    self.completion.raise();
                }
                for channel in output.iter_mut() {
                    channel[i] = 0.0;
                }
                continue;
            }

            let index = self.position.floor() as usize;
            let frac = (self.position - index as f64) as f32;
            write_frame(&self.asset, index, frac, output, i);
            self.position += increment;
        }
    }
}

/// Interpolate one frame and mix it to the output channel count
///
/// Equal channel counts copy straight across. Mono spreads to every output
/// channel, a single output channel hears the average of all inputs, and
/// other layouts map channel by channel with silence for missing inputs.
#[inline]
fn write_frame(asset: &AudioAsset, index: usize, frac: f32, output: &mut [Vec<f32>], i: usize) {
    let read = |c: usize| {
        let samples = asset.channel(c);
        let a = samples[index];
        let b = samples.get(index + 1).copied().unwrap_or(a);
        a + (b - a) * frac
    };

    let inputs = asset.channels();
    let outputs = output.len();
    if inputs == 1 {
        let value = read(0);
        for channel in output.iter_mut() {
            channel[i] = value;
        }
    } else if outputs == 1 {
        output[0][i] = (0..inputs).map(read).sum::<f32>() / inputs as f32;
    } else {
        for (c, channel) in output.iter_mut().enumerate() {
            channel[i] = if c < inputs { read(c) } else { 0.0 };
        }
    }
}
