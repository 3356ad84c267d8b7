//! Convolution reverb unit
//!
//! Uniformly partitioned overlap-save convolution. The impulse is cut into
//! partitions of one render quantum, each transformed once at build time;
//! every quantum the input spectrum enters a frequency-domain delay line and
//! the output is the sum of spectrum products, transformed back.
//!
//! The impulse is scaled by its power the same way a browser convolver
//! normalizes, so noise impulses of any length come out at a similar level.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::impulse::ImpulseResponse;

/// Reference output level after normalization
const GAIN_CALIBRATION: f64 = 0.00125;

/// Sample rate the calibration level refers to
const GAIN_CALIBRATION_SAMPLE_RATE: f64 = 44100.0;

/// Floor for the measured impulse power
const MIN_POWER: f64 = 0.000125;

/// Scale factor applied to an impulse before convolution
pub fn normalization_scale(impulse: &ImpulseResponse) -> f32 {
    let channels = impulse.channels.len();
    let length = impulse.len();
    if channels == 0 || length == 0 {
        return 1.0;
    }

    let sum: f64 = impulse
        .channels
        .iter()
        .flat_map(|c| c.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();
    let mut power = (sum / (channels * length) as f64).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }

    let mut scale = GAIN_CALIBRATION / power;
    if impulse.sample_rate > 0 {
        scale *= GAIN_CALIBRATION_SAMPLE_RATE / impulse.sample_rate as f64;
    }
    scale as f32
}

/// Convolution state for one output channel
struct ChannelConvolver {
    /// Transformed impulse partitions
    partitions: Vec<Vec<Complex<f32>>>,
    /// Ring of past input spectra, newest at `head`
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
    /// Previous and current input block
    window: Vec<f32>,
}

/// Partitioned FFT convolver with per-channel impulse routing
pub struct Convolver {
    block_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    channels: Vec<ChannelConvolver>,
    spectrum: Vec<Complex<f32>>,
    accumulator: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    gain: f32,
}

impl std::fmt::Debug for Convolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Convolver")
            .field("block_size", &self.block_size)
            .field("channels", &self.channels.len())
            .field("partitions", &self.partition_count())
            .field("gain", &self.gain)
            .finish()
    }
}

impl Convolver {
    /// Build a convolver for `channels` output channels
    ///
    /// A single output channel hears the average of the impulse channels;
    /// otherwise channel `c` uses impulse channel `c % impulse_channels`.
    ///
    /// # Arguments
    /// * `impulse` - Impulse response, normalized here
    /// * `block_size` - Frames per call to `process`; the partition size
    /// * `channels` - Number of channels processed
    pub fn new(impulse: &ImpulseResponse, block_size: usize, channels: usize) -> Self {
        let fft_size = block_size * 2;
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        let scale = normalization_scale(impulse);
        let kernels = route_kernels(impulse, channels);

        let channels = kernels
            .iter()
            .map(|kernel| {
                let partitions: Vec<Vec<Complex<f32>>> = kernel
                    .chunks(block_size)
                    .map(|chunk| {
                        let mut buf = vec![Complex::new(0.0, 0.0); fft_size];
                        for (slot, &s) in buf.iter_mut().zip(chunk) {
                            *slot = Complex::new(s * scale, 0.0);
                        }
                        forward.process(&mut buf);
                        buf
                    })
                    .collect();
                let depth = partitions.len().max(1);
                ChannelConvolver {
                    partitions,
                    history: vec![vec![Complex::new(0.0, 0.0); fft_size]; depth],
                    head: 0,
                    window: vec![0.0; fft_size],
                }
            })
            .collect();

        Self {
            block_size,
            forward,
            inverse,
            channels,
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            accumulator: vec![Complex::new(0.0, 0.0); fft_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            gain: 0.0,
        }
    }

    /// Set the wet gain applied after convolution
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    /// Wet gain
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Frames consumed per call
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of impulse partitions per channel
    pub fn partition_count(&self) -> usize {
        self.channels.first().map(|c| c.partitions.len()).unwrap_or(0)
    }

    /// Convolve exactly one block of `block_size` frames
    pub fn process(&mut self, input: &[Vec<f32>], output: &mut [Vec<f32>]) {
        let block = self.block_size;
        let fft_size = block * 2;
        let norm = 1.0 / fft_size as f32;

        for ((state, src), dst) in self.channels.iter_mut().zip(input).zip(output.iter_mut()) {
            // Slide the window: last block moves to the front
            state.window.copy_within(block.., 0);
            state.window[block..].copy_from_slice(&src[..block]);

            for (slot, &s) in self.spectrum.iter_mut().zip(&state.window) {
                *slot = Complex::new(s, 0.0);
            }
            self.forward
                .process_with_scratch(&mut self.spectrum, &mut self.scratch);

            let depth = state.history.len();
            state.head = (state.head + depth - 1) % depth;
            state.history[state.head].copy_from_slice(&self.spectrum);

            self.accumulator
                .iter_mut()
                .for_each(|c| *c = Complex::new(0.0, 0.0));
            for (k, partition) in state.partitions.iter().enumerate() {
                let past = &state.history[(state.head + k) % depth];
                for ((acc, x), h) in self.accumulator.iter_mut().zip(past).zip(partition) {
                    *acc += x * h;
                }
            }

            self.inverse
                .process_with_scratch(&mut self.accumulator, &mut self.scratch);

            for (y, c) in dst[..block].iter_mut().zip(&self.accumulator[block..]) {
                *y = c.re * norm * self.gain;
            }
        }
    }
}

/// Pick the time-domain kernel for each output channel
fn route_kernels(impulse: &ImpulseResponse, channels: usize) -> Vec<Vec<f32>> {
    let available = impulse.channels.len();
    if available == 0 {
        return vec![Vec::new(); channels];
    }

    if channels == 1 && available > 1 {
        let length = impulse.len();
        let mixed = (0..length)
            .map(|i| impulse.channels.iter().map(|c| c[i]).sum::<f32>() / available as f32)
            .collect();
        return vec![mixed];
    }

    (0..channels)
        .map(|c| impulse.channels[c % available].clone())
        .collect()
}
