//! Wave shaper unit
//!
//! Maps each sample through a transfer curve. Input in [-1, 1] is spread
//! across the curve with linear interpolation between taps; input beyond
//! that range takes the edge values. With 4x oversampling the signal is
//! upsampled, shaped, low-pass filtered and decimated to keep the harmonics
//! the curve generates from folding back.

use std::sync::Arc;

use super::biquad::{BiquadCoeffs, BiquadState, FilterType};

/// Oversampling factor for the shaper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Oversample {
    None,
    #[default]
    X4,
}

impl Oversample {
    fn factor(&self) -> usize {
        match self {
            Oversample::None => 1,
            Oversample::X4 => 4,
        }
    }
}

/// Anti-aliasing cutoff as a fraction of the base sample rate
const ANTI_ALIAS_CUTOFF: f64 = 0.45;

/// Q values of a fourth-order Butterworth low-pass split into two sections
const BUTTERWORTH_Q: [f64; 2] = [0.541_196_1, 1.306_563];

/// Per-channel oversampling state
#[derive(Debug, Clone, Default)]
struct OversampleState {
    previous: f32,
    upsample: [BiquadState; 2],
    downsample: [BiquadState; 2],
}

/// Curve lookup with optional oversampling
#[derive(Debug, Clone)]
pub struct WaveShaper {
    curve: Arc<[f32]>,
    oversample: Oversample,
    filter: [BiquadCoeffs; 2],
    states: Vec<OversampleState>,
}

impl WaveShaper {
    /// Create a shaper for `channels` channels at `sample_rate`
    pub fn new(curve: Arc<[f32]>, oversample: Oversample, sample_rate: u32, channels: usize) -> Self {
        let oversampled_rate = sample_rate as f64 * Oversample::X4.factor() as f64;
        let cutoff = sample_rate as f64 * ANTI_ALIAS_CUTOFF;
        let filter = BUTTERWORTH_Q.map(|q| {
            BiquadCoeffs::calculate(FilterType::LowPass, oversampled_rate, cutoff, 0.0, q)
        });

        Self {
            curve,
            oversample,
            filter,
            states: vec![OversampleState::default(); channels],
        }
    }

    /// Replace the transfer curve
    pub fn set_curve(&mut self, curve: Arc<[f32]>) {
        self.curve = curve;
    }

    /// Current transfer curve
    pub fn curve(&self) -> &Arc<[f32]> {
        &self.curve
    }

    /// Oversampling mode
    pub fn oversample(&self) -> Oversample {
        self.oversample
    }

    /// Shape `input` into `output`, channel by channel
    pub fn process(&mut self, input: &[Vec<f32>], output: &mut [Vec<f32>], frames: usize) {
        let factor = self.oversample.factor();
        for ((src, dst), state) in input.iter().zip(output.iter_mut()).zip(self.states.iter_mut()) {
            for (x, y) in src[..frames].iter().zip(dst[..frames].iter_mut()) {
                *y = if factor == 1 {
                    lookup(&self.curve, *x)
                } else {
                    shape_oversampled(&self.curve, &self.filter, state, *x, factor)
                };
            }
        }
    }
}

/// Read the curve at `x` with linear interpolation
#[inline]
pub fn lookup(curve: &[f32], x: f32) -> f32 {
    let n = curve.len();
    match n {
        0 => return x,
        1 => return curve[0],
        _ => {}
    }

    let v = (n - 1) as f64 * 0.5 * (x as f64 + 1.0);
    if v <= 0.0 {
        curve[0]
    } else if v >= (n - 1) as f64 {
        curve[n - 1]
    } else {
        let index = v.floor() as usize;
        let frac = (v - index as f64) as f32;
        curve[index] + (curve[index + 1] - curve[index]) * frac
    }
}

/// Upsample one input sample by linear interpolation, shape every
/// sub-sample, then filter and keep the last sub-sample
#[inline]
fn shape_oversampled(
    curve: &[f32],
    filter: &[BiquadCoeffs; 2],
    state: &mut OversampleState,
    x: f32,
    factor: usize,
) -> f32 {
    let mut decimated = 0.0;
    for step in 1..=factor {
        let t = step as f32 / factor as f32;
        let mut sub = (state.previous + (x - state.previous) * t) as f64;
        for (section, coeffs) in state.upsample.iter_mut().zip(filter.iter()) {
            sub = section.process(sub, coeffs);
        }

        let mut shaped = lookup(curve, sub as f32) as f64;
        for (section, coeffs) in state.downsample.iter_mut().zip(filter.iter()) {
            shaped = section.process(shaped, coeffs);
        }
        decimated = shaped;
    }
    state.previous = x;
    decimated as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::curve::synthesize_curve;
    use approx::assert_relative_eq;

    #[test]
    fn test_lookup_endpoints_and_midpoint() {
        let curve: Vec<f32> = vec![-1.0, 0.0, 1.0];
        assert_eq!(lookup(&curve, -1.0), -1.0);
        assert_eq!(lookup(&curve, 1.0), 1.0);
        assert_eq!(lookup(&curve, 0.0), 0.0);
        assert_relative_eq!(lookup(&curve, 0.5), 0.5);
    }

    #[test]
    fn test_lookup_clamps_out_of_range() {
        let curve: Vec<f32> = vec![-0.25, 0.0, 0.25];
        assert_eq!(lookup(&curve, -4.0), -0.25);
        assert_eq!(lookup(&curve, 4.0), 0.25);
    }

    #[test]
    fn test_zero_distortion_attenuates_to_a_third() {
        let curve = synthesize_curve(0.0);
        let mut shaper = WaveShaper::new(curve, Oversample::None, 44100, 1);
        let input = vec![vec![0.9_f32; 16]];
        let mut output = vec![vec![0.0_f32; 16]];
        shaper.process(&input, &mut output, 16);
        assert_relative_eq!(output[0][0], 0.3, epsilon = 1e-4);
    }

    #[test]
    fn test_oversampled_dc_settles_to_curve_value() {
        let curve = synthesize_curve(0.5);
        let expected = lookup(&curve, 0.4);
        let mut shaper = WaveShaper::new(curve, Oversample::X4, 44100, 1);
        let input = vec![vec![0.4_f32; 2048]];
        let mut output = vec![vec![0.0_f32; 2048]];
        shaper.process(&input, &mut output, 2048);
        assert_relative_eq!(output[0][2047], expected, epsilon = 1e-3);
    }

    #[test]
    fn test_silence_stays_silent() {
        let curve = synthesize_curve(1.0);
        let mut shaper = WaveShaper::new(curve, Oversample::X4, 48000, 2);
        let input = vec![vec![0.0_f32; 256]; 2];
        let mut output = vec![vec![1.0_f32; 256]; 2];
        shaper.process(&input, &mut output, 256);
        assert!(output.iter().flatten().all(|&s| s.abs() < 1e-6));
    }
}
