//! Biquad filter unit
//!
//! Second-order IIR sections used for the three tone stages and for the
//! anti-aliasing filters of the wave shaper's oversampler.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Filter shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Bell curve boost/cut
    Peak,
    /// Boost/cut below frequency
    LowShelf,
    /// Boost/cut above frequency
    HighShelf,
    /// Remove above frequency
    LowPass,
}

/// Biquad filter coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// Unity pass-through
    pub const IDENTITY: BiquadCoeffs = BiquadCoeffs {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Calculate biquad coefficients using Audio EQ Cookbook formulas
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    ///
    /// Shelves use a shelf slope of 1, which is Q = 1/sqrt(2); `q` is only
    /// read for peak and low-pass shapes.
    pub fn calculate(
        filter_type: FilterType,
        sample_rate: f64,
        frequency: f64,
        gain_db: f64,
        q: f64,
    ) -> Self {
        // Clamp frequency below Nyquist
        let freq = frequency.clamp(10.0, sample_rate / 2.0 - 1.0);
        let q = match filter_type {
            FilterType::LowShelf | FilterType::HighShelf => FRAC_1_SQRT_2,
            _ => q.clamp(0.0001, 1000.0),
        };

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);
        let a = 10.0_f64.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match filter_type {
            FilterType::Peak => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterType::LowShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterType::HighShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterType::LowPass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
        };

        // Normalize by a0
        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Biquad filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Process a single sample (Direct Form I)
    #[inline]
    pub fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// A tone-control stage with a fixed shape and frequency and a tunable gain
#[derive(Debug, Clone)]
pub struct ToneFilter {
    filter_type: FilterType,
    frequency: f64,
    q: f64,
    gain_db: f32,
    sample_rate: f64,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
}

impl ToneFilter {
    /// Create a filter stage
    ///
    /// # Arguments
    /// * `filter_type` - Filter shape
    /// * `frequency` - Corner or center frequency in Hz
    /// * `q` - Quality factor (ignored by shelves)
    /// * `sample_rate` - Context sample rate
    /// * `channels` - Number of channels processed
    pub fn new(
        filter_type: FilterType,
        frequency: f64,
        q: f64,
        sample_rate: u32,
        channels: usize,
    ) -> Self {
        let mut filter = Self {
            filter_type,
            frequency,
            q,
            gain_db: 0.0,
            sample_rate: sample_rate as f64,
            coeffs: BiquadCoeffs::IDENTITY,
            states: vec![BiquadState::default(); channels],
        };
        filter.update_coefficients();
        filter
    }

    /// Set the band gain in dB (unclamped)
    pub fn set_gain_db(&mut self, gain_db: f32) {
        if self.gain_db != gain_db {
            self.gain_db = gain_db;
            self.update_coefficients();
        }
    }

    /// Current band gain in dB
    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// Filter shape
    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// Corner or center frequency in Hz
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    fn update_coefficients(&mut self) {
        self.coeffs = BiquadCoeffs::calculate(
            self.filter_type,
            self.sample_rate,
            self.frequency,
            self.gain_db as f64,
            self.q,
        );
    }

    /// Filter one block in place; `channels[c]` is processed with state `c`
    pub fn process(&mut self, channels: &mut [Vec<f32>], frames: usize) {
        for (samples, state) in channels.iter_mut().zip(self.states.iter_mut()) {
            for sample in samples[..frames].iter_mut() {
                *sample = state.process(*sample as f64, &self.coeffs) as f32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f64, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * PI * frequency * i as f64 / sample_rate as f64).sin() as f32)
            .collect()
    }

    /// RMS over the second half, after the filter has settled
    fn settled_rms(samples: &[f32]) -> f64 {
        let tail = &samples[samples.len() / 2..];
        let sum: f64 = tail.iter().map(|&s| (s as f64).powi(2)).sum();
        (sum / tail.len() as f64).sqrt()
    }

    fn gain_at(filter: &mut ToneFilter, frequency: f64) -> f64 {
        let input = sine(frequency, 48000, 9600);
        let mut channels = vec![input.clone()];
        filter.process(&mut channels, input.len());
        settled_rms(&channels[0]) / settled_rms(&input)
    }

    #[test]
    fn test_zero_gain_is_identity() {
        for filter_type in [FilterType::LowShelf, FilterType::Peak, FilterType::HighShelf] {
            let coeffs = BiquadCoeffs::calculate(filter_type, 48000.0, 1000.0, 0.0, 0.5);
            assert!((coeffs.b0 - 1.0).abs() < 1e-9);
            assert!((coeffs.b1 - coeffs.a1).abs() < 1e-9);
            assert!((coeffs.b2 - coeffs.a2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_low_shelf_boosts_lows() {
        let mut filter = ToneFilter::new(FilterType::LowShelf, 320.0, 1.0, 48000, 1);
        filter.set_gain_db(12.0);

        let low = gain_at(&mut filter, 60.0);
        let high = gain_at(&mut filter, 5000.0);
        assert!(low > 3.0, "Low frequencies should be boosted, got {}", low);
        assert!((high - 1.0).abs() < 0.1, "Highs should pass, got {}", high);
    }

    #[test]
    fn test_high_shelf_cuts_highs() {
        let mut filter = ToneFilter::new(FilterType::HighShelf, 3200.0, 1.0, 48000, 1);
        filter.set_gain_db(-12.0);

        let high = gain_at(&mut filter, 12000.0);
        let low = gain_at(&mut filter, 100.0);
        assert!(high < 0.35, "High frequencies should be cut, got {}", high);
        assert!((low - 1.0).abs() < 0.1, "Lows should pass, got {}", low);
    }

    #[test]
    fn test_peak_gain_at_center() {
        let mut filter = ToneFilter::new(FilterType::Peak, 1000.0, 0.5, 48000, 1);
        filter.set_gain_db(6.0);

        let center = gain_at(&mut filter, 1000.0);
        // 10^(6/20) = 1.995
        assert!((center - 1.995).abs() < 0.1, "Expected ~2x gain, got {}", center);
    }

    #[test]
    fn test_low_pass_attenuates_above_cutoff() {
        let coeffs = BiquadCoeffs::calculate(FilterType::LowPass, 48000.0, 1000.0, 0.0, 0.707);
        let mut state = BiquadState::default();
        let input = sine(8000.0, 48000, 4800);
        let output: Vec<f32> = input
            .iter()
            .map(|&s| state.process(s as f64, &coeffs) as f32)
            .collect();
        assert!(settled_rms(&output) / settled_rms(&input) < 0.05);
    }

    #[test]
    fn test_channels_are_independent() {
        let mut filter = ToneFilter::new(FilterType::Peak, 1000.0, 0.5, 48000, 2);
        filter.set_gain_db(6.0);

        let mut channels = vec![sine(1000.0, 48000, 512), vec![0.0; 512]];
        filter.process(&mut channels, 512);
        assert!(channels[1].iter().all(|&s| s == 0.0));
    }
}
