//! Synthetic reverb impulse response
//!
//! Two seconds of stereo noise under a quadratic decay envelope. A fresh
//! impulse is drawn for every graph build unless a seed is configured.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Impulse length in seconds
pub const IMPULSE_SECONDS: usize = 2;

/// Impulse channel count
pub const IMPULSE_CHANNELS: usize = 2;

/// A multi-channel impulse response
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    /// One sample vector per channel
    pub channels: Vec<Vec<f32>>,
    /// Sample rate the impulse was generated for
    pub sample_rate: u32,
}

impl ImpulseResponse {
    /// Samples per channel
    pub fn len(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Check if the impulse has no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generates reverb impulses
#[derive(Debug, Clone, Copy, Default)]
pub struct ImpulseSynthesizer {
    seed: Option<u64>,
}

impl ImpulseSynthesizer {
    /// Create a synthesizer; `None` draws fresh entropy on every call
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    /// Build a `2 * sample_rate` frame, two-channel decaying noise impulse
    pub fn synthesize(&self, sample_rate: u32) -> ImpulseResponse {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        synthesize_with(sample_rate, &mut rng)
    }
}

/// Fill an impulse from an explicit generator
pub fn synthesize_with<R: Rng>(sample_rate: u32, rng: &mut R) -> ImpulseResponse {
    let length = sample_rate as usize * IMPULSE_SECONDS;
    let channels = (0..IMPULSE_CHANNELS)
        .map(|_| {
            (0..length)
                .map(|i| {
                    let noise: f64 = rng.gen_range(-1.0..1.0);
                    let envelope = (1.0 - i as f64 / length as f64).powi(2);
                    (noise * envelope) as f32
                })
                .collect()
        })
        .collect();

    ImpulseResponse {
        channels,
        sample_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape() {
        let impulse = ImpulseSynthesizer::default().synthesize(8000);
        assert_eq!(impulse.channels.len(), 2);
        assert_eq!(impulse.len(), 16000);
        assert_eq!(impulse.sample_rate, 8000);
    }

    #[test]
    fn test_samples_stay_inside_envelope() {
        let impulse = ImpulseSynthesizer::default().synthesize(4000);
        let length = impulse.len() as f64;
        for channel in &impulse.channels {
            for (i, &s) in channel.iter().enumerate() {
                let envelope = (1.0 - i as f64 / length).powi(2);
                assert!((s as f64).abs() <= envelope + 1e-6);
            }
        }
    }

    #[test]
    fn test_energy_decays() {
        let impulse = ImpulseSynthesizer::default().synthesize(8000);
        let channel = &impulse.channels[0];
        let quarter = channel.len() / 4;
        let energy = |s: &[f32]| s.iter().map(|x| (*x as f64).powi(2)).sum::<f64>();
        assert!(energy(&channel[..quarter]) > energy(&channel[3 * quarter..]) * 10.0);
    }

    #[test]
    fn test_seeded_impulses_repeat() {
        let a = ImpulseSynthesizer::new(Some(42)).synthesize(1000);
        let b = ImpulseSynthesizer::new(Some(42)).synthesize(1000);
        assert_eq!(a.channels, b.channels);
    }

    #[test]
    fn test_unseeded_impulses_differ() {
        let a = ImpulseSynthesizer::default().synthesize(1000);
        let b = ImpulseSynthesizer::default().synthesize(1000);
        assert_ne!(a.channels, b.channels);
    }
}
