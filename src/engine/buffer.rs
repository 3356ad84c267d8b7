//! Decoded audio assets
//!
//! The immutable multi-channel buffer every graph reads from, plus level
//! helpers used by the CLI and by tests.

use crate::error::{Result, StudioError};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// # Returns
/// Value in decibels. Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Peak absolute sample value across all channels
pub fn peak_level(channels: &[Vec<f32>]) -> f32 {
    channels
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| s.abs())
        .fold(0.0_f32, f32::max)
}

/// RMS level across all channels (linear)
pub fn rms_level(channels: &[Vec<f32>]) -> f32 {
    let total: usize = channels.iter().map(Vec::len).sum();
    if total == 0 {
        return 0.0;
    }

    let sum_squares: f64 = channels
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();

    (sum_squares / total as f64).sqrt() as f32
}

// ============================================================================
// Audio Asset
// ============================================================================

/// An immutable decoded recording
///
/// Shared behind an `Arc` by the engine, the live graph and offline renders.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    /// Sample data: outer Vec is channels, inner Vec is frames
    samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl AudioAsset {
    /// Build an asset from planar channel data
    ///
    /// # Errors
    /// * `InvalidAudio` - If there are no channels, channel lengths differ,
    ///   or the sample rate is zero
    pub fn new(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(StudioError::InvalidAudio {
                reason: "Audio has no channels".to_string(),
                source: None,
            });
        }
        if sample_rate == 0 {
            return Err(StudioError::InvalidAudio {
                reason: "Sample rate must be non-zero".to_string(),
                source: None,
            });
        }
        let frames = samples[0].len();
        if samples.iter().any(|c| c.len() != frames) {
            return Err(StudioError::InvalidAudio {
                reason: "Channels have different lengths".to_string(),
                source: None,
            });
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create an asset from interleaved sample data
    ///
    /// # Arguments
    /// * `interleaved` - Interleaved sample data (L, R, L, R, ... for stereo)
    /// * `channels` - Channel count
    /// * `sample_rate` - Sample rate in Hz
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(StudioError::InvalidAudio {
                reason: "Audio has no channels".to_string(),
                source: None,
            });
        }
        if interleaved.len() % channels != 0 {
            return Err(StudioError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    channels
                ),
                source: None,
            });
        }

        let frames = interleaved.len() / channels;
        let mut samples = vec![Vec::with_capacity(frames); channels];
        for frame in interleaved.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Self::new(samples, sample_rate)
    }

    /// Convert the asset to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels() * self.frames());
        for frame in 0..self.frames() {
            for channel in &self.samples {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    /// Number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Number of frames per channel
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the asset has no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Samples of one channel
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// All channels
    #[inline]
    pub fn samples(&self) -> &[Vec<f32>] {
        &self.samples
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }

    /// Peak absolute level (linear)
    pub fn peak(&self) -> f32 {
        peak_level(&self.samples)
    }

    /// RMS level (linear)
    pub fn rms(&self) -> f32 {
        rms_level(&self.samples)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_to_db() {
        assert!((linear_to_db(1.0) - 0.0).abs() < 1e-6);
        assert!((linear_to_db(0.5) - (-6.0206)).abs() < 1e-3);
        assert!(linear_to_db(0.0).is_infinite() && linear_to_db(0.0).is_sign_negative());
    }

    #[test]
    fn test_from_interleaved() {
        let asset = AudioAsset::from_interleaved(&[0.1, 0.2, 0.3, 0.4], 2, 44100).unwrap();
        assert_eq!(asset.channels(), 2);
        assert_eq!(asset.frames(), 2);
        assert_eq!(asset.channel(0), &[0.1, 0.3]);
        assert_eq!(asset.channel(1), &[0.2, 0.4]);
        assert_eq!(asset.to_interleaved(), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_from_interleaved_rejects_ragged_data() {
        let err = AudioAsset::from_interleaved(&[0.1, 0.2, 0.3], 2, 44100).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_AUDIO");
    }

    #[test]
    fn test_new_rejects_mismatched_channels() {
        assert!(AudioAsset::new(vec![vec![0.0; 4], vec![0.0; 3]], 44100).is_err());
        assert!(AudioAsset::new(Vec::new(), 44100).is_err());
        assert!(AudioAsset::new(vec![vec![0.0; 4]], 0).is_err());
    }

    #[test]
    fn test_duration() {
        let asset = AudioAsset::new(vec![vec![0.0; 22050]], 44100).unwrap();
        assert_relative_eq!(asset.duration_secs(), 0.5);
        assert!(!asset.is_empty());
    }

    #[test]
    fn test_levels() {
        let asset = AudioAsset::new(vec![vec![0.5, -1.0], vec![0.0, 0.5]], 8000).unwrap();
        assert_eq!(asset.peak(), 1.0);
        // sqrt((0.25 + 1.0 + 0.0 + 0.25) / 4)
        assert_relative_eq!(asset.rms(), (1.5_f32 / 4.0).sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_is_finite() {
        let asset = AudioAsset::new(vec![vec![0.0, f32::NAN]], 8000).unwrap();
        assert!(!asset.is_finite());
    }
}
