//! Audio decoding
//!
//! Turns WAV bytes into an [`AudioAsset`]. Integer and float PCM at any bit
//! depth hound understands are converted to f32 in [-1, 1]. The asset keeps
//! its native sample rate and channel count.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader};
use log::{debug, info};

use crate::engine::buffer::AudioAsset;
use crate::error::{Result, StudioError};

/// Decode WAV bytes into an asset
///
/// # Arguments
/// * `bytes` - A complete RIFF/WAVE file
///
/// # Errors
/// * `InvalidAudio` - If the bytes are not a readable WAV file or hold no samples
/// * `UnsupportedFormat` - If the integer bit depth is not 8, 16, 24 or 32
pub fn decode(bytes: &[u8]) -> Result<AudioAsset> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| StudioError::InvalidAudio {
        reason: format!("Failed to parse WAV data: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    debug!(
        "Decoding WAV: {} Hz, {} channel(s), {}-bit {:?}",
        spec.sample_rate, channels, spec.bits_per_sample, spec.sample_format
    );

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    if interleaved.is_empty() {
        return Err(StudioError::InvalidAudio {
            reason: "WAV data contains no samples".to_string(),
            source: None,
        });
    }

    AudioAsset::from_interleaved(&interleaved, channels, spec.sample_rate)
}

/// Read and decode a WAV file
///
/// # Errors
/// * `Io` - If the file cannot be read
/// * Any error from [`decode`]
pub fn load_file(path: &Path) -> Result<AudioAsset> {
    let bytes = std::fs::read(path)?;
    let asset = decode(&bytes)?;
    info!(
        "Loaded {}: {:.2}s, {} Hz, {} channel(s)",
        path.display(),
        asset.duration_secs(),
        asset.sample_rate(),
        asset.channels()
    );
    Ok(asset)
}

/// Generate a sine tone, identical on every channel
///
/// # Arguments
/// * `frequency` - Tone frequency in Hz
/// * `duration_secs` - Length in seconds
/// * `sample_rate` - Sample rate in Hz
/// * `channels` - Channel count
/// * `amplitude` - Peak amplitude
pub fn generate_test_tone(
    frequency: f32,
    duration_secs: f32,
    sample_rate: u32,
    channels: usize,
    amplitude: f32,
) -> Result<AudioAsset> {
    let frames = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    let tone: Vec<f32> = (0..frames)
        .map(|i| amplitude * (angular_freq * i as f32).sin())
        .collect();

    AudioAsset::new(vec![tone; channels.max(1)], sample_rate)
}

// ============================================================================
// Internal helper functions
// ============================================================================

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let invalid = |depth: &str, e: hound::Error| StudioError::InvalidAudio {
        reason: format!("Failed to read {} samples: {}", depth, e),
        source: Some(Box::new(e)),
    };

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| invalid("float", e)),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("8-bit", e)),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("16-bit", e)),
            // 24-bit is stored as i32 in hound
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("24-bit", e)),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("32-bit int", e)),
            _ => Err(StudioError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits_per_sample),
            }),
        },
    }
}
