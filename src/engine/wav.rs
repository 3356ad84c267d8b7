//! 16-bit PCM WAV encoder
//!
//! Produces the canonical 44-byte-header RIFF layout. Samples are clamped to
//! [-1, 1] and quantized asymmetrically: negative values scale by 32768,
//! the rest by 32767, truncating toward zero.

use std::io::Write;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use log::info;

use crate::engine::buffer::AudioAsset;
use crate::error::{Result, StudioError};

/// Size of the RIFF/fmt/data header
pub const WAV_HEADER_LEN: usize = 44;

const BYTES_PER_SAMPLE: u32 = 2;
const PCM_FORMAT: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

/// Quantize one float sample to signed 16-bit
///
/// NaN encodes as silence; infinities clip like any other overshoot.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let s = (sample as f64).clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Header size fields for a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeaderSizes {
    channels: u16,
    block_align: u16,
    byte_rate: u32,
    data_len: u32,
    riff_len: u32,
}

/// Compute the header size fields, rejecting layouts a RIFF header cannot hold
fn header_sizes(frames: usize, channels: usize, sample_rate: u32) -> Result<HeaderSizes> {
    let too_large = || StudioError::InvalidAudio {
        reason: format!(
            "{} frames x {} channel(s) does not fit in a WAV file",
            frames, channels
        ),
        source: None,
    };

    let channel_count = u16::try_from(channels).map_err(|_| too_large())?;
    let block_align = channel_count
        .checked_mul(BYTES_PER_SAMPLE as u16)
        .ok_or_else(too_large)?;
    let byte_rate = sample_rate
        .checked_mul(block_align as u32)
        .ok_or_else(too_large)?;
    let data_len = u32::try_from(frames)
        .ok()
        .and_then(|f| f.checked_mul(block_align as u32))
        .ok_or_else(too_large)?;
    let riff_len = data_len
        .checked_add(WAV_HEADER_LEN as u32 - 8)
        .ok_or_else(too_large)?;

    Ok(HeaderSizes {
        channels: channel_count,
        block_align,
        byte_rate,
        data_len,
        riff_len,
    })
}

/// Write a WAV file image of planar samples to `writer`
///
/// Frames are interleaved frame-major. Channels shorter than the first
/// are padded with silence.
///
/// # Arguments
/// * `writer` - Destination
/// * `samples` - One Vec per channel
/// * `sample_rate` - Sample rate written into the header
///
/// # Errors
/// * `InvalidAudio` - If the sizes overflow the 32-bit header fields
/// * `Io` - If writing fails
pub fn write_wav<W: Write>(writer: &mut W, samples: &[Vec<f32>], sample_rate: u32) -> Result<()> {
    let frames = samples.first().map(Vec::len).unwrap_or(0);
    let sizes = header_sizes(frames, samples.len(), sample_rate)?;

    writer.write_all(b"RIFF")?;
    writer.write_u32::<LittleEndian>(sizes.riff_len)?;
    writer.write_all(b"WAVE")?;

    writer.write_all(b"fmt ")?;
    writer.write_u32::<LittleEndian>(16)?;
    writer.write_u16::<LittleEndian>(PCM_FORMAT)?;
    writer.write_u16::<LittleEndian>(sizes.channels)?;
    writer.write_u32::<LittleEndian>(sample_rate)?;
    writer.write_u32::<LittleEndian>(sizes.byte_rate)?;
    writer.write_u16::<LittleEndian>(sizes.block_align)?;
    writer.write_u16::<LittleEndian>(BITS_PER_SAMPLE)?;

    writer.write_all(b"data")?;
    writer.write_u32::<LittleEndian>(sizes.data_len)?;

    for frame in 0..frames {
        for channel in samples {
            let sample = channel.get(frame).copied().unwrap_or(0.0);
            writer.write_i16::<LittleEndian>(quantize(sample))?;
        }
    }

    Ok(())
}

/// Encode planar samples into an in-memory WAV file
pub fn encode_planar(samples: &[Vec<f32>], sample_rate: u32) -> Result<Vec<u8>> {
    let frames = samples.first().map(Vec::len).unwrap_or(0);
    let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + frames * samples.len() * 2);
    write_wav(&mut bytes, samples, sample_rate)?;
    Ok(bytes)
}

/// Encode an asset into an in-memory WAV file
pub fn encode(buffer: &AudioAsset) -> Result<Vec<u8>> {
    encode_planar(buffer.samples(), buffer.sample_rate())
}

/// Encode an asset and write it to `path`
pub fn write_wav_file(buffer: &AudioAsset, path: &Path) -> Result<()> {
    let bytes = encode(buffer)?;
    std::fs::write(path, &bytes)?;
    info!(
        "Wrote {} ({} bytes, {:.2}s)",
        path.display(),
        bytes.len(),
        buffer.duration_secs()
    );
    Ok(())
}
