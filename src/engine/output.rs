//! Live audio outputs
//!
//! An output pulls interleaved frames from a [`LiveRenderer`] at its own
//! pace. `NullOutput` runs a headless thread that renders in real time and
//! discards the samples; `CpalOutput` (feature `device`) drives the system
//! output device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::engine::live::LiveRenderer;
use crate::error::Result;

/// Sample rate and channel count of an output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: usize,
}

/// A running live output
pub trait AudioOutput {
    /// Format the renderer is driven at
    fn format(&self) -> OutputFormat;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

// ============================================================================
// Null Output
// ============================================================================

/// Frames rendered per wake-up of the headless thread
const NULL_PERIOD_FRAMES: usize = 256;

/// Headless output paced by the wall clock
#[derive(Debug)]
pub struct NullOutput {
    format: OutputFormat,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl NullOutput {
    /// Spawn the render thread
    ///
    /// # Arguments
    /// * `format` - Format to render at
    /// * `make_renderer` - Builds the renderer once the format is known
    pub fn start<F>(format: OutputFormat, make_renderer: F) -> Result<Self>
    where
        F: FnOnce(OutputFormat) -> LiveRenderer,
    {
        let mut renderer = make_renderer(format);
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let period = Duration::from_secs_f64(NULL_PERIOD_FRAMES as f64 / format.sample_rate as f64);

        let thread = std::thread::Builder::new()
            .name("fxstudio-null-output".to_string())
            .spawn(move || {
                let mut buffer = vec![0.0_f32; NULL_PERIOD_FRAMES * format.channels];
                let mut deadline = Instant::now();
                while flag.load(Ordering::Acquire) {
                    renderer.fill_interleaved(&mut buffer);
                    deadline += period;
                    let now = Instant::now();
                    if deadline > now {
                        std::thread::sleep(deadline - now);
                    } else {
                        // Fell behind; resync instead of bursting
                        deadline = now;
                    }
                }
            })?;

        debug!(
            "Null output started: {} Hz, {} channel(s)",
            format.sample_rate, format.channels
        );
        Ok(Self {
            format,
            running,
            thread: Some(thread),
        })
    }
}

impl AudioOutput for NullOutput {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

impl Drop for NullOutput {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Null output thread panicked");
            }
        }
    }
}

// ============================================================================
// Device Output
// ============================================================================

#[cfg(feature = "device")]
pub use device::CpalOutput;

#[cfg(feature = "device")]
mod device {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use log::{error, info};

    use super::{AudioOutput, OutputFormat};
    use crate::engine::live::LiveRenderer;
    use crate::error::{Result, StudioError};

    fn device_error(reason: impl std::fmt::Display) -> StudioError {
        StudioError::Device {
            reason: reason.to_string(),
        }
    }

    /// System output device through cpal
    pub struct CpalOutput {
        format: OutputFormat,
        _stream: cpal::Stream,
    }

    impl CpalOutput {
        /// Open the default output device and start streaming
        ///
        /// # Errors
        /// * `Device` - If there is no device or the stream cannot be built
        pub fn start<F>(make_renderer: F) -> Result<Self>
        where
            F: FnOnce(OutputFormat) -> LiveRenderer,
        {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| device_error("no default output device available"))?;
            let config = device.default_output_config().map_err(device_error)?;

            let format = OutputFormat {
                sample_rate: config.sample_rate().0,
                channels: config.channels() as usize,
            };
            if config.sample_format() != cpal::SampleFormat::F32 {
                return Err(device_error(format!(
                    "unsupported device sample format {:?}",
                    config.sample_format()
                )));
            }

            let mut renderer = make_renderer(format);
            let stream = device
                .build_output_stream(
                    &config.into(),
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        renderer.fill_interleaved(data);
                    },
                    |err| error!("Audio stream error: {}", err),
                    None,
                )
                .map_err(device_error)?;
            stream.play().map_err(device_error)?;

            info!(
                "Device output started: {} Hz, {} channel(s)",
                format.sample_rate, format.channels
            );
            Ok(Self {
                format,
                _stream: stream,
            })
        }
    }

    impl AudioOutput for CpalOutput {
        fn format(&self) -> OutputFormat {
            self.format
        }

        fn name(&self) -> &'static str {
            "device"
        }
    }
}
