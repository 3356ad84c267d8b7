//! Feedback delay unit
//!
//! A delay line wired to itself through a feedback gain, tapped by a send
//! gain. The line holds at most one second and never delays by less than a
//! single sample, which keeps the feedback loop causal.

/// Longest supported delay in seconds
pub const MAX_DELAY_SECONDS: f64 = 1.0;

/// Per-channel circular delay line with fractional reads
#[derive(Debug, Clone)]
pub struct FeedbackDelay {
    /// One circular buffer per channel
    lines: Vec<Vec<f32>>,
    /// Next write index, shared by all channels
    write_pos: usize,
    sample_rate: f64,
    /// Delay time in seconds (clamped to 0-1)
    delay_time: f32,
    /// Gain of the loop back into the line
    feedback: f32,
    /// Gain applied to the delayed signal on its way out
    send: f32,
}

impl FeedbackDelay {
    /// Create a delay for `channels` channels at `sample_rate`
    ///
    /// # Arguments
    /// * `sample_rate` - Context sample rate in Hz
    /// * `channels` - Number of channels processed
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        let capacity = (sample_rate as f64 * MAX_DELAY_SECONDS).ceil() as usize + 2;
        Self {
            lines: vec![vec![0.0; capacity]; channels],
            write_pos: 0,
            sample_rate: sample_rate as f64,
            delay_time: 0.0,
            feedback: 0.0,
            send: 0.0,
        }
    }

    /// Set delay time in seconds
    ///
    /// # Arguments
    /// * `seconds` - Delay time (clamped to 0-1)
    pub fn set_delay_time(&mut self, seconds: f32) {
        self.delay_time = seconds.clamp(0.0, MAX_DELAY_SECONDS as f32);
    }

    /// Get delay time in seconds
    pub fn delay_time(&self) -> f32 {
        self.delay_time
    }

    /// Set feedback loop gain (unclamped)
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback;
    }

    /// Get feedback loop gain
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Set the output send gain
    pub fn set_send(&mut self, send: f32) {
        self.send = send;
    }

    /// Get the output send gain
    pub fn send(&self) -> f32 {
        self.send
    }

    /// Delay in samples, at least one
    fn delay_samples(&self) -> f64 {
        (self.delay_time as f64 * self.sample_rate).max(1.0)
    }

    /// Run one block; `output` receives the delayed signal times the send gain
    pub fn process(&mut self, input: &[Vec<f32>], output: &mut [Vec<f32>], frames: usize) {
        let delay = self.delay_samples();
        let start = self.write_pos;

        for ((line, src), dst) in self.lines.iter_mut().zip(input).zip(output.iter_mut()) {
            let len = line.len();
            let mut write_pos = start;
            for (x, y) in src[..frames].iter().zip(dst[..frames].iter_mut()) {
                let delayed = read_fractional(line, write_pos, delay);
                line[write_pos] = *x + self.feedback * delayed;
                *y = delayed * self.send;
                write_pos = (write_pos + 1) % len;
            }
        }

        if let Some(len) = self.lines.first().map(Vec::len) {
            self.write_pos = (start + frames) % len;
        }
    }
}

/// Read the sample written `delay` samples before `write_pos`
#[inline]
fn read_fractional(line: &[f32], write_pos: usize, delay: f64) -> f32 {
    let len = line.len() as f64;
    let mut pos = write_pos as f64 - delay;
    if pos < 0.0 {
        pos += len;
    }

    let index = pos.floor() as usize % line.len();
    let next = (index + 1) % line.len();
    let frac = (pos - pos.floor()) as f32;
    line[index] + (line[next] - line[index]) * frac
}
