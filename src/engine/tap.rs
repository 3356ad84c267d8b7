//! Visualization tap
//!
//! Keeps the most recent window of the live output, down-mixed to mono, for
//! waveform displays. The audio thread only ever `try_lock`s, so a slow
//! reader costs a skipped update rather than a dropout.
//!
//! A closed tap drops writes. Closing happens under the same lock writers
//! take, so once [`VisualizationTap::close`] returns the window stays silent
//! until the tap is opened again.

use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
struct TapBuffer {
    ring: Vec<f32>,
    write_pos: usize,
    open: bool,
}

/// Shared time-domain monitor
#[derive(Debug, Clone)]
pub struct VisualizationTap {
    inner: Arc<Mutex<TapBuffer>>,
    window: usize,
}

impl VisualizationTap {
    /// Create a tap holding `window` samples
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            inner: Arc::new(Mutex::new(TapBuffer {
                ring: vec![0.0; window],
                write_pos: 0,
                open: true,
            })),
            window,
        }
    }

    /// Window length in samples
    pub fn window(&self) -> usize {
        self.window
    }

    /// Push one planar block; skipped if a reader holds the lock
    pub fn write(&self, channels: &[Vec<f32>], frames: usize) {
        let Ok(mut buffer) = self.inner.try_lock() else {
            return;
        };
        if !buffer.open || channels.is_empty() {
            return;
        }

        let scale = 1.0 / channels.len() as f32;
        let len = buffer.ring.len();
        for i in 0..frames {
            let mixed: f32 = channels.iter().map(|c| c[i]).sum::<f32>() * scale;
            let pos = buffer.write_pos;
            buffer.ring[pos] = mixed;
            buffer.write_pos = (pos + 1) % len;
        }
    }

    /// Copy out the window, oldest sample first
    pub fn snapshot(&self) -> Vec<f32> {
        let buffer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let (newer, older) = buffer.ring.split_at(buffer.write_pos);
        older.iter().chain(newer).copied().collect()
    }

    /// Reset to silence
    pub fn clear(&self) {
        let mut buffer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Self::silence(&mut buffer);
    }

    /// Accept writes again
    pub fn open(&self) {
        let mut buffer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.open = true;
    }

    /// Reset to silence and drop writes until reopened
    pub fn close(&self) {
        let mut buffer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.open = false;
        Self::silence(&mut buffer);
    }

    fn silence(buffer: &mut TapBuffer) {
        buffer.ring.iter_mut().for_each(|s| *s = 0.0);
        buffer.write_pos = 0;
    }

    /// Whether the window holds only zeros
    pub fn is_silent(&self) -> bool {
        self.snapshot().iter().all(|&s| s == 0.0)
    }
}

impl Default for VisualizationTap {
    fn default() -> Self {
        Self::new(2048)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_silent() {
        let tap = VisualizationTap::default();
        assert_eq!(tap.window(), 2048);
        assert_eq!(tap.snapshot().len(), 2048);
        assert!(tap.is_silent());
    }

    #[test]
    fn test_keeps_latest_window_in_order() {
        let tap = VisualizationTap::new(4);
        tap.write(&[vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]], 6);
        assert_eq!(tap.snapshot(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_downmixes_channels() {
        let tap = VisualizationTap::new(2);
        tap.write(&[vec![1.0, 0.0], vec![0.0, 0.5]], 2);
        assert_eq!(tap.snapshot(), vec![0.5, 0.25]);
    }

    #[test]
    fn test_clear() {
        let tap = VisualizationTap::new(3);
        let reader = tap.clone();
        tap.write(&[vec![1.0; 3]], 3);
        assert!(!reader.is_silent());
        reader.clear();
        assert!(tap.is_silent());
    }

    #[test]
    fn test_closed_tap_drops_late_writes() {
        let tap = VisualizationTap::new(4);
        tap.write(&[vec![1.0; 4]], 4);
        tap.close();
        assert!(tap.is_silent());

        // A graph still rendering after close
        tap.write(&[vec![1.0; 4]], 4);
        assert!(tap.is_silent());

        tap.open();
        tap.write(&[vec![1.0; 4]], 4);
        assert!(!tap.is_silent());
    }
}
