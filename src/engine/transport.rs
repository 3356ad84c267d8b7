//! Transport state machine
//!
//! Tracks playback state and position for the live graph. Position follows
//! the wall clock from an anchor taken when playback starts, polled by the
//! host through [`Transport::tick`]. Building and tearing down graphs is
//! delegated to a [`PlaybackBackend`], so the state machine itself never
//! touches audio.

use std::fmt;
use std::time::Instant;

use log::{debug, error};

use crate::engine::live::LiveGraphHandle;
use crate::error::{Result, StudioError};

/// Transport states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No asset loaded
    #[default]
    Idle,
    /// Asset loaded, position reset or never started
    Stopped,
    /// A live graph is running
    Playing,
    /// Halted with position preserved
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Stopped => write!(f, "Stopped"),
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Paused => write!(f, "Paused"),
        }
    }
}

/// Snapshot published to the host
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransportState {
    pub is_playing: bool,
    pub position: f64,
    pub duration: f64,
}

/// Starts and stops live graphs on behalf of the transport
pub trait PlaybackBackend {
    /// Build a fresh graph whose source starts at `offset_secs`, and start it
    fn start(&mut self, offset_secs: f64) -> Result<LiveGraphHandle>;

    /// Tear down a graph; an already-stopped handle is not an error
    fn stop(&mut self, handle: LiveGraphHandle);
}

/// The one polling session of a playing transport
#[derive(Debug)]
struct PlaySession {
    /// Wall-clock time playback (re)started
    started: Instant,
    /// Position at `started`
    start_position: f64,
    handle: LiveGraphHandle,
}

impl PlaySession {
    fn elapsed(&self, now: Instant, duration: f64) -> f64 {
        let since = now.saturating_duration_since(self.started).as_secs_f64();
        (self.start_position + since).min(duration)
    }
}

/// Play/pause/stop/seek state machine
#[derive(Debug, Default)]
pub struct Transport {
    state: PlaybackState,
    /// Position in seconds; not clamped on seek
    position: f64,
    duration: f64,
    session: Option<PlaySession>,
}

impl Transport {
    /// Create an idle transport
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Last published position in seconds
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Snapshot for the host
    pub fn snapshot(&self) -> TransportState {
        TransportState {
            is_playing: self.is_playing(),
            position: self.position,
            duration: self.duration,
        }
    }

    /// Handle of the running graph, if any
    pub fn active_graph(&self) -> Option<&LiveGraphHandle> {
        self.session.as_ref().map(|s| &s.handle)
    }

    // ========================================================================
    // Controls
    // ========================================================================

    /// A new asset was loaded
    ///
    /// Tears down any live graph and resets to Stopped at zero.
    pub fn load<B: PlaybackBackend>(&mut self, backend: &mut B, duration: f64) {
        self.cancel_session(backend);
        self.state = PlaybackState::Stopped;
        self.position = 0.0;
        self.duration = duration;
        debug!("[TRANSPORT] Loaded, duration {:.3}s", duration);
    }

    /// Start playback from the current position
    ///
    /// No-op while already playing.
    ///
    /// # Errors
    /// * `NoAudioLoaded` - If nothing was loaded
    /// * Any backend error; the transport is left Stopped at zero
    pub fn play<B: PlaybackBackend>(&mut self, backend: &mut B, now: Instant) -> Result<()> {
        match self.state {
            PlaybackState::Idle => return Err(StudioError::NoAudioLoaded),
            PlaybackState::Playing => {
                debug!("[TRANSPORT] Already playing");
                return Ok(());
            }
            PlaybackState::Stopped | PlaybackState::Paused => {}
        }

        // Never two sessions at once
        self.cancel_session(backend);

        match backend.start(self.position) {
            Ok(handle) => {
                self.session = Some(PlaySession {
                    started: now,
                    start_position: self.position,
                    handle,
                });
                self.state = PlaybackState::Playing;
                debug!("[TRANSPORT] Play from {:.3}s", self.position);
                Ok(())
            }
            Err(e) => {
                error!("[TRANSPORT] Failed to start playback: {}", e);
                self.state = PlaybackState::Stopped;
                self.position = 0.0;
                Err(e)
            }
        }
    }

    /// Pause, keeping the position
    pub fn pause<B: PlaybackBackend>(&mut self, backend: &mut B, now: Instant) {
        if self.state != PlaybackState::Playing {
            debug!("[TRANSPORT] Pause ignored in state {}", self.state);
            return;
        }
        if let Some(session) = &self.session {
            self.position = session.elapsed(now, self.duration);
        }
        self.cancel_session(backend);
        self.state = PlaybackState::Paused;
        debug!("[TRANSPORT] Paused at {:.3}s", self.position);
    }

    /// Stop and rewind to zero
    pub fn stop<B: PlaybackBackend>(&mut self, backend: &mut B) {
        self.cancel_session(backend);
        self.position = 0.0;
        if self.state != PlaybackState::Idle {
            self.state = PlaybackState::Stopped;
        }
        debug!("[TRANSPORT] Stopped, position reset to 0");
    }

    /// Move the position; playback restarts there if it was running
    ///
    /// The position is not clamped to the duration.
    ///
    /// # Errors
    /// Errors from restarting playback, as for [`Transport::play`].
    pub fn seek<B: PlaybackBackend>(
        &mut self,
        backend: &mut B,
        seconds: f64,
        now: Instant,
    ) -> Result<()> {
        let was_playing = self.is_playing();
        if was_playing {
            self.pause(backend, now);
        }
        self.position = seconds;
        debug!("[TRANSPORT] Seek to {:.3}s", seconds);
        if was_playing {
            self.play(backend, now)?;
        }
        Ok(())
    }

    /// Poll once: publish the elapsed position, stop at the end
    ///
    /// The end is reached when the elapsed time hits the duration or the
    /// source signals completion, whichever comes first.
    pub fn tick<B: PlaybackBackend>(&mut self, backend: &mut B, now: Instant) -> TransportState {
        let Some(session) = &self.session else {
            return self.snapshot();
        };

        let elapsed = session.elapsed(now, self.duration);
        if elapsed >= self.duration || session.handle.has_completed() {
            debug!("[TRANSPORT] Reached end of media");
            self.stop(backend);
        } else {
            self.position = elapsed;
        }
        self.snapshot()
    }

    /// Take the session, if any, and stop its graph
    fn cancel_session<B: PlaybackBackend>(&mut self, backend: &mut B) {
        if let Some(session) = self.session.take() {
            backend.stop(session.handle);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
