//! Engine session
//!
//! [`Engine`] owns everything one editing session needs: the loaded asset,
//! the authoritative parameter set, the transport, and the lazily opened
//! live context. Hosts drive it through plain method calls plus a periodic
//! [`Engine::tick`].

use std::sync::Arc;

use log::{debug, info};

use crate::config::EngineConfig;
use crate::engine::buffer::AudioAsset;
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::graph::{build_graph, GraphSettings};
use crate::engine::io;
use crate::engine::live::{LiveContext, LiveGraphHandle};
use crate::engine::offline::OfflineRenderer;
use crate::engine::tap::VisualizationTap;
use crate::engine::transport::{PlaybackBackend, PlaybackState, Transport, TransportState};
use crate::engine::wav;
use crate::error::{Result, StudioError};
use crate::params::{ParameterName, ParameterSet};

/// Live backend view over the engine's fields
///
/// Opens the live context on first use.
struct LiveBackend<'a> {
    live: &'a mut Option<LiveContext>,
    config: &'a EngineConfig,
    tap: &'a VisualizationTap,
    asset: Option<&'a Arc<AudioAsset>>,
    params: &'a ParameterSet,
}

impl PlaybackBackend for LiveBackend<'_> {
    fn start(&mut self, offset_secs: f64) -> Result<LiveGraphHandle> {
        let asset = self.asset.ok_or(StudioError::NoAudioLoaded)?.clone();
        if self.live.is_none() {
            *self.live = Some(LiveContext::open(self.config, self.tap.clone())?);
        }
        let live = self.live.as_mut().ok_or_else(|| StudioError::Device {
            reason: "live context unavailable".to_string(),
        })?;

        let graph = build_graph(&*live, asset, self.params, offset_secs);
        live.install(graph)
    }

    fn stop(&mut self, mut handle: LiveGraphHandle) {
        if let Some(live) = self.live.as_mut() {
            if let Err(e) = handle.stop(live) {
                debug!("Ignoring stop: {}", e);
            }
        }
    }
}

/// One interactive effects session
pub struct Engine {
    config: EngineConfig,
    clock: Box<dyn Clock>,
    parameters: ParameterSet,
    asset: Option<Arc<AudioAsset>>,
    transport: Transport,
    live: Option<LiveContext>,
    tap: VisualizationTap,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("parameters", &self.parameters)
            .field("transport", &self.transport)
            .field("live", &self.live)
            .finish()
    }
}

/// Borrow the engine's fields as a playback backend
///
/// A macro rather than a method so the transport can be borrowed alongside.
macro_rules! backend {
    ($engine:expr) => {
        LiveBackend {
            live: &mut $engine.live,
            config: &$engine.config,
            tap: &$engine.tap,
            asset: $engine.asset.as_ref(),
            params: &$engine.parameters,
        }
    };
}

impl Engine {
    /// Create an engine with the system clock
    ///
    /// # Errors
    /// * `InvalidConfig` - If the configuration does not validate
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_clock(config, Box::new(SystemClock))
    }

    /// Create an engine with a custom clock
    pub fn with_clock(config: EngineConfig, clock: Box<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let tap = VisualizationTap::new(config.tap_window);
        Ok(Self {
            config,
            clock,
            parameters: ParameterSet::default(),
            asset: None,
            transport: Transport::new(),
            live: None,
            tap,
        })
    }

    // ========================================================================
    // Assets
    // ========================================================================

    /// Decode WAV bytes and make them the current asset
    ///
    /// On failure the engine is left untouched.
    ///
    /// # Errors
    /// * `InvalidAudio` / `UnsupportedFormat` - From the decoder
    pub fn load_asset(&mut self, bytes: &[u8]) -> Result<()> {
        let asset = io::decode(bytes)?;
        self.load(asset);
        Ok(())
    }

    /// Make an already decoded asset current
    ///
    /// Any live graph is torn down and the transport resets to zero.
    pub fn load(&mut self, asset: AudioAsset) {
        let duration = asset.duration_secs();
        info!(
            "Asset loaded: {:.2}s, {} Hz, {} channel(s)",
            duration,
            asset.sample_rate(),
            asset.channels()
        );
        {
            let mut backend = backend!(self);
            self.transport.load(&mut backend, duration);
        }
        self.asset = Some(Arc::new(asset));
    }

    /// The current asset
    pub fn asset(&self) -> Option<&Arc<AudioAsset>> {
        self.asset.as_ref()
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Start or resume playback
    ///
    /// # Errors
    /// * `NoAudioLoaded` - If no asset is loaded
    /// * `Device` - If the live output cannot be opened
    pub fn play(&mut self) -> Result<()> {
        let now = self.clock.now();
        let mut backend = backend!(self);
        self.transport.play(&mut backend, now)
    }

    /// Pause, keeping the position
    pub fn pause(&mut self) {
        let now = self.clock.now();
        let mut backend = backend!(self);
        self.transport.pause(&mut backend, now);
    }

    /// Stop and rewind
    pub fn stop(&mut self) {
        let mut backend = backend!(self);
        self.transport.stop(&mut backend);
    }

    /// Move the playhead; playback continues from there if it was running
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        let now = self.clock.now();
        let mut backend = backend!(self);
        self.transport.seek(&mut backend, seconds, now)
    }

    /// Poll the transport and free retired live resources
    ///
    /// Hosts call this at their frame or timer cadence while playing.
    pub fn tick(&mut self) -> TransportState {
        let now = self.clock.now();
        let state = {
            let mut backend = backend!(self);
            self.transport.tick(&mut backend, now)
        };
        if let Some(live) = self.live.as_mut() {
            live.collect_retired();
        }
        state
    }

    /// Position in seconds
    pub fn position(&self) -> f64 {
        self.transport.position()
    }

    /// Duration of the current asset in seconds
    pub fn duration(&self) -> f64 {
        self.transport.duration()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.transport.state()
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.snapshot()
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// The authoritative parameter set
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Change one control; the live graph follows at its next quantum
    pub fn update_parameter(&mut self, name: ParameterName, value: f32) -> Result<()> {
        let parameters = self.parameters.with(name, value);
        debug!("Parameter {} = {}", name, value);
        self.set_parameters(parameters)
    }

    /// Change one control by name
    ///
    /// # Errors
    /// * `UnknownParameter` - If `name` is not a control
    pub fn update_parameter_by_name(&mut self, name: &str, value: f32) -> Result<()> {
        let name: ParameterName = name.parse()?;
        self.update_parameter(name, value)
    }

    /// Replace the whole parameter set with a preset's values
    pub fn apply_preset(&mut self, preset: ParameterSet) -> Result<()> {
        self.set_parameters(preset)
    }

    fn set_parameters(&mut self, parameters: ParameterSet) -> Result<()> {
        self.parameters = parameters;
        if let (Some(live), Some(handle)) = (self.live.as_mut(), self.transport.active_graph()) {
            live.apply(handle.id(), GraphSettings::from_parameters(&self.parameters))?;
        }
        Ok(())
    }

    // ========================================================================
    // Rendering & Export
    // ========================================================================

    /// The monitor tap; silent while nothing plays
    pub fn tap(&self) -> &VisualizationTap {
        &self.tap
    }

    /// Render the current asset with the current parameters
    ///
    /// Asset and parameters are snapshotted when called; playback is not
    /// affected.
    ///
    /// # Errors
    /// * `NoAudioLoaded` - If no asset is loaded
    /// * `RenderFailure` - If rendering fails
    pub async fn render_offline(&self) -> Result<AudioAsset> {
        let asset = self.asset.clone().ok_or(StudioError::NoAudioLoaded)?;
        let parameters = self.parameters;
        OfflineRenderer::from_config(&self.config)
            .render(asset, parameters)
            .await
    }

    /// Render and encode as 16-bit PCM WAV
    ///
    /// # Errors
    /// As for [`Engine::render_offline`].
    pub async fn export_wav(&self) -> Result<Vec<u8>> {
        let rendered = self.render_offline().await?;
        let bytes = wav::encode(&rendered)?;
        info!("Exported {} bytes of WAV", bytes.len());
        Ok(bytes)
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
