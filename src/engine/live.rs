//! Live rendering
//!
//! The control side ([`LiveContext`]) and the audio side ([`LiveRenderer`])
//! share nothing but two lock-free rings. Commands flow to the audio side;
//! graphs and settings it no longer needs flow back so they are freed on
//! the control thread. Each installed graph gets a fresh [`GraphId`], and a
//! command naming any other id is ignored.

use std::fmt;

use log::{debug, info, warn};
use rtrb::{Consumer, Producer, RingBuffer};
use thiserror::Error;

use crate::config::{EngineConfig, OutputKind};
use crate::dsp::impulse::ImpulseSynthesizer;
use crate::dsp::source::CompletionSignal;
use crate::engine::context::RenderContext;
use crate::engine::graph::{EffectsGraph, GraphSettings};
use crate::engine::output::{AudioOutput, NullOutput, OutputFormat};
use crate::engine::tap::VisualizationTap;
use crate::error::{Result, StudioError};

const COMMAND_QUEUE_SIZE: usize = 64;
const RETIRED_QUEUE_SIZE: usize = 64;

/// Generation tag of one live graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphId(u64);

impl GraphId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Control-to-audio messages
pub(crate) enum Command {
    Install {
        id: GraphId,
        graph: Box<EffectsGraph>,
    },
    Apply {
        id: GraphId,
        settings: Box<GraphSettings>,
    },
    Remove {
        id: GraphId,
    },
}

/// Values handed back for deallocation
pub(crate) enum Retired {
    Graph(Box<EffectsGraph>),
    Settings(Box<GraphSettings>),
}

// ============================================================================
// Audio side
// ============================================================================

/// Runs inside the output callback
pub struct LiveRenderer {
    commands: Consumer<Command>,
    retired: Producer<Retired>,
    active: Option<(GraphId, Box<EffectsGraph>)>,
    /// Last rendered quantum
    block: Vec<Vec<f32>>,
    /// Frames of `block` already handed out
    cursor: usize,
    channels: usize,
}

impl LiveRenderer {
    pub(crate) fn new(
        commands: Consumer<Command>,
        retired: Producer<Retired>,
        channels: usize,
        block_size: usize,
    ) -> Self {
        Self {
            commands,
            retired,
            active: None,
            block: vec![vec![0.0; block_size]; channels],
            cursor: block_size,
            channels,
        }
    }

    /// Id of the graph currently rendering
    pub fn active_id(&self) -> Option<GraphId> {
        self.active.as_ref().map(|(id, _)| *id)
    }

    fn retire(&mut self, item: Retired) {
        // Only dropped here if the control side has stopped collecting
        let _ = self.retired.push(item);
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                Command::Install { id, graph } => {
                    if let Some((_, old)) = self.active.replace((id, graph)) {
                        self.retire(Retired::Graph(old));
                    }
                    // Start the new graph on a fresh quantum
                    self.cursor = self.block.first().map(Vec::len).unwrap_or(0);
                }
                Command::Apply { id, mut settings } => {
                    // After the swap the box holds the previous settings
                    if let Some((active, graph)) = self.active.as_mut() {
                        if *active == id {
                            graph.swap_settings(&mut settings);
                        }
                    }
                    self.retire(Retired::Settings(settings));
                }
                Command::Remove { id } => {
                    if self.active_id() == Some(id) {
                        if let Some((_, graph)) = self.active.take() {
                            self.retire(Retired::Graph(graph));
                        }
                    }
                }
            }
        }
    }

    /// Fill an interleaved device buffer
    ///
    /// Commands are applied first. The graph renders whole quanta; leftover
    /// frames carry over to the next call. Without a graph the output is
    /// silent.
    pub fn fill_interleaved(&mut self, data: &mut [f32]) {
        self.drain_commands();

        let channels = self.channels.max(1);
        let block_size = self.block.first().map(Vec::len).unwrap_or(0);
        for frame in data.chunks_mut(channels) {
            if self.cursor >= block_size {
                match self.active.as_mut() {
                    Some((_, graph)) => graph.render_quantum(&mut self.block),
                    None => self.block.iter_mut().for_each(|c| c.fill(0.0)),
                }
                self.cursor = 0;
            }
            for (slot, channel) in frame.iter_mut().zip(&self.block) {
                *slot = channel[self.cursor];
            }
            self.cursor += 1;
        }
    }
}

// ============================================================================
// Control side
// ============================================================================

/// Returned when stopping a graph that was already stopped
#[derive(Debug, Error)]
#[error("live graph {0} already stopped")]
pub struct AlreadyStopped(pub GraphId);

/// Control-side reference to an installed graph
#[derive(Debug)]
pub struct LiveGraphHandle {
    id: GraphId,
    completion: CompletionSignal,
    stopped: bool,
}

impl LiveGraphHandle {
    pub(crate) fn new(id: GraphId, completion: CompletionSignal) -> Self {
        Self {
            id,
            completion,
            stopped: false,
        }
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Whether the source reached the end of the asset
    pub fn has_completed(&self) -> bool {
        self.completion.is_raised()
    }

    /// Remove the graph from the live context
    ///
    /// # Errors
    /// * `AlreadyStopped` - If this handle was stopped before
    pub fn stop(&mut self, ctx: &mut LiveContext) -> std::result::Result<(), AlreadyStopped> {
        if self.stopped {
            return Err(AlreadyStopped(self.id));
        }
        self.stopped = true;
        if let Err(e) = ctx.remove(self.id) {
            warn!("Failed to remove live graph {}: {}", self.id, e);
        }
        Ok(())
    }
}

/// The process-wide live backend of one engine
pub struct LiveContext {
    format: OutputFormat,
    block_size: usize,
    impulse: ImpulseSynthesizer,
    tap: VisualizationTap,
    commands: Producer<Command>,
    retired: Consumer<Retired>,
    next_id: u64,
    /// Graph most recently installed and not yet removed
    installed: Option<GraphId>,
    output: Box<dyn AudioOutput>,
}

impl fmt::Debug for LiveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveContext")
            .field("format", &self.format)
            .field("block_size", &self.block_size)
            .field("output", &self.output.name())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl LiveContext {
    /// Open the configured output and start rendering silence
    ///
    /// # Errors
    /// * `Device` - If the device cannot be opened, or the crate was built
    ///   without the `device` feature and a device output was requested
    /// * `Io` - If the headless thread cannot be spawned
    pub fn open(config: &EngineConfig, tap: VisualizationTap) -> Result<Self> {
        let (commands, command_rx) = RingBuffer::<Command>::new(COMMAND_QUEUE_SIZE);
        let (retired_tx, retired) = RingBuffer::<Retired>::new(RETIRED_QUEUE_SIZE);
        let block_size = config.block_size;
        let make_renderer = move |format: OutputFormat| {
            LiveRenderer::new(command_rx, retired_tx, format.channels, block_size)
        };

        let output: Box<dyn AudioOutput> = match config.output {
            OutputKind::Null => Box::new(NullOutput::start(
                OutputFormat {
                    sample_rate: config.live_sample_rate,
                    channels: config.live_channels,
                },
                make_renderer,
            )?),
            OutputKind::Device => open_device(make_renderer)?,
        };

        let format = output.format();
        info!(
            "Live context opened on {} output: {} Hz, {} channel(s)",
            output.name(),
            format.sample_rate,
            format.channels
        );

        Ok(Self {
            format,
            block_size,
            impulse: ImpulseSynthesizer::new(config.impulse_seed),
            tap,
            commands,
            retired,
            next_id: 0,
            installed: None,
            output,
        })
    }

    /// Output format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn send(&mut self, command: Command) -> Result<()> {
        self.commands.push(command).map_err(|_| StudioError::Device {
            reason: "live command queue is full".to_string(),
        })
    }

    /// Hand a graph to the audio side, replacing any active graph
    ///
    /// Opens the monitor tap.
    pub fn install(&mut self, graph: EffectsGraph) -> Result<LiveGraphHandle> {
        self.collect_retired();
        self.next_id += 1;
        let id = GraphId::new(self.next_id);
        let completion = graph.completion().clone();
        self.send(Command::Install {
            id,
            graph: Box::new(graph),
        })?;
        self.installed = Some(id);
        self.tap.open();
        debug!("Installed live graph {}", id);
        Ok(LiveGraphHandle::new(id, completion))
    }

    /// Retune the graph `id` at the next quantum
    pub fn apply(&mut self, id: GraphId, settings: GraphSettings) -> Result<()> {
        self.collect_retired();
        self.send(Command::Apply {
            id,
            settings: Box::new(settings),
        })
    }

    /// Remove the graph `id`
    ///
    /// Removing the installed graph closes the monitor tap, so it reads
    /// silent even before the audio side drops the graph.
    pub fn remove(&mut self, id: GraphId) -> Result<()> {
        self.collect_retired();
        if self.installed == Some(id) {
            self.installed = None;
            self.tap.close();
        }
        self.send(Command::Remove { id })?;
        debug!("Removed live graph {}", id);
        Ok(())
    }

    /// Free everything the audio side has handed back
    pub fn collect_retired(&mut self) -> usize {
        let mut count = 0;
        while let Ok(item) = self.retired.pop() {
            drop(item);
            count += 1;
        }
        count
    }

    /// The monitor tap fed by live graphs
    pub fn tap(&self) -> &VisualizationTap {
        &self.tap
    }
}

impl RenderContext for LiveContext {
    fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    fn channel_count(&self) -> usize {
        self.format.channels
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn monitor_tap(&self) -> Option<VisualizationTap> {
        Some(self.tap.clone())
    }

    fn impulse_synthesizer(&self) -> ImpulseSynthesizer {
        self.impulse
    }
}

#[cfg(feature = "device")]
fn open_device<F>(make_renderer: F) -> Result<Box<dyn AudioOutput>>
where
    F: FnOnce(OutputFormat) -> LiveRenderer,
{
    Ok(Box::new(crate::engine::output::CpalOutput::start(
        make_renderer,
    )?))
}

#[cfg(not(feature = "device"))]
fn open_device<F>(_make_renderer: F) -> Result<Box<dyn AudioOutput>>
where
    F: FnOnce(OutputFormat) -> LiveRenderer,
{
    Err(StudioError::Device {
        reason: "built without the `device` feature".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::AudioAsset;
    use crate::engine::context::OfflineContext;
    use crate::engine::graph::build_graph;
    use crate::params::{ParameterName, ParameterSet};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    struct Harness {
        commands: Producer<Command>,
        retired: Consumer<Retired>,
        renderer: LiveRenderer,
    }

    fn harness(channels: usize, block_size: usize) -> Harness {
        let (commands, command_rx) = RingBuffer::new(8);
        let (retired_tx, retired) = RingBuffer::new(8);
        Harness {
            commands,
            retired,
            renderer: LiveRenderer::new(command_rx, retired_tx, channels, block_size),
        }
    }

    fn graph(frames: usize) -> EffectsGraph {
        let ctx = OfflineContext::new(2, frames, 8000, 128, ImpulseSynthesizer::new(Some(9)));
        let asset = Arc::new(AudioAsset::new(vec![vec![0.5; frames]], 8000).unwrap());
        build_graph(&ctx, asset, &ParameterSet::default(), 0.0)
    }

    #[test]
    fn test_silent_without_graph() {
        let mut h = harness(2, 128);
        let mut data = vec![1.0; 300];
        h.renderer.fill_interleaved(&mut data);
        assert!(data.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_install_renders_across_odd_callback_sizes() {
        let mut h = harness(2, 128);
        assert!(h
            .commands
            .push(Command::Install {
                id: GraphId(1),
                graph: Box::new(graph(4000)),
            })
            .is_ok());

        let mut first = vec![0.0; 2 * 100];
        h.renderer.fill_interleaved(&mut first);
        let mut second = vec![0.0; 2 * 300];
        h.renderer.fill_interleaved(&mut second);

        assert_eq!(h.renderer.active_id(), Some(GraphId(1)));
        assert!(second.iter().any(|&s| s != 0.0));
        // Stereo frames carry identical samples for a mono asset
        assert!(second.chunks(2).all(|f| f[0] == f[1]));
    }

    #[test]
    fn test_stale_apply_is_ignored_and_returned() {
        let mut h = harness(2, 128);
        let g = graph(1000);
        let before = g.settings().clone();
        assert!(h
            .commands
            .push(Command::Install {
                id: GraphId(2),
                graph: Box::new(g),
            })
            .is_ok());
        let louder = ParameterSet::default().with(ParameterName::Volume, 1.0);
        assert!(h
            .commands
            .push(Command::Apply {
                id: GraphId(1),
                settings: Box::new(GraphSettings::from_parameters(&louder)),
            })
            .is_ok());

        let mut data = vec![0.0; 256];
        h.renderer.fill_interleaved(&mut data);

        match h.retired.pop() {
            Ok(Retired::Settings(settings)) => assert_eq!(settings.output_gain, 1.0),
            _ => panic!("expected the stale settings back"),
        }
        match h.renderer.active.as_ref() {
            Some((_, graph)) => assert_eq!(graph.settings(), &before),
            None => panic!("graph should still be active"),
        }
    }

    #[test]
    fn test_remove_retires_graph() {
        let mut h = harness(2, 128);
        assert!(h
            .commands
            .push(Command::Install {
                id: GraphId(3),
                graph: Box::new(graph(1000)),
            })
            .is_ok());
        assert!(h.commands.push(Command::Remove { id: GraphId(3) }).is_ok());

        let mut data = vec![0.0; 64];
        h.renderer.fill_interleaved(&mut data);
        assert_eq!(h.renderer.active_id(), None);
        assert!(matches!(h.retired.pop(), Ok(Retired::Graph(_))));
    }

    #[test]
    fn test_handle_stop_twice_reports_already_stopped() {
        let config = EngineConfig {
            live_sample_rate: 8000,
            live_channels: 1,
            ..EngineConfig::default()
        };
        let mut ctx = LiveContext::open(&config, VisualizationTap::new(64)).unwrap();
        let mut handle = LiveGraphHandle::new(GraphId(42), CompletionSignal::new());
        assert!(handle.stop(&mut ctx).is_ok());
        assert!(handle.stop(&mut ctx).is_err());
    }

    #[test]
    fn test_remove_silences_tap_before_audio_side_catches_up() {
        let config = EngineConfig {
            live_sample_rate: 8000,
            live_channels: 2,
            block_size: 128,
            ..EngineConfig::default()
        };
        let tap = VisualizationTap::new(64);
        let mut ctx = LiveContext::open(&config, tap.clone()).unwrap();

        let asset = Arc::new(AudioAsset::new(vec![vec![0.5; 80000]], 8000).unwrap());
        let graph = build_graph(&ctx, asset, &ParameterSet::default(), 0.0);
        let mut handle = ctx.install(graph).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while tap.is_silent() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!tap.is_silent());

        assert!(handle.stop(&mut ctx).is_ok());
        for _ in 0..10 {
            assert!(tap.is_silent());
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_null_output_plays_to_completion() {
        let config = EngineConfig {
            live_sample_rate: 8000,
            live_channels: 2,
            block_size: 128,
            ..EngineConfig::default()
        };
        let tap = VisualizationTap::new(64);
        let mut ctx = LiveContext::open(&config, tap.clone()).unwrap();

        let asset = Arc::new(AudioAsset::new(vec![vec![0.5; 400]], 8000).unwrap());
        let graph = build_graph(&ctx, asset, &ParameterSet::default(), 0.0);
        let handle = ctx.install(graph).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !handle.has_completed() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.has_completed());
        assert!(!tap.is_silent());
    }

    #[cfg(not(feature = "device"))]
    #[test]
    fn test_device_output_requires_feature() {
        let config = EngineConfig {
            output: OutputKind::Device,
            ..EngineConfig::default()
        };
        let err = LiveContext::open(&config, VisualizationTap::default()).unwrap_err();
        assert_eq!(err.error_code(), "DEVICE_ERROR");
    }
}
