//! Audio Engine Module
//!
//! Everything above the DSP units:
//! - Decoded assets and WAV encoding
//! - The effects graph and the contexts it renders on
//! - Live output, transport state machine, offline rendering
//! - The `Engine` session tying them together

pub mod buffer;
pub mod clock;
pub mod context;
pub mod graph;
pub mod io;
pub mod live;
pub mod offline;
pub mod output;
pub mod session;
pub mod tap;
pub mod transport;
pub mod wav;

pub use buffer::{linear_to_db, peak_level, rms_level, AudioAsset};
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{OfflineContext, RenderContext};
pub use graph::{build_graph, EffectsGraph, GraphSettings};
pub use io::{decode, generate_test_tone, load_file};
pub use live::{AlreadyStopped, GraphId, LiveContext, LiveGraphHandle};
pub use offline::OfflineRenderer;
pub use output::{AudioOutput, NullOutput, OutputFormat};
pub use session::Engine;
pub use tap::VisualizationTap;
pub use transport::{PlaybackBackend, PlaybackState, Transport, TransportState};
