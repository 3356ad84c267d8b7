//! fxstudio - Interactive Audio Effects Engine
//!
//! Loads a decoded clip, runs it through a fixed effects topology (tone
//! shaping, saturation, feedback echo, convolution reverb), and either
//! monitors the result live or renders it offline to a 16-bit WAV.
//!
//! # Architecture
//!
//! The same graph builder serves two rendering contexts:
//! - Live: a realtime output fed through lock-free command queues, driven by
//!   the play/pause/stop/seek transport
//! - Offline: a private graph rendered to completion for export
//!
//! [`engine::Engine`] is the session object hosts talk to.

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod params;
pub mod presets;

pub use config::{EngineConfig, OutputKind};
pub use engine::{AudioAsset, Engine, OfflineRenderer, PlaybackState, TransportState};
pub use error::{Result, StudioError};
pub use params::{ParameterName, ParameterSet};
pub use presets::{Preset, PresetStore};
