//! Built-in preset table
//!
//! A read-only list of named parameter sets. Applying a preset replaces the
//! engine's `ParameterSet` wholesale; preset values are not validated.

use serde::{Deserialize, Serialize};

use crate::params::ParameterSet;

/// A named parameter set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub controls: ParameterSet,
}

/// Read-only store of presets
#[derive(Debug, Clone)]
pub struct PresetStore {
    presets: Vec<Preset>,
}

impl PresetStore {
    /// The built-in preset table; "Normal" is first
    pub fn builtin() -> Self {
        let preset = |name: &str, controls: ParameterSet| Preset {
            name: name.to_string(),
            controls,
        };

        Self {
            presets: vec![
                preset("Normal", ParameterSet::default()),
                preset(
                    "LoFi",
                    ParameterSet {
                        volume: 0.6,
                        bass: 2.0,
                        mid: -2.0,
                        treble: -4.0,
                        gain: 1.0,
                        reverb: 0.25,
                        delay: 0.08,
                        echo_feedback: 0.15,
                        distortion: 0.25,
                        playback_rate: 0.9,
                        pitch: -2.0,
                    },
                ),
                preset(
                    "Deep Bass",
                    ParameterSet {
                        volume: 0.8,
                        bass: 9.0,
                        mid: 1.0,
                        treble: -1.0,
                        gain: 1.1,
                        reverb: 0.1,
                        delay: 0.05,
                        echo_feedback: 0.2,
                        distortion: 0.1,
                        playback_rate: 1.0,
                        pitch: -1.0,
                    },
                ),
                preset(
                    "Chipmunk",
                    ParameterSet {
                        volume: 0.7,
                        bass: -3.0,
                        mid: 1.0,
                        treble: 5.0,
                        gain: 1.0,
                        reverb: 0.05,
                        delay: 0.0,
                        echo_feedback: 0.05,
                        distortion: 0.0,
                        playback_rate: 1.3,
                        pitch: 6.0,
                    },
                ),
                preset(
                    "Robot",
                    ParameterSet {
                        volume: 0.75,
                        bass: -1.0,
                        mid: 2.0,
                        treble: -2.0,
                        gain: 1.2,
                        reverb: 0.2,
                        delay: 0.12,
                        echo_feedback: 0.35,
                        distortion: 0.5,
                        playback_rate: 0.85,
                        pitch: -4.0,
                    },
                ),
                preset(
                    "Stadium Echo",
                    ParameterSet {
                        volume: 0.7,
                        bass: 2.0,
                        mid: 0.0,
                        treble: 2.0,
                        gain: 1.0,
                        reverb: 0.6,
                        delay: 0.25,
                        echo_feedback: 0.55,
                        distortion: 0.05,
                        playback_rate: 1.0,
                        pitch: 0.0,
                    },
                ),
            ],
        }
    }

    /// All presets in table order
    pub fn list(&self) -> &[Preset] {
        &self.presets
    }

    /// Find a preset by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&Preset> {
        self.presets
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// The preset used on reset
    pub fn default_preset(&self) -> &Preset {
        &self.presets[0]
    }
}

impl Default for PresetStore {
    fn default() -> Self {
        Self::builtin()
    }
}
