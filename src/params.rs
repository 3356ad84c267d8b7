//! Effect parameter vector
//!
//! `ParameterSet` is the single control vector driving every unit in the
//! effects graph. It is a plain value: updates replace it wholesale, and both
//! the live graph and the offline renderer take their own copy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};

/// The eleven effect controls
///
/// Values are not validated or clamped here; each unit interprets its own
/// range (the saturation curve clamps distortion, the delay line clamps its
/// time to one second).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSet {
    /// Output level, multiplied with `gain`
    pub volume: f32,
    /// Low shelf gain in dB
    pub bass: f32,
    /// Mid peak gain in dB
    pub mid: f32,
    /// High shelf gain in dB
    pub treble: f32,
    /// Secondary level multiplier
    pub gain: f32,
    /// Convolution branch level
    pub reverb: f32,
    /// Echo delay time in seconds
    pub delay: f32,
    /// Feedback loop gain
    pub echo_feedback: f32,
    /// Saturation intensity (0 to 1)
    pub distortion: f32,
    /// Source speed multiplier
    pub playback_rate: f32,
    /// Source detune in semitones
    pub pitch: f32,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            volume: 0.7,
            bass: 0.0,
            mid: 0.0,
            treble: 0.0,
            gain: 1.0,
            reverb: 0.0,
            delay: 0.0,
            echo_feedback: 0.2,
            distortion: 0.0,
            playback_rate: 1.0,
            pitch: 0.0,
        }
    }
}

impl ParameterSet {
    /// Read a single control by name
    pub fn get(&self, name: ParameterName) -> f32 {
        match name {
            ParameterName::Volume => self.volume,
            ParameterName::Bass => self.bass,
            ParameterName::Mid => self.mid,
            ParameterName::Treble => self.treble,
            ParameterName::Gain => self.gain,
            ParameterName::Reverb => self.reverb,
            ParameterName::Delay => self.delay,
            ParameterName::EchoFeedback => self.echo_feedback,
            ParameterName::Distortion => self.distortion,
            ParameterName::PlaybackRate => self.playback_rate,
            ParameterName::Pitch => self.pitch,
        }
    }

    /// Return a copy with one control replaced
    pub fn with(mut self, name: ParameterName, value: f32) -> Self {
        let slot = match name {
            ParameterName::Volume => &mut self.volume,
            ParameterName::Bass => &mut self.bass,
            ParameterName::Mid => &mut self.mid,
            ParameterName::Treble => &mut self.treble,
            ParameterName::Gain => &mut self.gain,
            ParameterName::Reverb => &mut self.reverb,
            ParameterName::Delay => &mut self.delay,
            ParameterName::EchoFeedback => &mut self.echo_feedback,
            ParameterName::Distortion => &mut self.distortion,
            ParameterName::PlaybackRate => &mut self.playback_rate,
            ParameterName::Pitch => &mut self.pitch,
        };
        *slot = value;
        self
    }

    /// Parse a `name=value` assignment and apply it
    ///
    /// # Errors
    /// * `UnknownParameter` - If the name is not a control or the value is not a number
    pub fn with_assignment(self, assignment: &str) -> Result<Self> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| StudioError::UnknownParameter {
                name: assignment.to_string(),
            })?;
        let name: ParameterName = name.trim().parse()?;
        let value: f32 = value
            .trim()
            .parse()
            .map_err(|_| StudioError::UnknownParameter {
                name: format!("{}={}", name, value.trim()),
            })?;
        Ok(self.with(name, value))
    }
}

/// Names of the controls in a `ParameterSet`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterName {
    Volume,
    Bass,
    Mid,
    Treble,
    Gain,
    Reverb,
    Delay,
    EchoFeedback,
    Distortion,
    PlaybackRate,
    Pitch,
}

impl ParameterName {
    /// All controls in display order
    pub const ALL: [ParameterName; 11] = [
        ParameterName::Volume,
        ParameterName::Bass,
        ParameterName::Mid,
        ParameterName::Treble,
        ParameterName::Gain,
        ParameterName::Reverb,
        ParameterName::Delay,
        ParameterName::EchoFeedback,
        ParameterName::Distortion,
        ParameterName::PlaybackRate,
        ParameterName::Pitch,
    ];

    /// Get the camelCase identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterName::Volume => "volume",
            ParameterName::Bass => "bass",
            ParameterName::Mid => "mid",
            ParameterName::Treble => "treble",
            ParameterName::Gain => "gain",
            ParameterName::Reverb => "reverb",
            ParameterName::Delay => "delay",
            ParameterName::EchoFeedback => "echoFeedback",
            ParameterName::Distortion => "distortion",
            ParameterName::PlaybackRate => "playbackRate",
            ParameterName::Pitch => "pitch",
        }
    }
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterName {
    type Err = StudioError;

    /// Accepts camelCase, snake_case and kebab-case, case-insensitively
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        let name = match normalized.as_str() {
            "volume" => ParameterName::Volume,
            "bass" => ParameterName::Bass,
            "mid" => ParameterName::Mid,
            "treble" => ParameterName::Treble,
            "gain" => ParameterName::Gain,
            "reverb" => ParameterName::Reverb,
            "delay" => ParameterName::Delay,
            "echofeedback" | "feedback" => ParameterName::EchoFeedback,
            "distortion" => ParameterName::Distortion,
            "playbackrate" | "rate" => ParameterName::PlaybackRate,
            "pitch" => ParameterName::Pitch,
            _ => {
                return Err(StudioError::UnknownParameter {
                    name: s.to_string(),
                })
            }
        };
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_normal_preset() {
        let params = ParameterSet::default();
        assert_eq!(params.volume, 0.7);
        assert_eq!(params.gain, 1.0);
        assert_eq!(params.echo_feedback, 0.2);
        assert_eq!(params.playback_rate, 1.0);
    }

    #[test]
    fn test_name_parsing() {
        assert_eq!(
            "echoFeedback".parse::<ParameterName>().unwrap(),
            ParameterName::EchoFeedback
        );
        assert_eq!(
            "echo_feedback".parse::<ParameterName>().unwrap(),
            ParameterName::EchoFeedback
        );
        assert_eq!(
            "PLAYBACK-RATE".parse::<ParameterName>().unwrap(),
            ParameterName::PlaybackRate
        );
        assert!("wobble".parse::<ParameterName>().is_err());
    }

    #[test]
    fn test_every_name_round_trips() {
        for name in ParameterName::ALL {
            assert_eq!(name.as_str().parse::<ParameterName>().unwrap(), name);
        }
    }

    #[test]
    fn test_with_replaces_single_field() {
        let params = ParameterSet::default().with(ParameterName::Bass, 6.0);
        assert_eq!(params.bass, 6.0);
        assert_eq!(params.get(ParameterName::Bass), 6.0);
        assert_eq!(params.mid, 0.0);
    }

    #[test]
    fn test_assignment() {
        let params = ParameterSet::default()
            .with_assignment("reverb=0.4")
            .unwrap();
        assert_eq!(params.reverb, 0.4);

        assert!(ParameterSet::default().with_assignment("reverb").is_err());
        assert!(ParameterSet::default().with_assignment("reverb=lots").is_err());
    }

    #[test]
    fn test_serde_uses_camel_case() {
        let json = serde_json::to_value(ParameterSet::default()).unwrap();
        assert!(json.get("echoFeedback").is_some());
        assert!(json.get("playbackRate").is_some());
    }
}
