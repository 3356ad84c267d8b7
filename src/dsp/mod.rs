//! DSP units
//!
//! The processing units the effects graph is wired from, plus the two
//! synthesizers that feed them (saturation curve and reverb impulse).
//! Every unit processes planar blocks (`&[Vec<f32>]`, one Vec per channel)
//! and keeps per-channel state.

pub mod biquad;
pub mod convolver;
pub mod curve;
pub mod delay;
pub mod impulse;
pub mod source;
pub mod waveshaper;

pub use biquad::{BiquadCoeffs, BiquadState, FilterType, ToneFilter};
pub use convolver::Convolver;
pub use curve::{synthesize_curve, CURVE_LENGTH};
pub use delay::FeedbackDelay;
pub use impulse::{ImpulseResponse, ImpulseSynthesizer};
pub use source::{BufferSource, CompletionSignal};
pub use waveshaper::{Oversample, WaveShaper};
