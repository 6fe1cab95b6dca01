#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

use std::fmt;

mod features;
mod standalone_vad;
mod vad;
mod voice_activity_detector;

pub use standalone_vad::{NON_SPEECH_PROBABILITY, SPEECH_PROBABILITY, StandaloneVad};
pub use vad::{MIN_ENERGY, Vad, VadMode};
pub use voice_activity_detector::VoiceActivityDetector;

/// Valid frame durations in milliseconds.
pub const VALID_FRAME_MS: [u32; 3] = [10, 20, 30];

/// Sample rates accepted by [`Vad`].
pub const VALID_RATES: [u32; 3] = [8000, 16000, 32000];

/// Errors reported by the voice activity detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadError {
    /// Mode outside `0..=3`.
    InvalidMode(i32),
    /// Rate / frame length combination not accepted by [`Vad::is_valid_config`].
    InvalidConfig { rate: u32, len: usize },
    /// [`StandaloneVad::add_audio`] requires exactly one 10 ms chunk.
    WrongChunkLength { expected: usize, actual: usize },
    /// The output slice is shorter than the number of buffered chunks.
    ActivityLengthMismatch { needed: usize, available: usize },
    /// [`StandaloneVad::get_activity`] was called with nothing buffered.
    NoAudio,
}

impl fmt::Display for VadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMode(mode) => write!(f, "invalid VAD mode {mode}, expected 0..=3"),
            Self::InvalidConfig { rate, len } => write!(
                f,
                "invalid VAD frame: {len} samples at {rate} Hz (need 10/20/30 ms at 8/16/32 kHz)"
            ),
            Self::WrongChunkLength { expected, actual } => {
                write!(f, "expected a chunk of {expected} samples, got {actual}")
            }
            Self::ActivityLengthMismatch { needed, available } => write!(
                f,
                "{needed} chunks buffered but room for only {available} probabilities"
            ),
            Self::NoAudio => write!(f, "no audio buffered"),
        }
    }
}

impl std::error::Error for VadError {}
