//! Frame-level speech classifier.
//!
//! Each band's log energy is scored against a fixed noise Gaussian and a
//! fixed speech Gaussian. A frame is speech when the summed log-likelihood
//! ratio exceeds the mode's global threshold, or when any single band is
//! decisive on its own. Frames whose mean square is below
//! [`MIN_ENERGY`] are always non-speech.

use crate::features::{FeatureExtractor, NUM_BANDS};
use crate::{VALID_FRAME_MS, VALID_RATES, VadError};

/// Mean-square floor, in int16 units squared, below which a frame is never
/// speech.
pub const MIN_ENERGY: f32 = 10.0;

// Model means and standard deviations per band, dB re 1 LSB^2.
const NOISE_MEANS: [f32; NUM_BANDS] = [30.0, 28.0, 26.0, 24.0, 22.0, 21.0];
const NOISE_STDS: [f32; NUM_BANDS] = [9.0; NUM_BANDS];
const SPEECH_MEANS: [f32; NUM_BANDS] = [52.0, 56.0, 54.0, 48.0, 42.0, 38.0];
const SPEECH_STDS: [f32; NUM_BANDS] = [12.0; NUM_BANDS];

// Indexed by mode.
const GLOBAL_THRESHOLDS: [f32; 4] = [1.0, 3.0, 6.0, 9.0];
const LOCAL_THRESHOLDS: [f32; 4] = [3.0, 3.5, 4.5, 5.5];

/// Aggressiveness at rejecting non-speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VadMode {
    /// Most permissive.
    Quality,
    LowBitrate,
    #[default]
    Aggressive,
    /// Most aggressive at rejecting non-speech.
    VeryAggressive,
}

impl VadMode {
    fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<i32> for VadMode {
    type Error = VadError;

    fn try_from(mode: i32) -> Result<Self, Self::Error> {
        match mode {
            0 => Ok(Self::Quality),
            1 => Ok(Self::LowBitrate),
            2 => Ok(Self::Aggressive),
            3 => Ok(Self::VeryAggressive),
            _ => Err(VadError::InvalidMode(mode)),
        }
    }
}

impl From<VadMode> for i32 {
    fn from(mode: VadMode) -> Self {
        mode as Self
    }
}

#[inline]
fn log_gaussian(x: f32, mean: f32, std: f32) -> f32 {
    let z = (x - mean) / std;
    -std.ln() - 0.5 * z * z
}

/// Stateless-per-frame voice activity detector.
#[derive(Debug, Default)]
pub struct Vad {
    mode: VadMode,
    features: FeatureExtractor,
}

impl Vad {
    pub fn new(mode: VadMode) -> Self {
        Self {
            mode,
            features: FeatureExtractor::default(),
        }
    }

    pub fn mode(&self) -> VadMode {
        self.mode
    }

    /// Sets the mode from its integer form, `0..=3`.
    pub fn set_mode(&mut self, mode: i32) -> Result<(), VadError> {
        self.mode = VadMode::try_from(mode)?;
        Ok(())
    }

    /// True when `frame_length` samples are exactly 10, 20 or 30 ms at one
    /// of 8, 16 or 32 kHz.
    pub fn is_valid_config(sample_rate_hz: u32, frame_length: usize) -> bool {
        VALID_RATES.contains(&sample_rate_hz)
            && VALID_FRAME_MS
                .iter()
                .any(|&ms| (sample_rate_hz * ms / 1000) as usize == frame_length)
    }

    /// Classifies one frame.
    pub fn is_speech(&mut self, frame: &[i16], sample_rate_hz: u32) -> Result<bool, VadError> {
        if !Self::is_valid_config(sample_rate_hz, frame.len()) {
            return Err(VadError::InvalidConfig {
                rate: sample_rate_hz,
                len: frame.len(),
            });
        }
        let features = self.features.extract(frame, sample_rate_hz);
        if features.energy < MIN_ENERGY {
            return Ok(false);
        }

        let mode = self.mode.index();
        let mut total = 0.0f32;
        let mut decisive_band = false;
        for (band, &x) in features.log_energy.iter().enumerate() {
            let llr = log_gaussian(x, SPEECH_MEANS[band], SPEECH_STDS[band])
                - log_gaussian(x, NOISE_MEANS[band], NOISE_STDS[band]);
            total += llr;
            decisive_band |= llr > LOCAL_THRESHOLDS[mode];
        }
        Ok(decisive_band || total > GLOBAL_THRESHOLDS[mode])
    }

    /// Integer form of [`Self::is_speech`]: `1` speech, `0` non-speech,
    /// `-1` invalid configuration.
    pub fn process(&mut self, sample_rate_hz: u32, frame: &[i16]) -> i32 {
        match self.is_speech(frame, sample_rate_hz) {
            Ok(true) => 1,
            Ok(false) => 0,
            Err(_) => -1,
        }
    }
}
