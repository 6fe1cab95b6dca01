//! Rolling voice probability with per-chunk history.

use std::vec::Drain;

use clarion_common_audio::resampler::Resampler;

use crate::VadError;
use crate::standalone_vad::{CHUNK_LEN, SAMPLE_RATE_HZ, StandaloneVad};

/// Initial probability, before any audio has been seen.
const DEFAULT_VOICE_PROBABILITY: f64 = 1.0;
const LOW_PROBABILITY: f64 = 0.01;
const HIGH_PROBABILITY: f64 = 0.99;
/// Chunks with an RMS below this (int16 units) are treated as silence.
const SILENCE_RMS: f64 = 3.0;
// Two-state model: probability of staying in the current state between
// chunks and of the classifier agreeing with the true state.
const STAY_PROBABILITY: f64 = 0.9;
const DETECTION_PROBABILITY: f64 = 0.85;

/// Voice activity detector for 10 ms chunks at any rate.
///
/// Chunks are resampled to 16 kHz and classified by a [`StandaloneVad`].
/// The decision is smoothed by a two-state model into a probability, and
/// both the probability and the chunk RMS are appended to histories that
/// are drained by [`Self::take_voice_probabilities`] and [`Self::take_rms`].
#[derive(Debug)]
pub struct VoiceActivityDetector {
    standalone: StandaloneVad,
    resampler: Option<Resampler>,
    resampled: Vec<i16>,
    last_voice_probability: f64,
    voice_probabilities: Vec<f64>,
    rms: Vec<f64>,
}

impl Default for VoiceActivityDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceActivityDetector {
    pub fn new() -> Self {
        Self {
            standalone: StandaloneVad::new(),
            resampler: None,
            resampled: Vec::with_capacity(CHUNK_LEN),
            last_voice_probability: DEFAULT_VOICE_PROBABILITY,
            voice_probabilities: Vec::new(),
            rms: Vec::new(),
        }
    }

    /// Processes a whole number of 10 ms chunks at `sample_rate_hz`.
    pub fn process_chunk(&mut self, audio: &[i16], sample_rate_hz: u32) -> Result<(), VadError> {
        let chunk_len = sample_rate_hz as usize / 100;
        if sample_rate_hz % 100 != 0 || chunk_len == 0 || audio.is_empty() || audio.len() % chunk_len != 0
        {
            return Err(VadError::InvalidConfig {
                rate: sample_rate_hz,
                len: audio.len(),
            });
        }
        for chunk in audio.chunks_exact(chunk_len) {
            self.process_10ms(chunk, sample_rate_hz)?;
        }
        Ok(())
    }

    fn process_10ms(&mut self, chunk: &[i16], sample_rate_hz: u32) -> Result<(), VadError> {
        let chunk_16k: &[i16] = if sample_rate_hz == SAMPLE_RATE_HZ {
            chunk
        } else {
            let invalid = VadError::InvalidConfig {
                rate: sample_rate_hz,
                len: chunk.len(),
            };
            let resampler = match self.resampler.take() {
                Some(mut resampler) => {
                    resampler
                        .reset_if_needed(sample_rate_hz, SAMPLE_RATE_HZ, 1)
                        .map_err(|_| invalid)?;
                    resampler
                }
                None => Resampler::new(sample_rate_hz, SAMPLE_RATE_HZ, 1).map_err(|_| invalid)?,
            };
            let resampler = self.resampler.insert(resampler);
            self.resampled.resize(CHUNK_LEN, 0);
            resampler
                .push(chunk, &mut self.resampled)
                .map_err(|_| invalid)?;
            &self.resampled
        };

        let rms = (chunk_16k.iter().map(|&s| f64::from(s).powi(2)).sum::<f64>()
            / chunk_16k.len() as f64)
            .sqrt();

        let probability = if rms < SILENCE_RMS {
            LOW_PROBABILITY
        } else {
            self.standalone.add_audio(chunk_16k)?;
            let mut p = [0.0; 1];
            let speech = self.standalone.get_activity(&mut p)?;
            self.update_probability(speech)
        };
        self.last_voice_probability = probability;
        self.voice_probabilities.push(probability);
        self.rms.push(rms);
        Ok(())
    }

    fn update_probability(&self, speech: bool) -> f64 {
        let last = self.last_voice_probability;
        let prior = STAY_PROBABILITY * last + (1.0 - STAY_PROBABILITY) * (1.0 - last);
        let (l_speech, l_noise) = if speech {
            (DETECTION_PROBABILITY, 1.0 - DETECTION_PROBABILITY)
        } else {
            (1.0 - DETECTION_PROBABILITY, DETECTION_PROBABILITY)
        };
        let posterior = prior * l_speech / (prior * l_speech + (1.0 - prior) * l_noise);
        posterior.clamp(LOW_PROBABILITY, HIGH_PROBABILITY)
    }

    /// Voice probability of the most recent chunk.
    pub fn last_voice_probability(&self) -> f64 {
        self.last_voice_probability
    }

    /// Drains the per-chunk voice probabilities recorded since the last call.
    pub fn take_voice_probabilities(&mut self) -> Drain<'_, f64> {
        self.voice_probabilities.drain(..)
    }

    /// Drains the per-chunk RMS values recorded since the last call.
    pub fn take_rms(&mut self) -> Drain<'_, f64> {
        self.rms.drain(..)
    }
}
