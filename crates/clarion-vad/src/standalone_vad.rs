//! Buffered 16 kHz classifier reporting per-chunk probabilities.

use crate::{Vad, VadError, VadMode};

pub(crate) const SAMPLE_RATE_HZ: u32 = 16000;
pub(crate) const CHUNK_LEN: usize = 160;
const MAX_CHUNKS: usize = 3;

/// Reported for every chunk of a speech decision. Neutral, so that it can
/// be combined with other evidence.
pub const SPEECH_PROBABILITY: f64 = 0.5;
/// Reported for every chunk of a non-speech decision. Small but non-zero.
pub const NON_SPEECH_PROBABILITY: f64 = 0.01;

/// Accumulates up to three 10 ms chunks of 16 kHz audio and classifies
/// them as one 10, 20 or 30 ms frame.
#[derive(Debug)]
pub struct StandaloneVad {
    vad: Vad,
    buffer: [i16; CHUNK_LEN * MAX_CHUNKS],
    len: usize,
}

impl Default for StandaloneVad {
    fn default() -> Self {
        Self::new()
    }
}

impl StandaloneVad {
    pub fn new() -> Self {
        Self {
            vad: Vad::new(VadMode::VeryAggressive),
            buffer: [0; CHUNK_LEN * MAX_CHUNKS],
            len: 0,
        }
    }

    pub fn mode(&self) -> VadMode {
        self.vad.mode()
    }

    pub fn set_mode(&mut self, mode: i32) -> Result<(), VadError> {
        self.vad.set_mode(mode)
    }

    /// Number of chunks waiting for [`Self::get_activity`].
    pub fn buffered_chunks(&self) -> usize {
        self.len / CHUNK_LEN
    }

    /// Buffers one 10 ms chunk. A full buffer starts over from the first
    /// slot.
    pub fn add_audio(&mut self, chunk: &[i16]) -> Result<(), VadError> {
        if chunk.len() != CHUNK_LEN {
            return Err(VadError::WrongChunkLength {
                expected: CHUNK_LEN,
                actual: chunk.len(),
            });
        }
        if self.len + CHUNK_LEN > self.buffer.len() {
            tracing::debug!("standalone vad buffer full, restarting");
            self.len = 0;
        }
        self.buffer[self.len..self.len + CHUNK_LEN].copy_from_slice(chunk);
        self.len += CHUNK_LEN;
        Ok(())
    }

    /// Classifies the buffered audio, writes one probability per buffered
    /// chunk to the front of `probabilities` and clears the buffer.
    pub fn get_activity(&mut self, probabilities: &mut [f64]) -> Result<bool, VadError> {
        if self.len == 0 {
            return Err(VadError::NoAudio);
        }
        let chunks = self.len / CHUNK_LEN;
        if probabilities.len() < chunks {
            return Err(VadError::ActivityLengthMismatch {
                needed: chunks,
                available: probabilities.len(),
            });
        }
        let speech = self.vad.is_speech(&self.buffer[..self.len], SAMPLE_RATE_HZ)?;
        let p = if speech {
            SPEECH_PROBABILITY
        } else {
            NON_SPEECH_PROBABILITY
        };
        probabilities[..chunks].fill(p);
        self.len = 0;
        Ok(speech)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud_chunk() -> Vec<i16> {
        (0..CHUNK_LEN)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE_HZ as f32;
                let v: f32 = (1..=19)
                    .map(|h| (2.0 * std::f32::consts::PI * 200.0 * h as f32 * t).sin())
                    .sum();
                (v * 1500.0) as i16
            })
            .collect()
    }

    #[test]
    fn default_mode_is_very_aggressive() {
        assert_eq!(StandaloneVad::new().mode(), VadMode::VeryAggressive);
    }

    #[test]
    fn rejects_wrong_chunk_length() {
        let mut vad = StandaloneVad::new();
        assert_eq!(
            vad.add_audio(&[0; 80]),
            Err(VadError::WrongChunkLength {
                expected: 160,
                actual: 80
            })
        );
    }

    #[test]
    fn silence_reports_low_probability_and_clears() {
        let mut vad = StandaloneVad::new();
        vad.add_audio(&[0; CHUNK_LEN]).unwrap();
        vad.add_audio(&[0; CHUNK_LEN]).unwrap();
        let mut p = [0.0; 3];
        assert_eq!(vad.get_activity(&mut p), Ok(false));
        assert_eq!(p, [NON_SPEECH_PROBABILITY, NON_SPEECH_PROBABILITY, 0.0]);
        assert_eq!(vad.get_activity(&mut p), Err(VadError::NoAudio));
    }

    #[test]
    fn speech_reports_neutral_probability() {
        let mut vad = StandaloneVad::new();
        vad.add_audio(&loud_chunk()).unwrap();
        let mut p = [0.0; 1];
        assert_eq!(vad.get_activity(&mut p), Ok(true));
        assert_eq!(p[0], SPEECH_PROBABILITY);
    }

    #[test]
    fn full_buffer_restarts() {
        let mut vad = StandaloneVad::new();
        for _ in 0..4 {
            vad.add_audio(&[0; CHUNK_LEN]).unwrap();
        }
        assert_eq!(vad.buffered_chunks(), 1);
    }

    #[test]
    fn short_output_is_rejected() {
        let mut vad = StandaloneVad::new();
        vad.add_audio(&[0; CHUNK_LEN]).unwrap();
        vad.add_audio(&[0; CHUNK_LEN]).unwrap();
        let mut p = [0.0; 1];
        assert_eq!(
            vad.get_activity(&mut p),
            Err(VadError::ActivityLengthMismatch {
                needed: 2,
                available: 1
            })
        );
    }
}
