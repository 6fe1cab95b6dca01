//! Per-subframe peak envelope for the limiter.

use clarion_common_audio::channel_buffer::ChannelBuffer;

use crate::common::SUB_FRAMES_IN_FRAME;

/// Per-subframe envelope decay, about 60 dB/s at 2000 subframes per second.
const DECAY_FILTER_CONSTANT: f32 = 0.997_125_9;

/// Tracks the frame envelope in [`SUB_FRAMES_IN_FRAME`] steps.
///
/// Attack is instant; release decays by [`DECAY_FILTER_CONSTANT`] per
/// subframe. The envelope is shifted one subframe earlier so that the
/// limiter gain has already dropped when a transient arrives.
#[derive(Debug, Clone, Default)]
pub struct FixedDigitalLevelEstimator {
    filter_state_level: f32,
}

impl FixedDigitalLevelEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subframe length for a frame of `num_frames` samples. Any remainder
    /// is folded into the last subframe.
    pub fn subframe_len(num_frames: usize) -> usize {
        (num_frames / SUB_FRAMES_IN_FRAME).max(1)
    }

    pub fn compute_level(&mut self, audio: &ChannelBuffer<f32>) -> [f32; SUB_FRAMES_IN_FRAME] {
        let num_frames = audio.num_frames();
        let sub_len = Self::subframe_len(num_frames);
        let mut envelope = [0.0f32; SUB_FRAMES_IN_FRAME];

        for channel in audio.channels() {
            for (index, value) in envelope.iter_mut().enumerate() {
                let start = (index * sub_len).min(num_frames);
                let end = if index + 1 == SUB_FRAMES_IN_FRAME {
                    num_frames
                } else {
                    ((index + 1) * sub_len).min(num_frames)
                };
                for &x in &channel[start..end] {
                    *value = value.max(x.abs());
                }
            }
        }

        for value in &mut envelope {
            let max = *value;
            if self.filter_state_level > max {
                *value = max * (1.0 - DECAY_FILTER_CONSTANT)
                    + self.filter_state_level * DECAY_FILTER_CONSTANT;
            }
            self.filter_state_level = *value;
        }

        for i in 0..SUB_FRAMES_IN_FRAME - 1 {
            envelope[i] = envelope[i].max(envelope[i + 1]);
        }
        envelope
    }

    /// Envelope at the end of the last frame.
    pub fn last_level(&self) -> f32 {
        self.filter_state_level
    }

    pub fn reset(&mut self) {
        self.filter_state_level = 0.0;
    }
}
