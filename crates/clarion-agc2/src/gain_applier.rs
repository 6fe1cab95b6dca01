//! Applies a gain factor, ramping linearly across a frame when it changes.

use clarion_common_audio::channel_buffer::ChannelBuffer;

use crate::common::{MAX_FLOAT_S16_VALUE, MIN_FLOAT_S16_VALUE};

#[derive(Debug, Clone)]
pub struct GainApplier {
    hard_clip_samples: bool,
    last_gain_factor: f32,
    current_gain_factor: f32,
}

impl GainApplier {
    pub fn new(hard_clip_samples: bool, initial_gain_factor: f32) -> Self {
        Self {
            hard_clip_samples,
            last_gain_factor: initial_gain_factor,
            current_gain_factor: initial_gain_factor,
        }
    }

    pub fn set_gain_factor(&mut self, gain_factor: f32) {
        debug_assert!(gain_factor > 0.0);
        self.current_gain_factor = gain_factor;
    }

    pub fn gain_factor(&self) -> f32 {
        self.current_gain_factor
    }

    pub fn apply(&mut self, audio: &mut ChannelBuffer<f32>) {
        let num_frames = audio.num_frames();
        if self.last_gain_factor == self.current_gain_factor {
            if self.current_gain_factor != 1.0 {
                for channel in audio.channels_mut() {
                    for x in channel {
                        *x *= self.current_gain_factor;
                    }
                }
            }
        } else if num_frames > 0 {
            let step = (self.current_gain_factor - self.last_gain_factor) / num_frames as f32;
            for channel in audio.channels_mut() {
                let mut gain = self.last_gain_factor;
                for x in channel {
                    *x *= gain;
                    gain += step;
                }
            }
        }
        self.last_gain_factor = self.current_gain_factor;

        if self.hard_clip_samples {
            for channel in audio.channels_mut() {
                for x in channel {
                    *x = x.clamp(MIN_FLOAT_S16_VALUE, MAX_FLOAT_S16_VALUE);
                }
            }
        }
    }
}
