//! Speech probability for AGC2 frames.

use clarion_common_audio::audio_util::{downmix_to_mono, float_s16_to_s16};
use clarion_common_audio::channel_buffer::ChannelBuffer;
use clarion_vad::VoiceActivityDetector;

/// Runs the voice activity detector on the mono downmix of each frame.
#[derive(derive_more::Debug)]
pub struct VadWrapper {
    sample_rate_hz: u32,
    #[debug(skip)]
    vad: VoiceActivityDetector,
    #[debug(skip)]
    mono: Vec<f32>,
    #[debug(skip)]
    samples: Vec<i16>,
}

impl VadWrapper {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            vad: VoiceActivityDetector::new(),
            mono: Vec::new(),
            samples: Vec::new(),
        }
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Speech probability of one 10 ms float S16 frame. Frames the
    /// detector rejects count as non-speech.
    pub fn analyze(&mut self, audio: &ChannelBuffer<f32>) -> f32 {
        self.mono.resize(audio.num_frames(), 0.0);
        downmix_to_mono(&audio.as_slices(), &mut self.mono);
        self.samples.clear();
        self.samples
            .extend(self.mono.iter().map(|&x| float_s16_to_s16(x)));
        match self.vad.process_chunk(&self.samples, self.sample_rate_hz) {
            Ok(()) => {
                self.vad.take_voice_probabilities().for_each(drop);
                self.vad.take_rms().for_each(drop);
                self.vad.last_voice_probability() as f32
            }
            Err(err) => {
                tracing::warn!(%err, "agc2 vad rejected frame");
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voiced_frame(rate: u32, offset: usize) -> ChannelBuffer<f32> {
        let len = rate as usize / 100;
        let mut audio = ChannelBuffer::new(len, 2);
        for channel in audio.channels_mut() {
            for (i, x) in channel.iter_mut().enumerate() {
                let t = (offset + i) as f32 / rate as f32;
                *x = (1..=19)
                    .map(|h| (2.0 * std::f32::consts::PI * 200.0 * h as f32 * t).sin())
                    .sum::<f32>()
                    * 1500.0;
            }
        }
        audio
    }

    #[test]
    fn silence_is_unlikely_speech() {
        let mut vad = VadWrapper::new(48000);
        assert!(vad.analyze(&ChannelBuffer::new(480, 1)) < 0.05);
    }

    #[test]
    fn voiced_frames_are_confident_speech() {
        let mut vad = VadWrapper::new(16000);
        let mut probability = 0.0;
        for frame in 0..20 {
            probability = vad.analyze(&voiced_frame(16000, frame * 160));
        }
        assert!(probability > 0.95, "{probability}");
    }
}
