//! Envelope-driven compressor stage.
//!
//! Each frame is split into 1 ms subframes. A peak envelope with instant
//! attack and exponential decay is looked up in the [`GainCurve`]; the
//! gain drops at once when the curve asks for less and recovers slowly
//! when it asks for more. Samples are scaled by the gain interpolated
//! linearly across each subframe.

use clarion_common_audio::channel_buffer::ChannelBuffer;

use crate::SUBFRAMES_IN_FRAME;
use crate::gain_curve::GainCurve;

/// Envelope decay per subframe.
const ENVELOPE_DECAY: f32 = 0.98;
/// Fraction of the distance to a higher target gain covered per subframe.
const GAIN_RELEASE: f32 = 0.01;

#[derive(Debug, Clone)]
pub(crate) struct DigitalAgc {
    curve: GainCurve,
    envelope: f32,
    gain: f32,
}

impl DigitalAgc {
    pub(crate) fn new(curve: GainCurve) -> Self {
        Self {
            curve,
            envelope: 0.0,
            gain: 1.0,
        }
    }

    /// Current linear gain, as of the end of the last frame.
    pub(crate) fn gain(&self) -> f32 {
        self.gain
    }

    /// Compresses `audio` in place. With `allow_increase` false the gain may
    /// only fall.
    pub(crate) fn process(&mut self, audio: &mut ChannelBuffer<f32>, allow_increase: bool) {
        let num_frames = audio.num_frames();
        let sub_len = (num_frames / SUBFRAMES_IN_FRAME).max(1);
        // A trailing partial subframe when the frame does not split evenly.
        let num_sub = num_frames.div_ceil(sub_len).min(SUBFRAMES_IN_FRAME + 1);

        let mut gains = [0.0f32; SUBFRAMES_IN_FRAME + 2];
        gains[0] = self.gain;
        for k in 0..num_sub {
            let range = k * sub_len..((k + 1) * sub_len).min(num_frames);
            let peak = audio
                .channels()
                .flat_map(|ch| ch[range.clone()].iter())
                .fold(0.0f32, |m, &x| m.max(x.abs()));
            self.envelope = if peak > self.envelope {
                peak
            } else {
                (self.envelope * ENVELOPE_DECAY).max(peak)
            };

            let target = self.curve.gain_for_envelope(self.envelope);
            let previous = gains[k];
            gains[k + 1] = if target < previous {
                target
            } else if allow_increase {
                previous + GAIN_RELEASE * (target - previous)
            } else {
                previous
            };
        }

        for channel in audio.channels_mut() {
            for (k, sub) in channel.chunks_mut(sub_len).enumerate().take(num_sub) {
                let (g0, g1) = (gains[k], gains[k + 1]);
                let step = (g1 - g0) / sub.len() as f32;
                for (t, x) in sub.iter_mut().enumerate() {
                    let g = g0 + step * (t + 1) as f32;
                    *x = (*x * g).clamp(-32768.0, 32767.0);
                }
            }
        }
        self.gain = gains[num_sub];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(amplitude: f32, frames: usize, offset: usize) -> ChannelBuffer<f32> {
        let mut buffer = ChannelBuffer::new(frames, 1);
        for (i, x) in buffer.channel_mut(0).iter_mut().enumerate() {
            *x = amplitude * (2.0 * std::f32::consts::PI * 500.0 * (i + offset) as f32 / 16000.0).sin();
        }
        buffer
    }

    fn peak(buffer: &ChannelBuffer<f32>) -> f32 {
        buffer.channel(0).iter().fold(0.0f32, |m, &x| m.max(x.abs()))
    }

    #[test]
    fn quiet_tone_rises_by_compression_gain() {
        let mut agc = DigitalAgc::new(GainCurve::new(3, 9, true));
        let mut last = 0.0;
        for frame in 0..300 {
            let mut buffer = tone(300.0, 160, frame * 160);
            agc.process(&mut buffer, true);
            last = peak(&buffer);
        }
        let gain_db = 20.0 * (last / 300.0).log10();
        assert!((gain_db - 9.0).abs() < 0.5, "gain {gain_db} dB");
    }

    #[test]
    fn loud_tone_settles_at_target_without_clipping() {
        let mut agc = DigitalAgc::new(GainCurve::new(3, 9, true));
        let ceiling = 32768.0 * 10f32.powf(-3.0 / 20.0);
        for frame in 0..200 {
            let mut buffer = tone(32000.0, 160, frame * 160);
            agc.process(&mut buffer, true);
            if frame > 10 {
                assert!(peak(&buffer) <= ceiling * 1.01, "frame {frame} peak {}", peak(&buffer));
            }
        }
    }

    #[test]
    fn frozen_gain_does_not_rise() {
        let mut agc = DigitalAgc::new(GainCurve::new(3, 20, true));
        for frame in 0..50 {
            let mut buffer = tone(100.0, 160, frame * 160);
            agc.process(&mut buffer, false);
        }
        assert_eq!(agc.gain(), 1.0);
    }

    #[test]
    fn silence_is_untouched() {
        let mut agc = DigitalAgc::new(GainCurve::new(3, 9, true));
        let mut buffer = ChannelBuffer::new(480, 2);
        for _ in 0..10 {
            agc.process(&mut buffer, true);
            assert!(buffer.channels().all(|ch| ch.iter().all(|&x| x == 0.0)));
        }
    }
}
