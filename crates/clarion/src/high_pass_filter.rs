//! DC and low-frequency removal on the capture path.

use clarion_common_audio::cascaded_biquad_filter::{BiQuadCoefficients, CascadedBiQuadFilter};
use clarion_common_audio::channel_buffer::ChannelBuffer;

const CUTOFF_HZ: f32 = 80.0;

/// Second-order Butterworth high-pass at 80 Hz, one filter state per
/// channel.
#[derive(Debug)]
pub(crate) struct HighPassFilter {
    sample_rate_hz: u32,
    filters: Vec<CascadedBiQuadFilter>,
}

impl HighPassFilter {
    pub(crate) fn new(sample_rate_hz: u32, num_channels: usize) -> Self {
        let coefficients = BiQuadCoefficients::butterworth_high_pass(CUTOFF_HZ, sample_rate_hz);
        Self {
            sample_rate_hz,
            filters: (0..num_channels)
                .map(|_| CascadedBiQuadFilter::new(&[coefficients]))
                .collect(),
        }
    }

    pub(crate) fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub(crate) fn num_channels(&self) -> usize {
        self.filters.len()
    }

    pub(crate) fn process(&mut self, audio: &mut ChannelBuffer<f32>) {
        for (filter, channel) in self.filters.iter_mut().zip(audio.channels_mut()) {
            filter.process_in_place(channel);
        }
    }

    #[cfg(test)]
    pub(crate) fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq_hz: f32, sample_rate_hz: u32, frame_index: usize, amplitude: f32) -> Vec<f32> {
        let len = sample_rate_hz as usize / 100;
        (0..len)
            .map(|i| {
                let n = (frame_index * len + i) as f32;
                amplitude * (2.0 * std::f32::consts::PI * freq_hz * n / sample_rate_hz as f32).sin()
            })
            .collect()
    }

    fn energy(x: &[f32]) -> f32 {
        x.iter().map(|v| v * v).sum()
    }

    #[test]
    fn dc_is_removed() {
        let mut hpf = HighPassFilter::new(16000, 2);
        let mut audio = ChannelBuffer::<f32>::new(160, 2);
        for _ in 0..100 {
            audio.fill(5000.0);
            hpf.process(&mut audio);
        }
        for channel in audio.channels() {
            assert!(channel.iter().all(|x| x.abs() < 1.0), "dc leaked: {}", channel[159]);
        }
    }

    #[test]
    fn speech_band_passes() {
        let mut hpf = HighPassFilter::new(32000, 1);
        let mut audio = ChannelBuffer::<f32>::new(320, 1);
        let mut ratio = 0.0;
        for frame in 0..50 {
            let input = tone(1000.0, 32000, frame, 10000.0);
            audio.channel_mut(0).copy_from_slice(&input);
            hpf.process(&mut audio);
            ratio = energy(audio.channel(0)) / energy(&input);
        }
        assert!((0.9..1.1).contains(&ratio), "1 kHz energy ratio {ratio}");
    }

    #[test]
    fn low_rumble_is_attenuated() {
        let mut hpf = HighPassFilter::new(16000, 1);
        let mut audio = ChannelBuffer::<f32>::new(160, 1);
        let mut ratio = 1.0;
        for frame in 0..100 {
            let input = tone(20.0, 16000, frame, 10000.0);
            audio.channel_mut(0).copy_from_slice(&input);
            hpf.process(&mut audio);
            ratio = energy(audio.channel(0)) / energy(&input).max(1.0);
        }
        assert!(ratio < 0.1, "20 Hz energy ratio {ratio}");
    }

    #[test]
    fn reset_clears_memory() {
        let mut hpf = HighPassFilter::new(16000, 1);
        let mut audio = ChannelBuffer::<f32>::new(160, 1);
        audio.fill(1000.0);
        hpf.process(&mut audio);
        hpf.reset();
        audio.fill(0.0);
        hpf.process(&mut audio);
        assert!(audio.channel(0).iter().all(|&x| x == 0.0));
        assert_eq!(hpf.num_channels(), 1);
        assert_eq!(hpf.sample_rate_hz(), 16000);
    }
}
