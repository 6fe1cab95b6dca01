//! Multi-channel planar resampling of fixed-size frames.

use crate::channel_buffer::ChannelBuffer;
use crate::polyphase_resampler::PolyphaseResampler;

/// Resamples whole frames of planar audio, one [`PolyphaseResampler`] per
/// channel.
///
/// Frames are expected to be 10 ms long so that every call produces exactly
/// `dst` frames. Should a ratio ever produce fewer, the tail is zero-filled.
#[derive(Debug)]
pub struct PushResampler {
    channels: Vec<PolyphaseResampler>,
    src_rate_hz: u32,
    dst_rate_hz: u32,
}

impl PushResampler {
    /// Returns `None` if the rate pair is unsupported.
    pub fn new(src_rate_hz: u32, dst_rate_hz: u32, num_channels: usize) -> Option<Self> {
        let backend = clarion_simd::detect_backend();
        let channels = (0..num_channels)
            .map(|_| PolyphaseResampler::new(src_rate_hz, dst_rate_hz, backend))
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            channels,
            src_rate_hz,
            dst_rate_hz,
        })
    }

    pub fn src_rate_hz(&self) -> u32 {
        self.src_rate_hz
    }

    pub fn dst_rate_hz(&self) -> u32 {
        self.dst_rate_hz
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Resamples one channel.
    pub fn resample_channel(&mut self, channel: usize, src: &[f32], dst: &mut [f32]) {
        let resampler = &mut self.channels[channel];
        let needed = resampler.output_len(src.len());
        if needed <= dst.len() {
            let written = resampler.process(src, dst);
            dst[written..].fill(0.0);
        } else {
            let mut scratch = vec![0.0; needed];
            resampler.process(src, &mut scratch);
            dst.copy_from_slice(&scratch[..dst.len()]);
            tracing::warn!(needed, available = dst.len(), "resampler output truncated");
        }
    }

    /// Resamples every channel of `src` into the matching channel of `dst`.
    pub fn resample(&mut self, src: &ChannelBuffer<f32>, dst: &mut ChannelBuffer<f32>) {
        let num_channels = src.num_channels().min(dst.num_channels()).min(self.channels.len());
        for ch in 0..num_channels {
            self.resample_channel(ch, src.channel(ch), dst.channel_mut(ch));
        }
    }

    pub fn reset(&mut self) {
        for resampler in &mut self.channels {
            resampler.reset();
        }
    }
}
