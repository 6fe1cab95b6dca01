//! Capture and render frames at the processing rate.
//!
//! An [`AudioBuffer`] takes one 10 ms frame at the stream rate, converts it
//! to float S16, downmixes it if the processing layout has fewer channels,
//! and resamples it to the processing rate. On the way out it resamples to
//! the output rate and converts back to the caller's sample format.

use clarion_common_audio::audio_util::{
    clamp_float_s16, downmix_to_mono, float_s16_to_float, float_s16_to_s16, float_to_float_s16,
};
use clarion_common_audio::channel_buffer::ChannelBuffer;
use clarion_common_audio::push_resampler::PushResampler;

use crate::Error;

#[derive(Debug)]
struct Resampling {
    resampler: PushResampler,
    scratch: ChannelBuffer<f32>,
}

impl Resampling {
    /// `None` when no conversion is needed.
    fn between(
        src_rate_hz: u32,
        dst_rate_hz: u32,
        scratch_frames: usize,
        num_channels: usize,
        stream_rate_hz: u32,
    ) -> Result<Option<Self>, Error> {
        if src_rate_hz == dst_rate_hz {
            return Ok(None);
        }
        let resampler = PushResampler::new(src_rate_hz, dst_rate_hz, num_channels).ok_or(
            Error::BadSampleRate {
                sample_rate_hz: stream_rate_hz,
            },
        )?;
        Ok(Some(Self {
            resampler,
            scratch: ChannelBuffer::new(scratch_frames, num_channels),
        }))
    }
}

/// One frame of audio in the processing domain.
#[derive(Debug)]
pub(crate) struct AudioBuffer {
    input_num_channels: usize,
    data: ChannelBuffer<f32>,
    input: Option<Resampling>,
    output: Option<Resampling>,
}

impl AudioBuffer {
    /// Fails with [`Error::BadSampleRate`] if either stream rate cannot be
    /// converted to or from `proc_rate_hz`.
    pub(crate) fn new(
        input_rate_hz: u32,
        input_num_channels: usize,
        proc_rate_hz: u32,
        num_channels: usize,
        output_rate_hz: u32,
    ) -> Result<Self, Error> {
        let frames = |rate: u32| rate as usize / 100;
        Ok(Self {
            input_num_channels,
            data: ChannelBuffer::new(frames(proc_rate_hz), num_channels),
            input: Resampling::between(
                input_rate_hz,
                proc_rate_hz,
                frames(input_rate_hz),
                num_channels,
                input_rate_hz,
            )?,
            output: Resampling::between(
                proc_rate_hz,
                output_rate_hz,
                frames(output_rate_hz),
                num_channels,
                output_rate_hz,
            )?,
        })
    }

    pub(crate) fn num_frames(&self) -> usize {
        self.data.num_frames()
    }

    pub(crate) fn num_channels(&self) -> usize {
        self.data.num_channels()
    }

    pub(crate) fn data(&self) -> &ChannelBuffer<f32> {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut ChannelBuffer<f32> {
        &mut self.data
    }

    /// Loads planar float samples in `[-1, 1]`. Non-finite samples become
    /// silence and out-of-range samples are clamped.
    pub(crate) fn copy_from_float(&mut self, src: &[&[f32]]) {
        let target = match &mut self.input {
            Some(r) => &mut r.scratch,
            None => &mut self.data,
        };
        if target.num_channels() < src.len() {
            downmix_to_mono(src, target.channel_mut(0));
        } else {
            for (dst, channel) in target.channels_mut().zip(src) {
                dst.copy_from_slice(&channel[..dst.len()]);
            }
        }
        for channel in target.channels_mut() {
            for x in channel.iter_mut() {
                *x = float_to_float_s16(sanitize(*x));
            }
        }
        self.resample_input();
    }

    /// Loads interleaved `i16` samples.
    pub(crate) fn copy_from_interleaved_i16(&mut self, src: &[i16]) {
        let stride = self.input_num_channels.max(1);
        let target = match &mut self.input {
            Some(r) => &mut r.scratch,
            None => &mut self.data,
        };
        if target.num_channels() < stride {
            let scale = 1.0 / stride as f32;
            for (d, frame) in target.channel_mut(0).iter_mut().zip(src.chunks_exact(stride)) {
                *d = frame.iter().map(|&s| f32::from(s)).sum::<f32>() * scale;
            }
        } else {
            for (ch, dst) in target.channels_mut().enumerate() {
                for (d, frame) in dst.iter_mut().zip(src.chunks_exact(stride)) {
                    *d = f32::from(frame[ch]);
                }
            }
        }
        self.resample_input();
    }

    /// Writes planar float samples in `[-1, 1]`.
    pub(crate) fn copy_to_float(&mut self, dest: &mut [&mut [f32]]) {
        let source = self.output_frame();
        let last = source.num_channels().saturating_sub(1);
        for (ch, channel) in dest.iter_mut().enumerate() {
            for (d, &x) in channel.iter_mut().zip(source.channel(ch.min(last))) {
                *d = float_s16_to_float(clamp_float_s16(x));
            }
        }
    }

    /// Writes interleaved `i16` samples with `num_channels` channels.
    pub(crate) fn copy_to_interleaved_i16(&mut self, dest: &mut [i16], num_channels: usize) {
        let source = self.output_frame();
        let last = source.num_channels().saturating_sub(1);
        for (frame_idx, frame) in dest.chunks_exact_mut(num_channels.max(1)).enumerate() {
            for (ch, sample) in frame.iter_mut().enumerate() {
                *sample = float_s16_to_s16(source.channel(ch.min(last))[frame_idx]);
            }
        }
    }

    /// Drops resampler history.
    pub(crate) fn reset(&mut self) {
        self.data.fill(0.0);
        for r in [&mut self.input, &mut self.output].into_iter().flatten() {
            r.resampler.reset();
            r.scratch.fill(0.0);
        }
    }

    fn resample_input(&mut self) {
        if let Some(r) = &mut self.input {
            r.resampler.resample(&r.scratch, &mut self.data);
        }
    }

    fn output_frame(&mut self) -> &ChannelBuffer<f32> {
        match &mut self.output {
            Some(r) => {
                r.resampler.resample(&self.data, &mut r.scratch);
                &r.scratch
            }
            None => &self.data,
        }
    }
}

fn sanitize(x: f32) -> f32 {
    if x.is_finite() { x.clamp(-1.0, 1.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planar(channels: &[Vec<f32>]) -> Vec<&[f32]> {
        channels.iter().map(Vec::as_slice).collect()
    }

    #[test]
    fn float_round_trip_at_the_processing_rate() {
        let mut buffer = AudioBuffer::new(16000, 1, 16000, 1, 16000).unwrap();
        let input: Vec<f32> = (0..160).map(|i| (i as f32 / 160.0) - 0.5).collect();
        buffer.copy_from_float(&[&input]);
        assert!((buffer.data().channel(0)[0] + 16384.0).abs() < 1e-3);

        let mut out = vec![0.0f32; 160];
        buffer.copy_to_float(&mut [&mut out]);
        for (a, b) in input.iter().zip(&out) {
            assert!((a - b).abs() < 1e-6, "{a} != {b}");
        }
    }

    #[test]
    fn i16_round_trip_is_lossless() {
        let mut buffer = AudioBuffer::new(8000, 2, 8000, 2, 8000).unwrap();
        let input: Vec<i16> = (0..160).map(|i| (i as i16 - 80) * 400).collect();
        buffer.copy_from_interleaved_i16(&input);
        assert_eq!(buffer.data().channel(1)[0], f32::from(input[1]));

        let mut out = vec![0i16; 160];
        buffer.copy_to_interleaved_i16(&mut out, 2);
        assert_eq!(input, out);
    }

    #[test]
    fn stereo_input_is_averaged_into_mono() {
        let mut buffer = AudioBuffer::new(16000, 2, 16000, 1, 16000).unwrap();
        let channels = vec![vec![0.5f32; 160], vec![-0.25f32; 160]];
        buffer.copy_from_float(&planar(&channels));
        assert_eq!(buffer.num_channels(), 1);
        assert!((buffer.data().channel(0)[10] - 4096.0).abs() < 1e-3);

        let interleaved: Vec<i16> = (0..320).map(|i| if i % 2 == 0 { 1000 } else { 3000 }).collect();
        buffer.copy_from_interleaved_i16(&interleaved);
        assert_eq!(buffer.data().channel(0)[0], 2000.0);
    }

    #[test]
    fn non_finite_and_out_of_range_input_is_sanitized() {
        let mut buffer = AudioBuffer::new(16000, 1, 16000, 1, 16000).unwrap();
        let mut input = vec![0.25f32; 160];
        input[0] = f32::NAN;
        input[1] = f32::INFINITY;
        input[2] = 4.0;
        input[3] = -4.0;
        buffer.copy_from_float(&[&input]);
        let data = buffer.data().channel(0);
        assert_eq!(data[0], 0.0);
        assert_eq!(data[1], 0.0);
        assert_eq!(data[2], 32768.0);
        assert_eq!(data[3], -32768.0);
    }

    #[test]
    fn resampled_frames_keep_their_length_and_level() {
        let mut buffer = AudioBuffer::new(48000, 1, 16000, 1, 44100).unwrap();
        assert_eq!(buffer.num_frames(), 160);
        let input = vec![0.25f32; 480];
        let mut out = vec![0.0f32; 441];
        for _ in 0..20 {
            buffer.copy_from_float(&[&input]);
            buffer.copy_to_float(&mut [&mut out]);
        }
        assert!((buffer.data().channel(0)[159] - 8192.0).abs() < 50.0);
        assert!((out[440] - 0.25).abs() < 0.01, "dc {}", out[440]);
    }

    #[test]
    fn mono_processing_fans_out_to_every_output_channel() {
        let mut buffer = AudioBuffer::new(16000, 1, 16000, 1, 16000).unwrap();
        buffer.copy_from_float(&[&[0.5f32; 160]]);
        let mut left = vec![0.0f32; 160];
        let mut right = vec![0.0f32; 160];
        buffer.copy_to_float(&mut [&mut left, &mut right]);
        assert_eq!(left, right);
        assert!((right[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn reset_clears_the_frame() {
        let mut buffer = AudioBuffer::new(32000, 1, 16000, 1, 32000).unwrap();
        buffer.copy_from_float(&[&[0.5f32; 320]]);
        buffer.reset();
        assert!(buffer.data().channel(0).iter().all(|&x| x == 0.0));
    }
}
