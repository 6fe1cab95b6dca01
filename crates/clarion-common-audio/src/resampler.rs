//! Interleaved `i16` sample-rate adapter.
//!
//! Converts interleaved multi-channel audio between two arbitrary rates.
//! Output length follows the rate ratio exactly over the life of the
//! resampler: the fractional output position is carried across calls.

use std::fmt;

use crate::audio_util::float_s16_to_s16;
use crate::polyphase_resampler::PolyphaseResampler;

/// Errors from [`Resampler`] construction and processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResamplerError {
    /// A rate is zero or the reduced ratio is too large to design a filter for.
    UnsupportedRate { input_rate_hz: u32, output_rate_hz: u32 },
    /// Zero channels were requested.
    NoChannels,
    /// Input length is not a multiple of the channel count.
    MisalignedInput { len: usize, num_channels: usize },
    /// The output buffer cannot hold the converted samples.
    OutputTooSmall { needed: usize, available: usize },
}

impl fmt::Display for ResamplerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedRate {
                input_rate_hz,
                output_rate_hz,
            } => write!(
                f,
                "unsupported resampling ratio {input_rate_hz} Hz -> {output_rate_hz} Hz"
            ),
            Self::NoChannels => write!(f, "resampler needs at least one channel"),
            Self::MisalignedInput { len, num_channels } => write!(
                f,
                "input of {len} samples is not a multiple of {num_channels} channels"
            ),
            Self::OutputTooSmall { needed, available } => write!(
                f,
                "output buffer holds {available} samples, {needed} needed"
            ),
        }
    }
}

impl std::error::Error for ResamplerError {}

/// Stateful interleaved resampler.
#[derive(Debug)]
pub struct Resampler {
    input_rate_hz: u32,
    output_rate_hz: u32,
    num_channels: usize,
    channels: Vec<PolyphaseResampler>,
    planar_in: Vec<f32>,
    planar_out: Vec<f32>,
}

impl Resampler {
    pub fn new(
        input_rate_hz: u32,
        output_rate_hz: u32,
        num_channels: usize,
    ) -> Result<Self, ResamplerError> {
        let channels = Self::build(input_rate_hz, output_rate_hz, num_channels)?;
        Ok(Self {
            input_rate_hz,
            output_rate_hz,
            num_channels,
            channels,
            planar_in: Vec::new(),
            planar_out: Vec::new(),
        })
    }

    fn build(
        input_rate_hz: u32,
        output_rate_hz: u32,
        num_channels: usize,
    ) -> Result<Vec<PolyphaseResampler>, ResamplerError> {
        if num_channels == 0 {
            return Err(ResamplerError::NoChannels);
        }
        let backend = clarion_simd::detect_backend();
        (0..num_channels)
            .map(|_| {
                PolyphaseResampler::new(input_rate_hz, output_rate_hz, backend).ok_or(
                    ResamplerError::UnsupportedRate {
                        input_rate_hz,
                        output_rate_hz,
                    },
                )
            })
            .collect()
    }

    pub fn input_rate_hz(&self) -> u32 {
        self.input_rate_hz
    }

    pub fn output_rate_hz(&self) -> u32 {
        self.output_rate_hz
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Reconfigures the resampler and clears all history.
    pub fn reset(
        &mut self,
        input_rate_hz: u32,
        output_rate_hz: u32,
        num_channels: usize,
    ) -> Result<(), ResamplerError> {
        self.channels = Self::build(input_rate_hz, output_rate_hz, num_channels)?;
        self.input_rate_hz = input_rate_hz;
        self.output_rate_hz = output_rate_hz;
        self.num_channels = num_channels;
        tracing::debug!(input_rate_hz, output_rate_hz, num_channels, "resampler reset");
        Ok(())
    }

    /// Like [`Self::reset`], but keeps state when nothing changed.
    pub fn reset_if_needed(
        &mut self,
        input_rate_hz: u32,
        output_rate_hz: u32,
        num_channels: usize,
    ) -> Result<(), ResamplerError> {
        if input_rate_hz == self.input_rate_hz
            && output_rate_hz == self.output_rate_hz
            && num_channels == self.num_channels
        {
            return Ok(());
        }
        self.reset(input_rate_hz, output_rate_hz, num_channels)
    }

    /// Number of interleaved output samples the next call produces for
    /// `input_len` interleaved input samples.
    pub fn output_len(&self, input_len: usize) -> usize {
        self.channels[0].output_len(input_len / self.num_channels) * self.num_channels
    }

    /// Converts `input` into the front of `output`, returning the number of
    /// interleaved samples written.
    pub fn push(&mut self, input: &[i16], output: &mut [i16]) -> Result<usize, ResamplerError> {
        let num_channels = self.num_channels;
        if input.len() % num_channels != 0 {
            return Err(ResamplerError::MisalignedInput {
                len: input.len(),
                num_channels,
            });
        }
        let needed = self.output_len(input.len());
        if output.len() < needed {
            return Err(ResamplerError::OutputTooSmall {
                needed,
                available: output.len(),
            });
        }

        let in_frames = input.len() / num_channels;
        let out_frames = needed / num_channels;
        self.planar_in.resize(in_frames, 0.0);
        self.planar_out.resize(out_frames, 0.0);
        for (ch, resampler) in self.channels.iter_mut().enumerate() {
            for (dst, frame) in self.planar_in.iter_mut().zip(input.chunks_exact(num_channels)) {
                *dst = f32::from(frame[ch]);
            }
            let written = resampler.process(&self.planar_in, &mut self.planar_out);
            debug_assert_eq!(written, out_frames);
            for (frame, &sample) in output.chunks_exact_mut(num_channels).zip(&self.planar_out) {
                frame[ch] = float_s16_to_s16(sample);
            }
        }
        Ok(needed)
    }

    /// Converts `input` into a newly allocated buffer.
    pub fn process(&mut self, input: &[i16]) -> Result<Vec<i16>, ResamplerError> {
        if input.len() % self.num_channels != 0 {
            return Err(ResamplerError::MisalignedInput {
                len: input.len(),
                num_channels: self.num_channels,
            });
        }
        let mut output = vec![0i16; self.output_len(input.len())];
        let written = self.push(input, &mut output)?;
        output.truncate(written);
        Ok(output)
    }
}
