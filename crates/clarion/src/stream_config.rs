//! Stream formats and the 10 ms frame contract.

use std::fmt;
use std::num::{NonZeroU16, NonZeroU32};

/// Minimum supported stream sample rate in Hz.
pub const MIN_SAMPLE_RATE_HZ: u32 = 8_000;
/// Maximum supported stream sample rate in Hz.
pub const MAX_SAMPLE_RATE_HZ: u32 = 384_000;

/// Stream rate used when nothing else is configured.
pub const DEFAULT_SAMPLE_RATE: u32 = 32_000;
/// Channel count used when nothing else is configured.
pub const DEFAULT_CHANNELS: u16 = 1;
/// Duration of one processing frame.
pub const DEFAULT_BLOCK_MS: u32 = 10;

/// Samples per channel in one 10 ms frame at `sample_rate_hz`.
pub const fn get_frame_size(sample_rate_hz: u32) -> usize {
    (sample_rate_hz * DEFAULT_BLOCK_MS / 1000) as usize
}

/// Error returned when creating a [`CheckedStreamConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamConfigError {
    /// Sample rate is outside the supported range.
    UnsupportedSampleRate { sample_rate_hz: u32 },
    /// Sample rate does not map to an integer number of samples per 10 ms.
    Non10msAlignedSampleRate { sample_rate_hz: u32 },
    /// The stream has no channels.
    NoChannels,
}

impl fmt::Display for StreamConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UnsupportedSampleRate { sample_rate_hz } => write!(
                f,
                "unsupported sample rate {sample_rate_hz}; expected {MIN_SAMPLE_RATE_HZ}..={MAX_SAMPLE_RATE_HZ}",
            ),
            Self::Non10msAlignedSampleRate { sample_rate_hz } => write!(
                f,
                "sample rate {sample_rate_hz} is not aligned to 10ms frames (must be divisible by 100)",
            ),
            Self::NoChannels => write!(f, "a stream needs at least one channel"),
        }
    }
}

impl std::error::Error for StreamConfigError {}

/// Sample rate and channel count of one audio stream.
///
/// Construction is unchecked. The processing calls validate the format and
/// report [`Error::BadSampleRate`](crate::Error::BadSampleRate) or
/// [`Error::BadNumberChannels`](crate::Error::BadNumberChannels); use
/// [`CheckedStreamConfig`] to rule those out up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    sample_rate_hz: u32,
    num_channels: u16,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_CHANNELS)
    }
}

impl StreamConfig {
    pub const fn new(sample_rate_hz: u32, num_channels: u16) -> Self {
        Self {
            sample_rate_hz,
            num_channels,
        }
    }

    #[inline]
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    #[inline]
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Samples per channel in one 10 ms frame.
    #[inline]
    pub fn num_frames(&self) -> usize {
        get_frame_size(self.sample_rate_hz)
    }

    /// Samples in one 10 ms frame across all channels.
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.num_channels as usize * self.num_frames()
    }

    /// Checks the format invariants of [`CheckedStreamConfig`].
    pub fn check(&self) -> Result<CheckedStreamConfig, StreamConfigError> {
        let num_channels = NonZeroU16::new(self.num_channels).ok_or(StreamConfigError::NoChannels)?;
        CheckedStreamConfig::new(self.sample_rate_hz, num_channels)
    }
}

/// Stream format with the rate and channel invariants already checked.
///
/// - `sample_rate_hz` is in `8000..=384000`.
/// - `sample_rate_hz` is divisible by `100` (exact 10 ms frames).
/// - `num_channels` is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckedStreamConfig {
    sample_rate_hz: NonZeroU32,
    num_channels: NonZeroU16,
}

impl CheckedStreamConfig {
    pub fn new(
        sample_rate_hz: u32,
        num_channels: NonZeroU16,
    ) -> Result<Self, StreamConfigError> {
        if !(MIN_SAMPLE_RATE_HZ..=MAX_SAMPLE_RATE_HZ).contains(&sample_rate_hz) {
            return Err(StreamConfigError::UnsupportedSampleRate { sample_rate_hz });
        }
        if sample_rate_hz % 100 != 0 {
            return Err(StreamConfigError::Non10msAlignedSampleRate { sample_rate_hz });
        }
        let sample_rate_hz = NonZeroU32::new(sample_rate_hz)
            .ok_or(StreamConfigError::UnsupportedSampleRate { sample_rate_hz })?;
        Ok(Self {
            sample_rate_hz,
            num_channels,
        })
    }

    pub const fn sample_rate_hz(self) -> u32 {
        self.sample_rate_hz.get()
    }

    pub const fn num_channels(self) -> NonZeroU16 {
        self.num_channels
    }

    pub const fn into_stream_config(self) -> StreamConfig {
        StreamConfig::new(self.sample_rate_hz(), self.num_channels.get())
    }
}

impl From<CheckedStreamConfig> for StreamConfig {
    fn from(value: CheckedStreamConfig) -> Self {
        value.into_stream_config()
    }
}

impl TryFrom<StreamConfig> for CheckedStreamConfig {
    type Error = StreamConfigError;

    fn try_from(value: StreamConfig) -> Result<Self, Self::Error> {
        value.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_is_ten_milliseconds() {
        assert_eq!(get_frame_size(8000), 80);
        assert_eq!(get_frame_size(16000), 160);
        assert_eq!(get_frame_size(44100), 441);
        assert_eq!(get_frame_size(DEFAULT_SAMPLE_RATE), 320);
    }

    #[test]
    fn default_stream_matches_constants() {
        let stream = StreamConfig::default();
        assert_eq!(stream.sample_rate_hz(), 32_000);
        assert_eq!(stream.num_channels(), 1);
        assert_eq!(stream.num_samples(), 320);
    }

    #[test]
    fn checked_stream_config_rejects_unsupported_sample_rate() {
        let err = CheckedStreamConfig::new(7_900, NonZeroU16::MIN).unwrap_err();
        assert_eq!(
            err,
            StreamConfigError::UnsupportedSampleRate {
                sample_rate_hz: 7_900,
            }
        );
    }

    #[test]
    fn checked_stream_config_rejects_non_10ms_aligned_rate() {
        let err = CheckedStreamConfig::new(44_101, NonZeroU16::MIN).unwrap_err();
        assert_eq!(
            err,
            StreamConfigError::Non10msAlignedSampleRate {
                sample_rate_hz: 44_101,
            }
        );
    }

    #[test]
    fn zero_channels_fail_the_check() {
        assert_eq!(
            StreamConfig::new(16000, 0).check(),
            Err(StreamConfigError::NoChannels)
        );
    }

    #[test]
    fn checked_stream_config_accepts_valid_values() {
        let checked = CheckedStreamConfig::try_from(StreamConfig::new(48_000, 2)).unwrap();
        assert_eq!(checked.sample_rate_hz(), 48_000);
        assert_eq!(checked.num_channels().get(), 2);

        let plain: StreamConfig = checked.into();
        assert_eq!(plain.num_frames(), 480);
        assert_eq!(plain.num_samples(), 960);
    }
}
