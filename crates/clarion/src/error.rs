//! Errors returned by [`AudioProcessing`](crate::AudioProcessing).

use std::fmt;

use crate::stream_config::StreamConfigError;

/// Numeric code of a successful call.
pub const NO_ERROR: i32 = 0;

/// Broad class of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid format or parameter combination. The session, if any, keeps
    /// its previous configuration.
    Configuration,
    /// A frame or a per-call parameter did not match the stream contract.
    /// Nothing was processed and the session is still usable.
    FrameContract,
    /// The pipeline failed internally and was reset.
    Processing,
}

/// Error returned by the processing calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A configuration field is out of range. Names the component.
    BadParameter(&'static str),
    /// The stream rate is outside `8000..=384000`, not a multiple of
    /// 100 Hz, or cannot be resampled to the processing rate.
    BadSampleRate { sample_rate_hz: u32 },
    /// The stream has no channels, or the output channel count is not
    /// allowed for the input: float output must be mono or match the input,
    /// and `i16` output must match the input.
    BadNumberChannels { num_channels: usize },
    /// A planar buffer has a different number of channels than its stream.
    BadChannelCount { expected: usize, actual: usize },
    /// A buffer length does not match the 10 ms frame of its stream.
    BadDataLength { expected: usize, actual: usize },
    /// The call needs a stream format, and none has been configured or
    /// seen yet.
    NotInitialized,
    /// The analog gain controller needs
    /// [`set_stream_analog_level`](crate::AudioProcessing::set_stream_analog_level)
    /// before the first capture frame.
    StreamParameterNotSet,
    /// The requested output is not produced with the current config.
    NotEnabled,
    /// A stream parameter was out of range and has been clamped. The call
    /// otherwise took effect.
    BadStreamParameter,
    /// Processing produced an invalid signal. The output frame was muted
    /// and the adaptive state reset.
    Internal(&'static str),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadParameter(_)
            | Self::BadSampleRate { .. }
            | Self::BadNumberChannels { .. }
            | Self::NotInitialized
            | Self::NotEnabled => ErrorKind::Configuration,
            Self::BadChannelCount { .. }
            | Self::BadDataLength { .. }
            | Self::StreamParameterNotSet
            | Self::BadStreamParameter => ErrorKind::FrameContract,
            Self::Internal(_) => ErrorKind::Processing,
        }
    }

    /// Result code of the classic C interface.
    pub fn code(&self) -> i32 {
        match self {
            Self::Internal(_) => -1,
            Self::NotInitialized => -2,
            Self::BadParameter(_) => -6,
            Self::BadSampleRate { .. } => -7,
            Self::BadDataLength { .. } => -8,
            Self::BadNumberChannels { .. } | Self::BadChannelCount { .. } => -9,
            Self::StreamParameterNotSet => -11,
            Self::NotEnabled => -12,
            Self::BadStreamParameter => -13,
        }
    }

    /// True for errors that only report a clamped parameter.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::BadStreamParameter)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::BadParameter(component) => write!(f, "invalid {component} configuration"),
            Self::BadSampleRate { sample_rate_hz } => {
                write!(f, "unsupported sample rate {sample_rate_hz} Hz")
            }
            Self::BadNumberChannels { num_channels } => {
                write!(f, "unsupported number of channels: {num_channels}")
            }
            Self::BadChannelCount { expected, actual } => {
                write!(f, "expected {expected} channels, got {actual}")
            }
            Self::BadDataLength { expected, actual } => {
                write!(f, "expected {expected} samples, got {actual}")
            }
            Self::NotInitialized => write!(f, "no stream format configured"),
            Self::StreamParameterNotSet => write!(f, "stream analog level not set"),
            Self::NotEnabled => write!(f, "output not enabled in the current config"),
            Self::BadStreamParameter => write!(f, "stream parameter out of range, clamped"),
            Self::Internal(reason) => write!(f, "internal processing error: {reason}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StreamConfigError> for Error {
    fn from(err: StreamConfigError) -> Self {
        match err {
            StreamConfigError::UnsupportedSampleRate { sample_rate_hz }
            | StreamConfigError::Non10msAlignedSampleRate { sample_rate_hz } => {
                Self::BadSampleRate { sample_rate_hz }
            }
            StreamConfigError::NoChannels => Self::BadNumberChannels { num_channels: 0 },
        }
    }
}

/// Result code of a call: [`NO_ERROR`] or [`Error::code`].
pub fn result_code<T>(result: &Result<T, Error>) -> i32 {
    result.as_ref().map_or_else(Error::code, |_| NO_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_c_interface() {
        assert_eq!(result_code(&Ok::<(), Error>(())), 0);
        assert_eq!(Error::BadParameter("x").code(), -6);
        assert_eq!(Error::BadSampleRate { sample_rate_hz: 1 }.code(), -7);
        assert_eq!(Error::BadDataLength { expected: 1, actual: 2 }.code(), -8);
        assert_eq!(Error::BadNumberChannels { num_channels: 0 }.code(), -9);
        assert_eq!(Error::StreamParameterNotSet.code(), -11);
        assert_eq!(Error::BadStreamParameter.code(), -13);
        assert_eq!(result_code(&Err::<(), _>(Error::NotEnabled)), -12);
    }

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(
            Error::BadSampleRate { sample_rate_hz: 100 }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::BadDataLength { expected: 160, actual: 100 }.kind(),
            ErrorKind::FrameContract
        );
        assert_eq!(Error::Internal("nan").kind(), ErrorKind::Processing);
        assert!(Error::BadStreamParameter.is_warning());
        assert!(!Error::NotInitialized.is_warning());
    }

    #[test]
    fn stream_config_errors_map_to_configuration_errors() {
        let err: Error = StreamConfigError::Non10msAlignedSampleRate {
            sample_rate_hz: 44_101,
        }
        .into();
        assert_eq!(err, Error::BadSampleRate { sample_rate_hz: 44_101 });
        let err: Error = StreamConfigError::NoChannels.into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.code(), -9);
    }

    #[test]
    fn display_names_the_problem() {
        let msg = Error::BadDataLength {
            expected: 160,
            actual: 100,
        }
        .to_string();
        assert_eq!(msg, "expected 160 samples, got 100");
    }
}
