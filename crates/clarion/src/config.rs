//! Audio processing configuration.
//!
//! Every component is off by default. Enable one by setting its `enabled`
//! flag, either before [`build`](crate::AudioProcessingBuilder::build) or
//! live through [`apply_config`](crate::AudioProcessing::apply_config). A
//! live change takes effect at the next frame; components whose settings
//! did not change keep their adaptive state.
//!
//! # Example
//!
//! ```
//! use clarion::Config;
//! use clarion::config::{EchoCanceller, NoiseSuppression, NoiseSuppressionLevel};
//!
//! let config = Config {
//!     echo_canceller: EchoCanceller {
//!         enabled: true,
//!         ..Default::default()
//!     },
//!     noise_suppression: NoiseSuppression {
//!         enabled: true,
//!         level: NoiseSuppressionLevel::High,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use clarion_agc::{Agc1Config, AgcMode};
use clarion_agc2::{AdaptiveDigitalConfig, Agc2Config, FixedDigitalConfig};
use clarion_ns::{NsConfig, SuppressionLevel};

use crate::Error;

/// Top-level configuration for the processing pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub pipeline: Pipeline,
    pub high_pass_filter: HighPassFilter,
    pub echo_canceller: EchoCanceller,
    pub noise_suppression: NoiseSuppression,
    pub gain_controller1: GainController1,
    pub gain_controller2: GainController2,
}

impl Config {
    /// Checks every enabled component's parameters.
    ///
    /// Returns [`Error::BadParameter`] for the first field out of range.
    /// Disabled components are not checked.
    pub fn validate(&self) -> Result<(), Error> {
        if self.gain_controller1.enabled && !self.gain_controller1.to_agc1_config().is_valid() {
            return Err(Error::BadParameter("gain_controller1"));
        }
        if self.gain_controller2.enabled && !self.gain_controller2.to_agc2_config().is_valid() {
            return Err(Error::BadParameter("gain_controller2"));
        }
        Ok(())
    }

    /// True when the high-pass filter runs, either on its own or because
    /// the full echo canceller requires it.
    pub(crate) fn high_pass_filter_active(&self) -> bool {
        self.high_pass_filter.enabled
            || (self.echo_canceller.enabled
                && !self.echo_canceller.mobile_mode
                && self.echo_canceller.enforce_high_pass_filtering)
    }

    /// True when the echo canceller has to produce its linear output.
    pub(crate) fn linear_aec_output_needed(&self) -> bool {
        self.echo_canceller.enabled
            && (self.echo_canceller.export_linear_aec_output
                || (self.noise_suppression.enabled
                    && self.noise_suppression.analyze_linear_aec_output_when_available))
    }
}

/// Upper bound on the internal processing rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxProcessingRate {
    #[default]
    Rate32kHz,
    Rate48kHz,
}

impl MaxProcessingRate {
    pub(crate) fn as_hz(self) -> u32 {
        match self {
            Self::Rate32kHz => 32000,
            Self::Rate48kHz => 48000,
        }
    }
}

/// Pipeline processing properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    /// Maximum rate used internally. Streams above it are resampled down
    /// for processing and back up for output.
    pub maximum_internal_processing_rate: MaxProcessingRate,
}

/// High-pass filter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighPassFilter {
    pub enabled: bool,
    /// The pipeline never splits bands, so the filter always covers the
    /// full band. Kept for configuration compatibility.
    pub apply_in_full_band: bool,
}

impl Default for HighPassFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            apply_in_full_band: true,
        }
    }
}

/// Echo canceller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoCanceller {
    pub enabled: bool,
    /// Use the cheaper time-domain canceller.
    pub mobile_mode: bool,
    /// Keep the linear filter output available through
    /// [`AudioProcessing::linear_aec_output`](crate::AudioProcessing::linear_aec_output).
    pub export_linear_aec_output: bool,
    /// Force the high-pass filter on in full mode (default: true). Has no
    /// effect in mobile mode.
    pub enforce_high_pass_filtering: bool,
}

impl Default for EchoCanceller {
    fn default() -> Self {
        Self {
            enabled: false,
            mobile_mode: false,
            export_linear_aec_output: false,
            enforce_high_pass_filtering: true,
        }
    }
}

/// Background noise suppression settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoiseSuppression {
    pub enabled: bool,
    pub level: NoiseSuppressionLevel,
    /// Estimate noise on the linear echo canceller output, when the echo
    /// canceller runs, instead of on the suppressed capture signal.
    pub analyze_linear_aec_output_when_available: bool,
}

/// Noise suppression aggressiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseSuppressionLevel {
    /// About 6 dB.
    Low,
    /// About 12 dB.
    #[default]
    Moderate,
    /// About 18 dB.
    High,
    /// About 21 dB.
    VeryHigh,
}

impl NoiseSuppression {
    pub(crate) fn to_ns_config(&self) -> NsConfig {
        NsConfig {
            target_level: match self.level {
                NoiseSuppressionLevel::Low => SuppressionLevel::K6dB,
                NoiseSuppressionLevel::Moderate => SuppressionLevel::K12dB,
                NoiseSuppressionLevel::High => SuppressionLevel::K18dB,
                NoiseSuppressionLevel::VeryHigh => SuppressionLevel::K21dB,
            },
        }
    }
}

/// Gain controller 1 level adaptation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GainController1Mode {
    /// Recommend a hardware (analog) level through
    /// [`recommended_stream_analog_level`](crate::AudioProcessing::recommended_stream_analog_level).
    /// The level must be reported with
    /// [`set_stream_analog_level`](crate::AudioProcessing::set_stream_analog_level)
    /// before the first capture frame.
    #[default]
    AdaptiveAnalog,
    /// Adapt a digital pre-gain internally.
    AdaptiveDigital,
    /// Compressor with a fixed gain.
    FixedDigital,
}

/// Gain controller 1 settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GainController1 {
    pub enabled: bool,
    pub mode: GainController1Mode,
    /// Target peak level in dB below full scale, `0..=31`.
    pub target_level_dbfs: i32,
    /// Maximum gain the compressor applies, `0..=90`.
    pub compression_gain_db: i32,
    pub enable_limiter: bool,
    /// Lowest analog level the caller's hardware accepts, `0..=255`.
    pub analog_level_minimum: i32,
    /// Highest analog level, `0..=255`, above the minimum.
    pub analog_level_maximum: i32,
}

impl Default for GainController1 {
    fn default() -> Self {
        let defaults = Agc1Config::default();
        Self {
            enabled: false,
            mode: GainController1Mode::AdaptiveAnalog,
            target_level_dbfs: defaults.target_level_dbfs,
            compression_gain_db: defaults.compression_gain_db,
            enable_limiter: defaults.enable_limiter,
            analog_level_minimum: defaults.analog_level_minimum,
            analog_level_maximum: defaults.analog_level_maximum,
        }
    }
}

impl GainController1 {
    pub(crate) fn to_agc1_config(&self) -> Agc1Config {
        Agc1Config {
            mode: match self.mode {
                GainController1Mode::AdaptiveAnalog => AgcMode::AdaptiveAnalog,
                GainController1Mode::AdaptiveDigital => AgcMode::AdaptiveDigital,
                GainController1Mode::FixedDigital => AgcMode::FixedDigital,
            },
            target_level_dbfs: self.target_level_dbfs,
            compression_gain_db: self.compression_gain_db,
            enable_limiter: self.enable_limiter,
            analog_level_minimum: self.analog_level_minimum,
            analog_level_maximum: self.analog_level_maximum,
        }
    }
}

/// Gain controller 2 settings: a fixed gain, an optional adaptive digital
/// gain, then a limiter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GainController2 {
    pub enabled: bool,
    pub adaptive_digital: AdaptiveDigital,
    pub fixed_digital: FixedDigital,
}

impl GainController2 {
    pub(crate) fn to_agc2_config(&self) -> Agc2Config {
        let a = &self.adaptive_digital;
        Agc2Config {
            fixed_digital: FixedDigitalConfig {
                gain_db: self.fixed_digital.gain_db,
            },
            adaptive_digital: AdaptiveDigitalConfig {
                enabled: a.enabled,
                headroom_db: a.headroom_db,
                max_gain_db: a.max_gain_db,
                initial_gain_db: a.initial_gain_db,
                max_gain_change_db_per_second: a.max_gain_change_db_per_second,
                max_output_noise_level_dbfs: a.max_output_noise_level_dbfs,
            },
        }
    }
}

/// Adaptive digital controller settings within gain controller 2.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveDigital {
    pub enabled: bool,
    pub headroom_db: f32,
    pub max_gain_db: f32,
    pub initial_gain_db: f32,
    pub max_gain_change_db_per_second: f32,
    pub max_output_noise_level_dbfs: f32,
}

impl Default for AdaptiveDigital {
    fn default() -> Self {
        let defaults = AdaptiveDigitalConfig::default();
        Self {
            enabled: defaults.enabled,
            headroom_db: defaults.headroom_db,
            max_gain_db: defaults.max_gain_db,
            initial_gain_db: defaults.initial_gain_db,
            max_gain_change_db_per_second: defaults.max_gain_change_db_per_second,
            max_output_noise_level_dbfs: defaults.max_output_noise_level_dbfs,
        }
    }
}

/// Fixed digital gain within gain controller 2, applied before the
/// limiter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixedDigital {
    /// `0.0..50.0` dB. Above zero the limiter acts as a compressor.
    pub gain_db: f32,
}
