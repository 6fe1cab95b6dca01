//! Audio processing statistics.

/// Statistics from the processing pipeline.
///
/// All fields are `Option`. `None` means the statistic is unavailable,
/// usually because the relevant component is disabled or has not seen
/// enough audio yet.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioProcessingStats {
    /// RMS level of the last capture output frame, in dB below full scale
    /// (`0..=127`, larger is quieter).
    pub output_rms_dbfs: Option<i32>,
    /// Echo Return Loss in dB: `ERL = 10 log10(P_far / P_echo)`.
    pub echo_return_loss: Option<f64>,
    /// Echo Return Loss Enhancement in dB: `ERLE = 10 log10(P_echo / P_out)`.
    pub echo_return_loss_enhancement: Option<f64>,
    /// Fraction of blocks in the last reporting interval during which the
    /// linear filter was divergent.
    pub divergent_filter_fraction: Option<f64>,
    /// Render-to-capture delay currently compensated by the echo
    /// canceller, in milliseconds.
    pub delay_ms: Option<i32>,
    /// Speech probability of the last capture frame from gain controller 2,
    /// in `[0.0, 1.0]`. Only available with adaptive digital gain.
    pub speech_probability: Option<f32>,
}
