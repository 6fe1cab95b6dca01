//! Suppression levels and the per-rate frame layout.

/// Frames during which the noise spectrum is blended with a parametric
/// white/pink model.
pub(crate) const SHORT_STARTUP_PHASE_BLOCKS: usize = 50;
/// Frames before the quantile tracker and the overall scaling settle.
pub(crate) const LONG_STARTUP_PHASE_BLOCKS: usize = 200;
/// Speech features only look at bins below this frequency.
const FEATURE_BANDWIDTH_HZ: usize = 8000;

/// Target noise attenuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuppressionLevel {
    /// Low.
    K6dB,
    /// Moderate.
    #[default]
    K12dB,
    /// High.
    K18dB,
    /// Very high.
    K21dB,
}

/// Noise suppressor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NsConfig {
    pub target_level: SuppressionLevel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SuppressionParams {
    pub(crate) over_subtraction_factor: f32,
    pub(crate) minimum_attenuating_gain: f32,
    pub(crate) use_attenuation_adjustment: bool,
}

impl SuppressionParams {
    pub(crate) fn new(level: SuppressionLevel) -> Self {
        let (over_subtraction_factor, minimum_attenuating_gain, use_attenuation_adjustment) =
            match level {
                SuppressionLevel::K6dB => (1.0, 0.5, false),
                SuppressionLevel::K12dB => (1.0, 0.25, true),
                SuppressionLevel::K18dB => (1.1, 0.125, true),
                SuppressionLevel::K21dB => (1.25, 0.089_125, true),
            };
        Self {
            over_subtraction_factor,
            minimum_attenuating_gain,
            use_attenuation_adjustment,
        }
    }
}

/// Sizes derived from the sample rate. Each 10 ms frame is prefixed with
/// half a frame of history before windowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameLayout {
    pub(crate) frame_len: usize,
    pub(crate) overlap_len: usize,
    pub(crate) fft_len: usize,
    pub(crate) num_bins: usize,
    pub(crate) num_feature_bins: usize,
}

impl FrameLayout {
    pub(crate) fn new(sample_rate_hz: u32) -> Self {
        let rate = sample_rate_hz as usize;
        let frame_len = rate / 100;
        let overlap_len = frame_len / 2;
        let fft_len = (frame_len + overlap_len).next_power_of_two();
        let num_bins = fft_len / 2 + 1;
        let num_feature_bins = (FEATURE_BANDWIDTH_HZ * fft_len / rate + 1).min(num_bins);
        Self {
            frame_len,
            overlap_len,
            fft_len,
            num_bins,
            num_feature_bins,
        }
    }

    pub(crate) fn extended_len(&self) -> usize {
        self.frame_len + self.overlap_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_for_native_rates() {
        let l = FrameLayout::new(16000);
        assert_eq!((l.frame_len, l.overlap_len, l.fft_len), (160, 80, 256));
        assert_eq!((l.num_bins, l.num_feature_bins), (129, 129));

        let l = FrameLayout::new(8000);
        assert_eq!((l.frame_len, l.fft_len, l.num_bins), (80, 128, 65));
        assert_eq!(l.num_feature_bins, 65);

        let l = FrameLayout::new(48000);
        assert_eq!((l.frame_len, l.extended_len(), l.fft_len), (480, 720, 1024));
        assert_eq!(l.num_feature_bins, 171);
    }

    #[test]
    fn stronger_levels_attenuate_more() {
        let levels = [
            SuppressionLevel::K6dB,
            SuppressionLevel::K12dB,
            SuppressionLevel::K18dB,
            SuppressionLevel::K21dB,
        ];
        for pair in levels.windows(2) {
            let weak = SuppressionParams::new(pair[0]);
            let strong = SuppressionParams::new(pair[1]);
            assert!(strong.minimum_attenuating_gain < weak.minimum_attenuating_gain);
            assert!(strong.over_subtraction_factor >= weak.over_subtraction_factor);
        }
    }
}
