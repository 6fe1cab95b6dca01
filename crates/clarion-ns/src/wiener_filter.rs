//! Decision-directed Wiener gain.

use crate::config::{LONG_STARTUP_PHASE_BLOCKS, SHORT_STARTUP_PHASE_BLOCKS, SuppressionParams};

/// Threshold on the energy ratio in the overall scaling.
const B_LIM: f32 = 0.5;

#[derive(Debug)]
pub(crate) struct WienerFilter {
    params: SuppressionParams,
    spectrum_prev_process: Vec<f32>,
    filter: Vec<f32>,
}

impl WienerFilter {
    pub(crate) fn new(params: SuppressionParams, num_bins: usize) -> Self {
        Self {
            params,
            spectrum_prev_process: vec![0.0; num_bins],
            filter: vec![1.0; num_bins],
        }
    }

    pub(crate) fn update(
        &mut self,
        num_analyzed_frames: usize,
        noise_spectrum: &[f32],
        prev_noise_spectrum: &[f32],
        parametric_noise_spectrum: &[f32],
        signal_spectrum: &[f32],
    ) {
        let min_gain = self.params.minimum_attenuating_gain;
        for i in 0..self.filter.len() {
            let prev_tsa =
                self.spectrum_prev_process[i] / (prev_noise_spectrum[i] + 0.0001) * self.filter[i];
            let current_tsa = if signal_spectrum[i] > noise_spectrum[i] {
                signal_spectrum[i] / (noise_spectrum[i] + 0.0001) - 1.0
            } else {
                0.0
            };
            let snr_prior = 0.98 * prev_tsa + 0.02 * current_tsa;
            let gain = snr_prior / (self.params.over_subtraction_factor + snr_prior);
            self.filter[i] = gain.clamp(min_gain, 1.0);
        }

        if num_analyzed_frames < SHORT_STARTUP_PHASE_BLOCKS {
            let startup = SHORT_STARTUP_PHASE_BLOCKS as f32;
            let frames = num_analyzed_frames as f32;
            for ((f, &p), &s) in self
                .filter
                .iter_mut()
                .zip(parametric_noise_spectrum)
                .zip(signal_spectrum)
            {
                let model = (1.0 - p / (s + 0.0001)).clamp(min_gain, 1.0);
                *f = (*f * frames + model * (startup - frames)) / startup;
            }
        }

        self.spectrum_prev_process.copy_from_slice(signal_spectrum);
    }

    /// Time-domain correction applied after startup, based on how much
    /// energy the filter removed.
    pub(crate) fn overall_scaling_factor(
        &self,
        num_analyzed_frames: usize,
        prior_speech_probability: f32,
        energy_before_filtering: f32,
        energy_after_filtering: f32,
    ) -> f32 {
        if !self.params.use_attenuation_adjustment
            || num_analyzed_frames <= LONG_STARTUP_PHASE_BLOCKS
        {
            return 1.0;
        }
        let mut gain = (energy_after_filtering / (energy_before_filtering + 1.0)).sqrt();

        let mut scale_speech = 1.0;
        if gain > B_LIM {
            scale_speech = 1.0 + 1.3 * (gain - B_LIM);
            if gain * scale_speech > 1.0 {
                scale_speech = 1.0 / gain;
            }
        }
        let mut scale_pause = 1.0;
        if gain < B_LIM {
            gain = gain.max(self.params.minimum_attenuating_gain);
            scale_pause = 1.0 - 0.3 * (B_LIM - gain);
        }
        prior_speech_probability * scale_speech + (1.0 - prior_speech_probability) * scale_pause
    }

    pub(crate) fn filter(&self) -> &[f32] {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuppressionLevel;

    #[test]
    fn noise_only_hits_the_floor() {
        let params = SuppressionParams::new(SuppressionLevel::K18dB);
        let mut filter = WienerFilter::new(params, 17);
        let noise = vec![100.0f32; 17];
        for frame in 0..100 {
            filter.update(frame, &noise, &noise, &noise, &noise);
        }
        for &g in filter.filter() {
            assert!((g - params.minimum_attenuating_gain).abs() < 1e-6, "gain {g}");
        }
    }

    #[test]
    fn strong_signal_passes() {
        let params = SuppressionParams::new(SuppressionLevel::K12dB);
        let mut filter = WienerFilter::new(params, 17);
        let noise = vec![1.0f32; 17];
        let signal = vec![1000.0f32; 17];
        for frame in 0..100 {
            filter.update(frame, &noise, &noise, &noise, &signal);
        }
        assert!(filter.filter().iter().all(|&g| g > 0.99));
    }

    #[test]
    fn scaling_is_neutral_during_startup_and_for_low_level() {
        let low = WienerFilter::new(SuppressionParams::new(SuppressionLevel::K6dB), 4);
        assert_eq!(low.overall_scaling_factor(1000, 0.5, 100.0, 10.0), 1.0);
        let high = WienerFilter::new(SuppressionParams::new(SuppressionLevel::K21dB), 4);
        assert_eq!(high.overall_scaling_factor(10, 0.5, 100.0, 10.0), 1.0);
        let scale = high.overall_scaling_factor(1000, 0.0, 100.0, 1.0);
        assert!(scale < 1.0 && scale > 0.8, "scale {scale}");
    }
}
