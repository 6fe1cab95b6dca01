//! Noise spectrum tracking.
//!
//! The quantile estimate is blended with a parametric white/pink model
//! during startup, then refined frame by frame using the per-bin speech
//! probability.

use crate::config::{SHORT_STARTUP_PHASE_BLOCKS, SuppressionParams};
use crate::quantile_noise_estimator::QuantileNoiseEstimator;

/// First bin used when fitting the pink noise model.
const START_BAND: usize = 5;
const NOISE_UPDATE: f32 = 0.9;
const PROB_RANGE: f32 = 0.2;

#[derive(Debug)]
pub(crate) struct NoiseEstimator {
    params: SuppressionParams,
    quantile: QuantileNoiseEstimator,
    white_noise_level: f32,
    pink_noise_numerator: f32,
    pink_noise_exp: f32,
    prev_noise_spectrum: Vec<f32>,
    parametric_noise_spectrum: Vec<f32>,
    noise_spectrum: Vec<f32>,
}

impl NoiseEstimator {
    pub(crate) fn new(params: SuppressionParams, num_bins: usize) -> Self {
        Self {
            params,
            quantile: QuantileNoiseEstimator::new(num_bins),
            white_noise_level: 0.0,
            pink_noise_numerator: 0.0,
            pink_noise_exp: 0.0,
            prev_noise_spectrum: vec![0.0; num_bins],
            parametric_noise_spectrum: vec![0.0; num_bins],
            noise_spectrum: vec![0.0; num_bins],
        }
    }

    pub(crate) fn prepare_analysis(&mut self) {
        self.prev_noise_spectrum.copy_from_slice(&self.noise_spectrum);
    }

    /// First estimate of the frame, before speech probabilities are known.
    pub(crate) fn pre_update(
        &mut self,
        num_analyzed_frames: usize,
        signal_spectrum: &[f32],
        signal_spectral_sum: f32,
    ) {
        self.quantile.estimate(signal_spectrum, &mut self.noise_spectrum);
        if num_analyzed_frames >= SHORT_STARTUP_PHASE_BLOCKS {
            return;
        }

        let num_bins = signal_spectrum.len();
        let mut sum_log_i = 0.0f32;
        let mut sum_log_i_square = 0.0f32;
        let mut sum_log_magn = 0.0f32;
        let mut sum_log_i_log_magn = 0.0f32;
        for (i, &s) in signal_spectrum.iter().enumerate().skip(START_BAND) {
            let log_i = (i as f32).ln();
            let log_signal = s.max(1e-10).ln();
            sum_log_i += log_i;
            sum_log_i_square += log_i * log_i;
            sum_log_magn += log_signal;
            sum_log_i_log_magn += log_i * log_signal;
        }

        self.white_noise_level +=
            signal_spectral_sum / num_bins as f32 * self.params.over_subtraction_factor;

        // Least-squares fit of log magnitude against log frequency.
        let fit_bins = num_bins.saturating_sub(START_BAND) as f32;
        let denom = sum_log_i_square * fit_bins - sum_log_i * sum_log_i;
        if denom.abs() > f32::EPSILON {
            let num = sum_log_i_square * sum_log_magn - sum_log_i * sum_log_i_log_magn;
            self.pink_noise_numerator += (num / denom).max(0.0);
            let num = sum_log_i * sum_log_magn - fit_bins * sum_log_i_log_magn;
            self.pink_noise_exp += (num / denom).clamp(0.0, 1.0);
        }

        let one_by_frames_plus_1 = 1.0 / (num_analyzed_frames as f32 + 1.0);
        if self.pink_noise_exp > 0.0 {
            let parametric_num = (self.pink_noise_numerator * one_by_frames_plus_1).exp()
                * (num_analyzed_frames as f32 + 1.0);
            let parametric_exp = self.pink_noise_exp * one_by_frames_plus_1;
            for (i, p) in self.parametric_noise_spectrum.iter_mut().enumerate() {
                let band = i.max(START_BAND) as f32;
                *p = parametric_num / band.powf(parametric_exp);
            }
        } else {
            self.parametric_noise_spectrum.fill(self.white_noise_level);
        }

        let startup = SHORT_STARTUP_PHASE_BLOCKS as f32;
        let weight_model = (startup - num_analyzed_frames as f32) * one_by_frames_plus_1;
        for (n, &p) in self
            .noise_spectrum
            .iter_mut()
            .zip(&self.parametric_noise_spectrum)
        {
            *n = (*n * num_analyzed_frames as f32 + p * weight_model) / startup;
        }
    }

    /// Refines the estimate with the frame's speech probabilities.
    pub(crate) fn post_update(&mut self, speech_probability: &[f32], signal_spectrum: &[f32]) {
        let mut gamma = NOISE_UPDATE;
        for i in 0..self.noise_spectrum.len() {
            let prob_speech = speech_probability[i];
            let prob_non_speech = 1.0 - prob_speech;
            let prev = self.prev_noise_spectrum[i];
            let signal = signal_spectrum[i];

            let update_tmp =
                gamma * prev + (1.0 - gamma) * (prob_non_speech * signal + prob_speech * prev);

            let gamma_old = gamma;
            gamma = if prob_speech > PROB_RANGE { 0.99 } else { NOISE_UPDATE };

            self.noise_spectrum[i] = if gamma == gamma_old {
                update_tmp
            } else {
                // Downward updates are always allowed.
                let n =
                    gamma * prev + (1.0 - gamma) * (prob_non_speech * signal + prob_speech * prev);
                n.min(update_tmp)
            };
        }
    }

    pub(crate) fn noise_spectrum(&self) -> &[f32] {
        &self.noise_spectrum
    }

    pub(crate) fn prev_noise_spectrum(&self) -> &[f32] {
        &self.prev_noise_spectrum
    }

    pub(crate) fn parametric_noise_spectrum(&self) -> &[f32] {
        &self.parametric_noise_spectrum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuppressionLevel;

    #[test]
    fn white_input_gives_flat_estimate() {
        let mut est = NoiseEstimator::new(SuppressionParams::new(SuppressionLevel::K6dB), 65);
        let signal = vec![500.0f32; 65];
        let sum = signal.iter().sum();
        let speech = vec![0.0f32; 65];
        for frame in 0..300 {
            est.prepare_analysis();
            est.pre_update(frame, &signal, sum);
            est.post_update(&speech, &signal);
        }
        for &n in est.noise_spectrum() {
            assert!((n / 500.0 - 1.0).abs() < 0.25, "noise {n}");
        }
    }

    #[test]
    fn speech_frames_freeze_the_estimate() {
        let mut est = NoiseEstimator::new(SuppressionParams::new(SuppressionLevel::K12dB), 33);
        let noise = vec![100.0f32; 33];
        let no_speech = vec![0.0f32; 33];
        for frame in 0..300 {
            est.prepare_analysis();
            est.pre_update(frame, &noise, 3300.0);
            est.post_update(&no_speech, &noise);
        }
        let before = est.noise_spectrum().to_vec();
        let loud = vec![10000.0f32; 33];
        let speech = vec![1.0f32; 33];
        est.prepare_analysis();
        est.post_update(&speech, &loud);
        for (a, b) in before.iter().zip(est.noise_spectrum()) {
            assert!((a - b).abs() <= 1e-3 * a, "{a} -> {b}");
        }
    }
}
