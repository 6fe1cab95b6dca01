//! Per-bin speech probability.
//!
//! The features are mapped through sigmoids against the prior model and
//! smoothed into a frame-level prior, which is then combined with each
//! bin's likelihood ratio.

use crate::signal_model::SignalModelEstimator;

const WIDTH_PRIOR_0: f32 = 4.0;
/// Wider map in pause regions.
const WIDTH_PRIOR_1: f32 = 2.0 * WIDTH_PRIOR_0;

#[derive(Debug)]
pub(crate) struct SpeechProbabilityEstimator {
    signal_model_estimator: SignalModelEstimator,
    prior_speech_prob: f32,
    speech_probability: Vec<f32>,
}

impl SpeechProbabilityEstimator {
    pub(crate) fn new(num_bins: usize, num_feature_bins: usize) -> Self {
        Self {
            signal_model_estimator: SignalModelEstimator::new(num_bins, num_feature_bins),
            prior_speech_prob: 0.5,
            speech_probability: vec![0.0; num_bins],
        }
    }

    pub(crate) fn update(&mut self, prior_snr: &[f32], post_snr: &[f32], signal_spectrum: &[f32]) {
        self.signal_model_estimator
            .update(prior_snr, post_snr, signal_spectrum);
        let model = self.signal_model_estimator.model();
        let prior_model = self.signal_model_estimator.prior_model();

        let width = if model.lrt < prior_model.lrt {
            WIDTH_PRIOR_1
        } else {
            WIDTH_PRIOR_0
        };
        let lrt_indicator = 0.5 * ((width * (model.lrt - prior_model.lrt)).tanh() + 1.0);

        let width = if model.spectral_flatness > prior_model.flatness_threshold {
            WIDTH_PRIOR_1
        } else {
            WIDTH_PRIOR_0
        };
        let flatness_indicator = 0.5
            * ((width * (prior_model.flatness_threshold - model.spectral_flatness)).tanh() + 1.0);

        let ind_prior = prior_model.lrt_weighting * lrt_indicator
            + prior_model.flatness_weighting * flatness_indicator;

        self.prior_speech_prob += 0.1 * (ind_prior - self.prior_speech_prob);
        self.prior_speech_prob = self.prior_speech_prob.clamp(0.01, 1.0);

        let gain_prior = (1.0 - self.prior_speech_prob) / (self.prior_speech_prob + 0.0001);
        for (p, &lrt) in self.speech_probability.iter_mut().zip(&model.avg_log_lrt) {
            let inv_lrt = (-lrt).clamp(-60.0, 60.0).exp();
            *p = 1.0 / (1.0 + gain_prior * inv_lrt);
        }
    }

    pub(crate) fn prior_probability(&self) -> f32 {
        self.prior_speech_prob
    }

    pub(crate) fn probability(&self) -> &[f32] {
        &self.speech_probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BINS: usize = 65;

    #[test]
    fn initial_state() {
        let est = SpeechProbabilityEstimator::new(BINS, BINS);
        assert_eq!(est.prior_probability(), 0.5);
        assert!(est.probability().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn probabilities_stay_in_range() {
        let mut est = SpeechProbabilityEstimator::new(BINS, BINS);
        let snr = [1.0f32; BINS];
        est.update(&snr, &snr, &[10.0; BINS]);
        for &p in est.probability() {
            assert!((0.0..=1.0).contains(&p), "probability {p} out of range");
        }
        assert!((0.01..=1.0).contains(&est.prior_probability()));
    }

    #[test]
    fn high_snr_peaky_spectrum_is_speech() {
        let mut est = SpeechProbabilityEstimator::new(BINS, BINS);
        let snr = [10.0f32; BINS];
        let peaky: Vec<f32> = (0..BINS).map(|i| if i % 6 == 0 { 5000.0 } else { 10.0 }).collect();
        for _ in 0..100 {
            est.update(&snr, &snr, &peaky);
        }
        let avg = est.probability().iter().sum::<f32>() / BINS as f32;
        assert!(avg > 0.9, "avg speech prob {avg}");
        assert!(est.prior_probability() > 0.9);
    }

    #[test]
    fn low_snr_flat_spectrum_is_noise() {
        let mut est = SpeechProbabilityEstimator::new(BINS, BINS);
        let snr = [0.01f32; BINS];
        for _ in 0..100 {
            est.update(&snr, &snr, &[1.0; BINS]);
        }
        let avg = est.probability().iter().sum::<f32>() / BINS as f32;
        assert!(avg < 0.2, "avg speech prob {avg}");
        assert!(est.prior_probability() < 0.1);
    }
}
