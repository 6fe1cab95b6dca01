//! Speech features: averaged log likelihood ratio and spectral flatness.

/// Initial value and prior threshold of the likelihood ratio feature.
const LRT_FEATURE_THR: f32 = 0.5;
const FLATNESS_AVERAGING: f32 = 0.3;

/// Features of the current frame.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SignalModel {
    pub(crate) lrt: f32,
    pub(crate) spectral_flatness: f32,
    /// Per-bin time-averaged log likelihood ratio.
    pub(crate) avg_log_lrt: Vec<f32>,
}

/// Thresholds and weights the features are compared against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PriorSignalModel {
    pub(crate) lrt: f32,
    pub(crate) flatness_threshold: f32,
    pub(crate) lrt_weighting: f32,
    pub(crate) flatness_weighting: f32,
}

impl Default for PriorSignalModel {
    fn default() -> Self {
        Self {
            lrt: LRT_FEATURE_THR,
            flatness_threshold: 0.5,
            lrt_weighting: 0.5,
            flatness_weighting: 0.5,
        }
    }
}

#[derive(Debug)]
pub(crate) struct SignalModelEstimator {
    num_feature_bins: usize,
    model: SignalModel,
    prior_model: PriorSignalModel,
}

impl SignalModelEstimator {
    pub(crate) fn new(num_bins: usize, num_feature_bins: usize) -> Self {
        Self {
            num_feature_bins,
            model: SignalModel {
                lrt: LRT_FEATURE_THR,
                spectral_flatness: 0.5,
                avg_log_lrt: vec![LRT_FEATURE_THR; num_bins],
            },
            prior_model: PriorSignalModel::default(),
        }
    }

    pub(crate) fn update(&mut self, prior_snr: &[f32], post_snr: &[f32], signal_spectrum: &[f32]) {
        self.update_spectral_lrt(prior_snr, post_snr);
        self.update_spectral_flatness(signal_spectrum);
    }

    fn update_spectral_lrt(&mut self, prior_snr: &[f32], post_snr: &[f32]) {
        for ((avg, &prior), &post) in self.model.avg_log_lrt.iter_mut().zip(prior_snr).zip(post_snr) {
            let tmp1 = 1.0 + 2.0 * prior;
            let tmp2 = 2.0 * prior / (tmp1 + 0.0001);
            let bessel_tmp = (post + 1.0) * tmp2;
            *avg += 0.5 * (bessel_tmp - tmp1.ln() - *avg);
        }
        let sum: f32 = self.model.avg_log_lrt[..self.num_feature_bins].iter().sum();
        self.model.lrt = sum / self.num_feature_bins as f32;
    }

    /// Geometric over arithmetic mean of the magnitude, DC excluded.
    fn update_spectral_flatness(&mut self, signal_spectrum: &[f32]) {
        let bins = &signal_spectrum[1..self.num_feature_bins];
        let flatness = &mut self.model.spectral_flatness;
        if bins.iter().any(|&s| s <= 0.0) {
            *flatness -= FLATNESS_AVERAGING * *flatness;
            return;
        }
        let n = bins.len() as f32;
        let log_mean = bins.iter().map(|s| s.ln()).sum::<f32>() / n;
        let mean = bins.iter().sum::<f32>() / n;
        let current = log_mean.exp() / mean;
        *flatness += FLATNESS_AVERAGING * (current - *flatness);
    }

    pub(crate) fn model(&self) -> &SignalModel {
        &self.model
    }

    pub(crate) fn prior_model(&self) -> &PriorSignalModel {
        &self.prior_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_spectrum_has_unit_flatness() {
        let mut est = SignalModelEstimator::new(65, 65);
        let zeros = vec![0.0f32; 65];
        for _ in 0..30 {
            est.update(&zeros, &zeros, &vec![42.0; 65]);
        }
        assert!((est.model().spectral_flatness - 1.0).abs() < 1e-3);
    }

    #[test]
    fn harmonic_spectrum_is_not_flat() {
        let mut est = SignalModelEstimator::new(65, 65);
        let zeros = vec![0.0f32; 65];
        let peaky: Vec<f32> = (0..65).map(|i| if i % 8 == 0 { 10000.0 } else { 1.0 }).collect();
        for _ in 0..30 {
            est.update(&zeros, &zeros, &peaky);
        }
        assert!(est.model().spectral_flatness < 0.2);
    }

    #[test]
    fn high_snr_raises_lrt() {
        let mut est = SignalModelEstimator::new(33, 33);
        let snr = vec![10.0f32; 33];
        for _ in 0..20 {
            est.update(&snr, &snr, &vec![1.0; 33]);
        }
        assert!(est.model().lrt > 5.0, "lrt {}", est.model().lrt);
    }
}
