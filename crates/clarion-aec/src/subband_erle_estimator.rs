//! Per-bin echo return loss enhancement.
//!
//! Capture and error spectra are accumulated over a few blocks before a new
//! ratio is formed. Onset detection lowers the compensated estimate in bins
//! where the render signal has been quiet for a while, so that the first
//! echo after a pause is not under-suppressed.

use crate::common::{
    BLOCKS_TO_HOLD_ERLE, FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_PLUS_1, Spectrum,
    X2_BAND_ENERGY_THRESHOLD,
};
use crate::config::Erle;

const BLOCKS_FOR_ONSET_DETECTION: i32 = BLOCKS_TO_HOLD_ERLE + 150;
const POINTS_TO_ACCUMULATE: usize = 6;
const UNBOUNDED_ERLE_MAX: f32 = 100_000.0;

fn max_erle_bands(config: &Erle) -> Spectrum {
    let mut max_erle = [0.0; FFT_LENGTH_BY_2_PLUS_1];
    max_erle[..FFT_LENGTH_BY_2 / 2].fill(config.max_l);
    max_erle[FFT_LENGTH_BY_2 / 2..].fill(config.max_h);
    max_erle
}

#[derive(Debug)]
struct Accumulated {
    y2: Spectrum,
    e2: Spectrum,
    low_render_energy: [bool; FFT_LENGTH_BY_2_PLUS_1],
    points: usize,
}

impl Accumulated {
    fn new() -> Self {
        Self {
            y2: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            e2: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            low_render_energy: [false; FFT_LENGTH_BY_2_PLUS_1],
            points: 0,
        }
    }

    fn clear(&mut self) {
        *self = Self::new();
    }
}

/// ERLE tracker for one capture channel.
#[derive(Debug)]
pub(crate) struct SubbandErleEstimator {
    onset_detection: bool,
    min_erle: f32,
    max_erle: Spectrum,
    accumulated: Accumulated,
    erle: Spectrum,
    erle_onset_compensated: Spectrum,
    erle_unbounded: Spectrum,
    coming_onset: [bool; FFT_LENGTH_BY_2_PLUS_1],
    hold_counters: [i32; FFT_LENGTH_BY_2_PLUS_1],
}

impl SubbandErleEstimator {
    pub(crate) fn new(config: &Erle) -> Self {
        let mut estimator = Self {
            onset_detection: config.onset_detection,
            min_erle: config.min,
            max_erle: max_erle_bands(config),
            accumulated: Accumulated::new(),
            erle: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            erle_onset_compensated: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            erle_unbounded: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            coming_onset: [true; FFT_LENGTH_BY_2_PLUS_1],
            hold_counters: [0; FFT_LENGTH_BY_2_PLUS_1],
        };
        estimator.reset();
        estimator
    }

    pub(crate) fn reset(&mut self) {
        self.erle.fill(self.min_erle);
        self.erle_onset_compensated.fill(self.min_erle);
        self.erle_unbounded.fill(self.min_erle);
        self.coming_onset.fill(true);
        self.hold_counters.fill(0);
        self.accumulated.clear();
    }

    /// Feeds the render, capture and error power spectra of one block.
    /// Nothing is learned while the linear filter has not converged.
    pub(crate) fn update(&mut self, x2: &Spectrum, y2: &Spectrum, e2: &Spectrum, converged: bool) {
        if converged {
            self.accumulate(x2, y2, e2);
            self.update_bands();
        }
        if self.onset_detection {
            self.decay_after_render_pauses();
        }
        for erle in [&mut self.erle, &mut self.erle_onset_compensated, &mut self.erle_unbounded] {
            erle[0] = erle[1];
            erle[FFT_LENGTH_BY_2] = erle[FFT_LENGTH_BY_2 - 1];
        }
    }

    pub(crate) fn erle(&self, onset_compensated: bool) -> &Spectrum {
        if onset_compensated && self.onset_detection {
            &self.erle_onset_compensated
        } else {
            &self.erle
        }
    }

    fn accumulate(&mut self, x2: &Spectrum, y2: &Spectrum, e2: &Spectrum) {
        if self.accumulated.points == POINTS_TO_ACCUMULATE {
            self.accumulated.clear();
        }
        let acc = &mut self.accumulated;
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            acc.y2[k] += y2[k];
            acc.e2[k] += e2[k];
            acc.low_render_energy[k] |= x2[k] < X2_BAND_ENERGY_THRESHOLD;
        }
        acc.points += 1;
    }

    fn update_bands(&mut self) {
        if self.accumulated.points != POINTS_TO_ACCUMULATE {
            return;
        }
        for k in 1..FFT_LENGTH_BY_2 {
            if self.accumulated.e2[k] <= 0.0 {
                continue;
            }
            let new_erle = self.accumulated.y2[k] / self.accumulated.e2[k];
            let low_render_energy = self.accumulated.low_render_energy[k];
            if self.onset_detection && !low_render_energy {
                self.coming_onset[k] = false;
                self.hold_counters[k] = BLOCKS_FOR_ONSET_DETECTION;
            }
            let max_erle = self.max_erle[k];
            update_erle_band(&mut self.erle[k], new_erle, low_render_energy, self.min_erle, max_erle);
            if self.onset_detection {
                update_erle_band(
                    &mut self.erle_onset_compensated[k],
                    new_erle,
                    low_render_energy,
                    self.min_erle,
                    max_erle,
                );
            }
            update_erle_band(
                &mut self.erle_unbounded[k],
                new_erle,
                low_render_energy,
                self.min_erle,
                UNBOUNDED_ERLE_MAX,
            );
        }
    }

    fn decay_after_render_pauses(&mut self) {
        for k in 1..FFT_LENGTH_BY_2 {
            self.hold_counters[k] -= 1;
            if self.hold_counters[k] > BLOCKS_FOR_ONSET_DETECTION - BLOCKS_TO_HOLD_ERLE {
                continue;
            }
            if self.erle_onset_compensated[k] > self.min_erle {
                self.erle_onset_compensated[k] =
                    self.min_erle.max(0.97 * self.erle_onset_compensated[k]);
            }
            if self.hold_counters[k] <= 0 {
                self.coming_onset[k] = true;
                self.hold_counters[k] = 0;
            }
        }
    }
}

fn update_erle_band(erle: &mut f32, new_erle: f32, low_render_energy: bool, min: f32, max: f32) {
    let alpha = if new_erle < *erle {
        if low_render_energy { 0.0 } else { 0.1 }
    } else {
        0.05
    };
    *erle = (*erle + alpha * (new_erle - *erle)).clamp(min, max);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectra(x_level: f32, y_over_x: f32, erle: f32) -> (Spectrum, Spectrum, Spectrum) {
        let x2 = [x_level; FFT_LENGTH_BY_2_PLUS_1];
        let y2 = x2.map(|x| x * y_over_x);
        let e2 = y2.map(|y| y / erle);
        (x2, y2, e2)
    }

    #[test]
    fn starts_at_min() {
        let config = Erle::default();
        let estimator = SubbandErleEstimator::new(&config);
        assert!(estimator.erle(false).iter().all(|&v| v == config.min));
        assert!(estimator.erle(true).iter().all(|&v| v == config.min));
    }

    #[test]
    fn rises_towards_bounded_max() {
        let config = Erle {
            onset_detection: false,
            ..Erle::default()
        };
        let mut estimator = SubbandErleEstimator::new(&config);
        let (x2, y2, e2) = spectra(5.0e8, 9.0, 100.0);
        for _ in 0..2000 {
            estimator.update(&x2, &y2, &e2, true);
        }
        let erle = estimator.erle(false);
        let max_erle = max_erle_bands(&config);
        for k in 1..FFT_LENGTH_BY_2 {
            assert!((erle[k] - max_erle[k]).abs() < 1e-3, "bin {k}: {}", erle[k]);
        }
        assert!(estimator.erle_unbounded[10] > 50.0);
    }

    #[test]
    fn unconverged_filter_teaches_nothing() {
        let mut estimator = SubbandErleEstimator::new(&Erle::default());
        let (x2, y2, e2) = spectra(5.0e8, 9.0, 10.0);
        for _ in 0..100 {
            estimator.update(&x2, &y2, &e2, false);
        }
        assert!(estimator.erle(false).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn onset_compensation_decays_after_render_pause() {
        let mut estimator = SubbandErleEstimator::new(&Erle::default());
        let (x2, y2, e2) = spectra(5.0e8, 9.0, 10.0);
        for _ in 0..600 {
            estimator.update(&x2, &y2, &e2, true);
        }
        assert!(estimator.erle(true)[5] > 3.9);
        let silent = [0.0; FFT_LENGTH_BY_2_PLUS_1];
        for _ in 0..400 {
            estimator.update(&silent, &silent, &silent, false);
        }
        assert!(estimator.erle(true)[5] < 1.01, "{}", estimator.erle(true)[5]);
        assert!(estimator.erle(false)[5] > 3.9);
    }

    #[test]
    fn reset_restores_min() {
        let mut estimator = SubbandErleEstimator::new(&Erle::default());
        let (x2, y2, e2) = spectra(5.0e8, 9.0, 10.0);
        for _ in 0..100 {
            estimator.update(&x2, &y2, &e2, true);
        }
        estimator.reset();
        assert!(estimator.erle(false).iter().all(|&v| v == 1.0));
    }
}
