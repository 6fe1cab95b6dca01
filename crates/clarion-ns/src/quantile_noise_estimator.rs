//! Log-domain quantile tracking of the noise floor.
//!
//! Three staggered trackers follow the 25th percentile of each bin's log
//! magnitude. Each restarts every [`LONG_STARTUP_PHASE_BLOCKS`] frames so
//! that one of them always holds a recent, well-converged estimate.

use crate::config::LONG_STARTUP_PHASE_BLOCKS;

const SIMULT: usize = 3;
const QUANTILE: f32 = 0.25;
const DENSITY_WIDTH: f32 = 0.01;

#[derive(Debug)]
pub(crate) struct QuantileNoiseEstimator {
    num_bins: usize,
    density: Vec<f32>,
    log_quantile: Vec<f32>,
    quantile: Vec<f32>,
    log_spectrum: Vec<f32>,
    counter: [usize; SIMULT],
    num_updates: usize,
}

impl QuantileNoiseEstimator {
    pub(crate) fn new(num_bins: usize) -> Self {
        let mut counter = [0; SIMULT];
        for (i, c) in counter.iter_mut().enumerate() {
            *c = LONG_STARTUP_PHASE_BLOCKS * (i + 1) / SIMULT;
        }
        Self {
            num_bins,
            density: vec![0.3; SIMULT * num_bins],
            log_quantile: vec![8.0; SIMULT * num_bins],
            quantile: vec![0.0; num_bins],
            log_spectrum: vec![0.0; num_bins],
            counter,
            num_updates: 1,
        }
    }

    /// Updates the trackers with a magnitude spectrum and writes the
    /// current estimate to `noise_spectrum`.
    pub(crate) fn estimate(&mut self, signal_spectrum: &[f32], noise_spectrum: &mut [f32]) {
        let bins = self.num_bins;
        for (l, &s) in self.log_spectrum.iter_mut().zip(signal_spectrum) {
            *l = s.max(1e-10).ln();
        }

        for s in 0..SIMULT {
            let k = s * bins;
            let one_by_counter_plus_1 = 1.0 / (self.counter[s] as f32 + 1.0);
            for i in 0..bins {
                let log_s = self.log_spectrum[i];
                let j = k + i;
                let delta = if self.density[j] > 1.0 {
                    40.0 / self.density[j]
                } else {
                    40.0
                };
                let multiplier = delta * one_by_counter_plus_1;
                if log_s > self.log_quantile[j] {
                    self.log_quantile[j] += QUANTILE * multiplier;
                } else {
                    self.log_quantile[j] -= (1.0 - QUANTILE) * multiplier;
                }
                if (log_s - self.log_quantile[j]).abs() < DENSITY_WIDTH {
                    self.density[j] = (self.counter[s] as f32 * self.density[j]
                        + 1.0 / (2.0 * DENSITY_WIDTH))
                        * one_by_counter_plus_1;
                }
            }

            if self.counter[s] >= LONG_STARTUP_PHASE_BLOCKS {
                self.counter[s] = 0;
                if self.num_updates >= LONG_STARTUP_PHASE_BLOCKS {
                    for (q, &lq) in self.quantile.iter_mut().zip(&self.log_quantile[k..k + bins]) {
                        *q = lq.exp();
                    }
                }
            }
            self.counter[s] += 1;
        }

        // Use the most advanced tracker until they have all wrapped once.
        if self.num_updates < LONG_STARTUP_PHASE_BLOCKS {
            let k = (SIMULT - 1) * bins;
            for (q, &lq) in self.quantile.iter_mut().zip(&self.log_quantile[k..k + bins]) {
                *q = lq.exp();
            }
            self.num_updates += 1;
        }

        noise_spectrum.copy_from_slice(&self.quantile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_towards_stationary_level() {
        let mut est = QuantileNoiseEstimator::new(65);
        let signal = vec![1000.0f32; 65];
        let mut noise = vec![0.0f32; 65];
        for _ in 0..400 {
            est.estimate(&signal, &mut noise);
        }
        for &n in &noise {
            assert!((n / 1000.0 - 1.0).abs() < 0.2, "noise {n}");
        }
    }

    #[test]
    fn tracks_lower_quantile_of_fluctuating_input() {
        let mut est = QuantileNoiseEstimator::new(9);
        let mut noise = vec![0.0f32; 9];
        for frame in 0..600 {
            // Mostly 100, every fourth frame a burst of 10000.
            let level = if frame % 4 == 0 { 10000.0 } else { 100.0 };
            est.estimate(&vec![level; 9], &mut noise);
        }
        for &n in &noise {
            assert!(n < 1000.0, "quantile {n} follows the bursts");
            assert!(n > 30.0, "quantile {n} too low");
        }
    }
}
