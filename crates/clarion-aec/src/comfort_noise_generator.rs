//! Comfort noise matching the capture background spectrum.

use std::f32::consts::SQRT_2;

use clarion_simd::SimdBackend;

use crate::common::{FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_PLUS_1, Spectrum};
use crate::config::ComfortNoise;
use crate::fft_data::FftData;

/// `sqrt(2) * sin(2 * pi * i / 32)`.
const SQRT2_SIN: [f32; 32] = [
    0.0000000, 0.2758994, 0.5411961, 0.7856950, 1.0000000, 1.1758756, 1.3065630, 1.3870398, SQRT_2,
    1.3870398, 1.3065630, 1.1758756, 1.0000000, 0.7856950, 0.5411961, 0.2758994, 0.0000000,
    -0.2758994, -0.5411961, -0.7856950, -1.0000000, -1.1758756, -1.3065630, -1.3870398, -SQRT_2,
    -1.3870398, -1.3065630, -1.1758756, -1.0000000, -0.7856950, -0.5411961, -0.2758994,
];

const INITIAL_BLOCKS: usize = 1000;
const SMOOTHING_DELAY_BLOCKS: usize = 50;

/// Power per bin of white noise at `noise_floor_dbfs`.
fn noise_floor_factor(noise_floor_dbfs: f32) -> f32 {
    // 20 * log10(32768)
    const DBFS_NORMALIZATION: f32 = 90.308_99;
    64.0 * 10.0f32.powf((DBFS_NORMALIZATION + noise_floor_dbfs) * 0.1)
}

#[derive(Debug)]
pub(crate) struct ComfortNoiseGenerator {
    backend: SimdBackend,
    seed: u32,
    noise_floor: f32,
    /// Fast-rising estimate used until the slow one has settled.
    n2_initial: Option<Spectrum>,
    y2_smoothed: Spectrum,
    n2: Spectrum,
    blocks: usize,
}

impl ComfortNoiseGenerator {
    pub(crate) fn new(config: &ComfortNoise, backend: SimdBackend) -> Self {
        Self {
            backend,
            seed: 42,
            noise_floor: noise_floor_factor(config.noise_floor_dbfs),
            n2_initial: Some([0.0; FFT_LENGTH_BY_2_PLUS_1]),
            y2_smoothed: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            n2: [1.0e6; FFT_LENGTH_BY_2_PLUS_1],
            blocks: 0,
        }
    }

    /// Tracks the capture spectrum `y2` and writes a random-phase noise
    /// spectrum shaped like the background into `noise`.
    ///
    /// The minimum tracker follows `y2`, so under a long stretch of echo it
    /// creeps towards the echo level. The level per bin is capped at the
    /// residual error `e2` so the noise never exceeds what the linear filter
    /// left behind.
    pub(crate) fn compute(
        &mut self,
        saturated_capture: bool,
        y2: &Spectrum,
        e2: &Spectrum,
        noise: &mut FftData,
    ) {
        if !saturated_capture {
            self.track(y2);
        }
        let n2 = self.n2_initial.as_ref().unwrap_or(&self.n2);
        let mut n = *n2;
        for (n, &e) in n.iter_mut().zip(e2) {
            *n = n.min(e);
        }
        self.backend.elementwise_sqrt(&mut n);

        noise.re[0] = 0.0;
        noise.im[0] = 0.0;
        noise.re[FFT_LENGTH_BY_2] = 0.0;
        noise.im[FFT_LENGTH_BY_2] = 0.0;
        for k in 1..FFT_LENGTH_BY_2 {
            // 31-bit LCG, top five bits pick the phase.
            self.seed = self.seed.wrapping_mul(69069).wrapping_add(1) & 0x7fff_ffff;
            let i = (self.seed >> 26) as usize;
            noise.re[k] = n[k] * SQRT2_SIN[i];
            noise.im[k] = n[k] * SQRT2_SIN[(i + 8) & 31];
        }
    }

    fn track(&mut self, y2: &Spectrum) {
        for (smoothed, &y) in self.y2_smoothed.iter_mut().zip(y2) {
            *smoothed += 0.1 * (y - *smoothed);
        }
        if self.blocks > SMOOTHING_DELAY_BLOCKS {
            for (n, &y) in self.n2.iter_mut().zip(&self.y2_smoothed) {
                *n = if y < *n { (0.9 * y + 0.1 * *n) * 1.0002 } else { *n * 1.0002 };
            }
        }
        self.blocks += 1;
        if self.blocks == INITIAL_BLOCKS {
            self.n2_initial = None;
        }
        if let Some(initial) = self.n2_initial.as_mut() {
            for (i, &n) in initial.iter_mut().zip(&self.n2) {
                *i = if n > *i { *i + 0.001 * (n - *i) } else { n };
            }
            for i in initial.iter_mut() {
                *i = i.max(self.noise_floor);
            }
        }
        for n in &mut self.n2 {
            *n = n.max(self.noise_floor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mean_power(noise: &FftData) -> f32 {
        let mut n2 = [0.0; FFT_LENGTH_BY_2_PLUS_1];
        noise.spectrum(&mut n2);
        n2[1..FFT_LENGTH_BY_2].iter().sum::<f32>() / (FFT_LENGTH_BY_2 - 1) as f32
    }

    #[test]
    fn settles_at_twice_the_background_power() {
        let mut cng = ComfortNoiseGenerator::new(&ComfortNoise::default(), clarion_simd::detect_backend());
        let y2 = [1.0e6; FFT_LENGTH_BY_2_PLUS_1];
        let mut noise = FftData::default();
        cng.compute(false, &y2, &y2, &mut noise);
        assert!(mean_power(&noise) > 0.0);
        for _ in 0..10_000 {
            cng.compute(false, &y2, &y2, &mut noise);
        }
        let power = mean_power(&noise);
        assert!((power - 2.0e6).abs() < 1.0e5, "power {power}");
        assert_eq!(noise.re[0], 0.0);
    }

    #[test]
    fn never_drops_below_noise_floor() {
        let config = ComfortNoise::default();
        let mut cng = ComfortNoiseGenerator::new(&config, SimdBackend::Scalar);
        let mut noise = FftData::default();
        for _ in 0..2000 {
            let silence = [0.0; FFT_LENGTH_BY_2_PLUS_1];
            cng.compute(false, &silence, &silence, &mut noise);
        }
        let floor = noise_floor_factor(config.noise_floor_dbfs);
        assert!(cng.n2.iter().all(|&n| n >= floor));
    }

    #[test]
    fn noise_stays_below_the_residual_error() {
        let mut cng = ComfortNoiseGenerator::new(&ComfortNoise::default(), SimdBackend::Scalar);
        let y2 = [1.0e6; FFT_LENGTH_BY_2_PLUS_1];
        let mut noise = FftData::default();
        for _ in 0..2000 {
            cng.compute(false, &y2, &y2, &mut noise);
        }
        // A well-cancelled block leaves far less than the tracked background.
        let e2 = [1.0e3; FFT_LENGTH_BY_2_PLUS_1];
        cng.compute(false, &y2, &e2, &mut noise);
        let mut n2 = [0.0; FFT_LENGTH_BY_2_PLUS_1];
        noise.spectrum(&mut n2);
        // Random phase spreads power unevenly over re and im, at most 2x.
        assert!(n2[1..FFT_LENGTH_BY_2].iter().all(|&p| p <= 2.0 * 1.0e3 + 1.0), "{n2:?}");
        assert!(cng.n2[1] > 1.0e5);
    }
}
