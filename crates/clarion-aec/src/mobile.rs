//! Low-cost canceller for mobile mode.
//!
//! A time-domain NLMS filter runs sample by sample over the aligned render
//! history. A Geigel detector freezes adaptation while the capture peak is
//! too loud to be echo, and a block-level nonlinear processor attenuates
//! what the filter leaves behind.

use std::collections::VecDeque;

use clarion_simd::SimdBackend;

use crate::common::{BLOCK_SIZE, Block, power};
use crate::config::{Filter, Mobile};

/// Mean square render level, float S16, below which nothing is adapted.
const RENDER_POWER_GATE: f32 = 100.0;
const REGULARIZATION_PER_TAP: f32 = 1.0;
const MAX_ERLE: f32 = 1000.0;

/// Summary of one processed block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MobileBlock {
    pub(crate) divergent: bool,
}

#[derive(derive_more::Debug)]
pub(crate) struct MobileCanceller {
    backend: SimdBackend,
    #[debug(skip)]
    taps: Vec<f32>,
    /// Mirrored ring of render samples, `2 * taps` long.
    #[debug(skip)]
    history: Vec<f32>,
    write: usize,
    render_energy: f32,
    step_size: f32,
    geigel_threshold: f32,
    hangover_blocks: usize,
    hangover: usize,
    render_peaks: VecDeque<f32>,
    divergence_factor: f32,
    divergence_blocks: usize,
    divergent_run: usize,
    nlp_min_gain: f32,
    comfort_noise: bool,
    capture_smoothed: f32,
    error_smoothed: f32,
    nlp_gain: f32,
    noise_power: f32,
    seed: u32,
}

impl MobileCanceller {
    pub(crate) fn new(config: &Mobile, filter: &Filter, sample_rate_hz: u32, backend: SimdBackend) -> Self {
        let num_taps = (config.filter_length_ms * sample_rate_hz as usize / 1000).max(1);
        Self {
            backend,
            taps: vec![0.0; num_taps],
            history: vec![0.0; 2 * num_taps],
            write: 0,
            render_energy: 0.0,
            step_size: config.step_size,
            geigel_threshold: config.geigel_threshold,
            hangover_blocks: config.hangover_blocks,
            hangover: 0,
            render_peaks: VecDeque::from(vec![0.0; num_taps.div_ceil(BLOCK_SIZE) + 1]),
            divergence_factor: filter.divergence_factor,
            divergence_blocks: filter.divergence_blocks,
            divergent_run: 0,
            nlp_min_gain: config.nlp_min_gain,
            comfort_noise: config.comfort_noise,
            capture_smoothed: 0.0,
            error_smoothed: 0.0,
            nlp_gain: 1.0,
            noise_power: 1.0,
            seed: 0x1234_5678,
        }
    }

    /// Clears the echo path model, keeping the render history.
    pub(crate) fn reset_filter(&mut self) {
        self.taps.fill(0.0);
        self.capture_smoothed = 0.0;
        self.error_smoothed = 0.0;
        self.divergent_run = 0;
    }

    /// Sum of squared taps.
    pub(crate) fn energy(&self) -> f32 {
        self.backend.energy(&self.taps)
    }

    pub(crate) fn process(
        &mut self,
        render: &Block,
        capture: &Block,
        linear: &mut Block,
        output: &mut Block,
    ) -> MobileBlock {
        let render_peak = render.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        self.render_peaks.pop_front();
        self.render_peaks.push_back(render_peak);
        let max_render_peak = self.render_peaks.iter().fold(0.0f32, |m, &x| m.max(x));
        let capture_peak = capture.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        if capture_peak > self.geigel_threshold * max_render_peak {
            self.hangover = self.hangover_blocks;
        } else {
            self.hangover = self.hangover.saturating_sub(1);
        }
        let double_talk = self.hangover > 0;

        let num_taps = self.taps.len();
        let gate = RENDER_POWER_GATE * num_taps as f32;
        let mut echo_power = 0.0;
        for i in 0..BLOCK_SIZE {
            let x = render[i];
            let removed = self.history[self.write];
            self.history[self.write] = x;
            self.history[self.write + num_taps] = x;
            self.render_energy = (self.render_energy + x * x - removed * removed).max(0.0);
            let window = &self.history[self.write + 1..=self.write + num_taps];
            self.write = (self.write + 1) % num_taps;

            let echo = self.backend.dot_product(&self.taps, window);
            echo_power += echo * echo;
            let e = capture[i] - echo;
            linear[i] = e;
            if !double_talk && self.render_energy > gate {
                let scale = self.step_size * e
                    / (self.render_energy + REGULARIZATION_PER_TAP * num_taps as f32);
                for (h, &xv) in self.taps.iter_mut().zip(window) {
                    *h += scale * xv;
                }
            }
        }
        self.render_energy = self.backend.energy(&self.history[..num_taps]);

        let capture_power = power(capture);
        let mut error_power = power(linear);
        let divergent = error_power > capture_power * self.divergence_factor
            && error_power > BLOCK_SIZE as f32 * RENDER_POWER_GATE;
        if divergent {
            self.divergent_run += 1;
            if self.divergent_run >= self.divergence_blocks {
                tracing::warn!(blocks = self.divergent_run, "mobile echo filter diverged, resetting");
                self.reset_filter();
            }
        } else {
            self.divergent_run = 0;
        }
        if error_power > capture_power {
            linear.copy_from_slice(capture);
            error_power = capture_power;
        }

        let render_active = self.render_energy > gate;
        self.nonlinear_processing(
            render_active,
            double_talk,
            capture_power / BLOCK_SIZE as f32,
            error_power / BLOCK_SIZE as f32,
            echo_power / BLOCK_SIZE as f32,
        );

        let noise_level = (self.noise_power * 3.0).sqrt() * (1.0 - self.nlp_gain);
        for (out, &e) in output.iter_mut().zip(linear.iter()) {
            let mut y = e * self.nlp_gain;
            if self.comfort_noise {
                y += noise_level * self.next_uniform();
            }
            *out = y.clamp(-32768.0, 32767.0);
        }
        MobileBlock { divergent }
    }

    fn nonlinear_processing(
        &mut self,
        render_active: bool,
        double_talk: bool,
        capture_power: f32,
        error_power: f32,
        echo_power: f32,
    ) {
        if render_active && !double_talk {
            self.capture_smoothed += 0.1 * (capture_power - self.capture_smoothed);
            self.error_smoothed += 0.1 * (error_power - self.error_smoothed);
        }
        if error_power < self.noise_power {
            self.noise_power = error_power.max(1.0);
        } else {
            self.noise_power *= 1.002;
        }

        let target = if !render_active || error_power < 1.0 {
            1.0
        } else {
            let erle = (self.capture_smoothed / (self.error_smoothed + 1.0)).clamp(1.0, MAX_ERLE);
            let overdrive = if double_talk { 1.0 } else { 2.0 };
            let residual = echo_power / erle;
            ((error_power - overdrive * residual) / error_power).clamp(self.nlp_min_gain, 1.0)
        };
        self.nlp_gain = if target < self.nlp_gain {
            target
        } else {
            self.nlp_gain + 0.2 * (target - self.nlp_gain)
        };
    }

    fn next_uniform(&mut self) -> f32 {
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.seed >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lcg(u32);

    impl Lcg {
        fn next(&mut self) -> f32 {
            self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12345);
            (self.0 >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0
        }
    }

    fn canceller() -> MobileCanceller {
        MobileCanceller::new(&Mobile::default(), &Filter::default(), 16000, clarion_simd::detect_backend())
    }

    #[test]
    fn cancels_attenuated_echo() {
        let mut aec = canceller();
        let mut noise = Lcg(5);
        let mut history = vec![0.0f32; 64];
        let (mut capture_energy, mut linear_energy) = (0.0, 0.0);
        for n in 0..500 {
            let mut x = [0.0; BLOCK_SIZE];
            for s in &mut x {
                *s = 5000.0 * noise.next();
            }
            history.extend_from_slice(&x);
            let start = history.len() - BLOCK_SIZE;
            let mut y = [0.0; BLOCK_SIZE];
            for (i, s) in y.iter_mut().enumerate() {
                *s = 0.5 * history[start + i - 40];
            }
            let (mut linear, mut out) = ([0.0; BLOCK_SIZE], [0.0; BLOCK_SIZE]);
            aec.process(&x, &y, &mut linear, &mut out);
            if n >= 400 {
                capture_energy += power(&y);
                linear_energy += power(&linear);
            }
        }
        assert!(linear_energy < capture_energy * 0.01, "{linear_energy} vs {capture_energy}");
        assert!(aec.energy() > 0.2 && aec.energy() < 0.3, "energy {}", aec.energy());
    }

    #[test]
    fn loud_nearend_freezes_adaptation() {
        let mut aec = canceller();
        let mut noise = Lcg(8);
        for _ in 0..50 {
            let mut x = [0.0; BLOCK_SIZE];
            let mut y = [0.0; BLOCK_SIZE];
            for (xs, ys) in x.iter_mut().zip(y.iter_mut()) {
                *xs = 1000.0 * noise.next();
                *ys = 8000.0 * noise.next();
            }
            let (mut linear, mut out) = ([0.0; BLOCK_SIZE], [0.0; BLOCK_SIZE]);
            aec.process(&x, &y, &mut linear, &mut out);
        }
        assert_eq!(aec.energy(), 0.0);
    }

    #[test]
    fn silence_stays_finite() {
        let mut aec = canceller();
        let (mut linear, mut out) = ([0.0; BLOCK_SIZE], [0.0; BLOCK_SIZE]);
        for _ in 0..100 {
            aec.process(&[0.0; BLOCK_SIZE], &[0.0; BLOCK_SIZE], &mut linear, &mut out);
        }
        assert!(out.iter().all(|x| x.is_finite() && x.abs() < 10.0));
    }
}
