//! Render-to-capture delay estimation.
//!
//! Both signals are low-passed and decimated to about 4 kHz. A single
//! NLMS matched filter spanning the maximum delay predicts the capture
//! from the render history; the position of its dominant tap is the lag.
//! A lag is reported once it has been seen for `hysteresis_blocks`
//! consecutive blocks.

use clarion_common_audio::cascaded_biquad_filter::{BiQuadCoefficients, CascadedBiQuadFilter};
use clarion_simd::SimdBackend;

use crate::common::{BLOCK_SIZE, Block};
use crate::config::Delay;

const DECIMATED_RATE_HZ: u32 = 4000;
const ANTI_ALIAS_CUTOFF_HZ: f32 = 1800.0;
/// Mean square render level, float S16, below which the filter is frozen.
const RENDER_POWER_GATE: f32 = 100.0;
const REGULARIZATION: f32 = 1.0;

#[derive(derive_more::Debug)]
pub(crate) struct DelayEstimator {
    backend: SimdBackend,
    down_sampling_factor: usize,
    #[debug(skip)]
    render_filter: CascadedBiQuadFilter,
    #[debug(skip)]
    capture_filter: CascadedBiQuadFilter,
    phase: usize,
    /// Mirrored ring of decimated render samples, `2 * taps` long.
    #[debug(skip)]
    render_history: Vec<f32>,
    write: usize,
    render_energy: f32,
    #[debug(skip)]
    taps: Vec<f32>,
    #[debug(skip)]
    render_scratch: Block,
    #[debug(skip)]
    capture_scratch: Block,
    step_size: f32,
    peak_ratio_threshold: f32,
    hysteresis_blocks: usize,
    candidate: Option<usize>,
    candidate_blocks: usize,
    estimate: Option<usize>,
}

impl DelayEstimator {
    pub(crate) fn new(config: &Delay, sample_rate_hz: u32, backend: SimdBackend) -> Self {
        let down_sampling_factor = (sample_rate_hz / DECIMATED_RATE_HZ).max(1) as usize;
        let num_taps = (config.max_delay_ms * DECIMATED_RATE_HZ as usize / 1000).max(1);
        let low_pass = BiQuadCoefficients::butterworth_low_pass(
            ANTI_ALIAS_CUTOFF_HZ.min(sample_rate_hz as f32 * 0.45),
            sample_rate_hz,
        );
        Self {
            backend,
            down_sampling_factor,
            render_filter: CascadedBiQuadFilter::with_sections(low_pass, 2),
            capture_filter: CascadedBiQuadFilter::with_sections(low_pass, 2),
            phase: 0,
            render_history: vec![0.0; 2 * num_taps],
            write: 0,
            render_energy: 0.0,
            taps: vec![0.0; num_taps],
            render_scratch: [0.0; BLOCK_SIZE],
            capture_scratch: [0.0; BLOCK_SIZE],
            step_size: config.step_size,
            peak_ratio_threshold: config.peak_ratio_threshold,
            hysteresis_blocks: config.hysteresis_blocks,
            candidate: None,
            candidate_blocks: 0,
            estimate: None,
        }
    }

    /// Last reported delay in samples at the full rate.
    pub(crate) fn estimate(&self) -> Option<usize> {
        self.estimate
    }

    /// Feeds one aligned pair of blocks. Returns the current estimate.
    pub(crate) fn update(&mut self, render: &Block, capture: &Block) -> Option<usize> {
        self.render_scratch = *render;
        self.capture_scratch = *capture;
        self.render_filter.process_in_place(&mut self.render_scratch);
        self.capture_filter.process_in_place(&mut self.capture_scratch);

        let num_taps = self.taps.len();
        let gate = RENDER_POWER_GATE * num_taps as f32;
        let mut adapted = false;
        for i in 0..BLOCK_SIZE {
            let phase = self.phase;
            self.phase = (self.phase + 1) % self.down_sampling_factor;
            if phase != 0 {
                continue;
            }
            let x = self.render_scratch[i];
            let removed = self.render_history[self.write];
            self.render_history[self.write] = x;
            self.render_history[self.write + num_taps] = x;
            self.render_energy = (self.render_energy + x * x - removed * removed).max(0.0);
            let window = &self.render_history[self.write + 1..=self.write + num_taps];
            self.write = (self.write + 1) % num_taps;

            if self.render_energy < gate {
                continue;
            }
            let error = self.capture_scratch[i] - self.backend.dot_product(&self.taps, window);
            let scale = self.step_size * error / (self.render_energy + REGULARIZATION);
            for (h, &xv) in self.taps.iter_mut().zip(window) {
                *h += scale * xv;
            }
            adapted = true;
        }
        // Bound the drift of the running sum.
        self.render_energy = self.backend.energy(&self.render_history[..num_taps]);

        if adapted {
            self.detect_lag();
        }
        self.estimate
    }

    fn detect_lag(&mut self) {
        let (peak_index, peak) = self
            .taps
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, &h)| if h.abs() > best.1 { (i, h.abs()) } else { best });
        let total = self.backend.energy(&self.taps);
        if total <= 0.0 || peak * peak / total < self.peak_ratio_threshold {
            self.candidate_blocks = 0;
            return;
        }
        let lag = (self.taps.len() - 1 - peak_index) * self.down_sampling_factor;
        if self.candidate == Some(lag) {
            self.candidate_blocks += 1;
        } else {
            self.candidate = Some(lag);
            self.candidate_blocks = 1;
        }
        if self.candidate_blocks >= self.hysteresis_blocks && self.estimate != Some(lag) {
            tracing::debug!(delay_samples = lag, previous = ?self.estimate, "echo delay estimate changed");
            self.estimate = Some(lag);
        }
    }
}
