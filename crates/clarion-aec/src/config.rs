//! Echo canceller tuning.
//!
//! The defaults suit a typical laptop or handset with up to 400 ms of
//! render-to-capture delay. Use [`validate`](EchoCancellerConfig::validate)
//! before handing a hand-edited config to the canceller.

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EchoCancellerConfig {
    pub filter: Filter,
    pub delay: Delay,
    pub erle: Erle,
    pub double_talk: DoubleTalk,
    pub suppressor: Suppressor,
    pub comfort_noise: ComfortNoise,
    pub mobile: Mobile,
}

impl EchoCancellerConfig {
    /// Clamps every parameter to a usable range. Returns true if anything
    /// changed.
    pub fn validate(&mut self) -> bool {
        let mut changed = false;

        changed |= limit_usize(&mut self.filter.length_ms, 4, 500);
        changed |= limit_f32(&mut self.filter.step_size, 0.001, 1.0);
        changed |= limit_f32(&mut self.filter.leakage, 0.0, 0.1);
        changed |= limit_f32(&mut self.filter.regularization, 0.0, 1.0e12);
        changed |= limit_f32(&mut self.filter.noise_gate, 0.0, 1.0e12);
        changed |= limit_f32(&mut self.filter.max_energy, 1.0, 1.0e6);
        changed |= limit_f32(&mut self.filter.divergence_factor, 1.0, 100.0);
        changed |= limit_usize(&mut self.filter.divergence_blocks, 1, 10_000);

        changed |= limit_usize(&mut self.delay.max_delay_ms, 10, 1000);
        changed |= limit_usize(&mut self.delay.headroom_samples, 0, 256);
        changed |= limit_usize(&mut self.delay.hysteresis_blocks, 1, 1000);
        changed |= limit_f32(&mut self.delay.step_size, 0.001, 1.0);
        changed |= limit_f32(&mut self.delay.peak_ratio_threshold, 0.0, 1.0);

        changed |= limit_f32(&mut self.erle.min, 1.0, 100_000.0);
        changed |= limit_f32(&mut self.erle.max_l, 1.0, 100_000.0);
        changed |= limit_f32(&mut self.erle.max_h, 1.0, 100_000.0);
        if self.erle.min > self.erle.max_l || self.erle.min > self.erle.max_h {
            self.erle.min = self.erle.max_l.min(self.erle.max_h);
            changed = true;
        }

        changed |= limit_f32(&mut self.double_talk.nearend_ratio, 1.0, 1000.0);
        changed |= limit_usize(&mut self.double_talk.hangover_blocks, 0, 1000);

        changed |= limit_f32(&mut self.suppressor.overdrive, 0.1, 100.0);
        changed |= limit_f32(&mut self.suppressor.nearend_overdrive, 0.1, 100.0);
        changed |= limit_f32(&mut self.suppressor.min_gain, 0.0, 1.0);
        changed |= limit_f32(&mut self.suppressor.max_inc_factor, 1.0, 100.0);
        changed |= limit_f32(&mut self.suppressor.default_echo_path_gain, 0.0, 100.0);

        changed |= limit_f32(&mut self.comfort_noise.noise_floor_dbfs, -200.0, 0.0);

        changed |= limit_usize(&mut self.mobile.filter_length_ms, 2, 128);
        changed |= limit_f32(&mut self.mobile.step_size, 0.001, 1.0);
        changed |= limit_f32(&mut self.mobile.geigel_threshold, 0.1, 10.0);
        changed |= limit_usize(&mut self.mobile.hangover_blocks, 0, 1000);
        changed |= limit_f32(&mut self.mobile.nlp_min_gain, 0.0, 1.0);

        changed
    }
}

/// Linear adaptive filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Echo tail covered by the filter after the delay.
    pub length_ms: usize,
    /// NLMS step size.
    pub step_size: f32,
    /// Fractional coefficient decay per adapted block.
    pub leakage: f32,
    /// Added to the render power before normalizing the update.
    pub regularization: f32,
    /// Mean render power per bin below which the filter does not adapt.
    pub noise_gate: f32,
    /// Bound on the filter's time-domain energy. A unit impulse is 1.
    pub max_energy: f32,
    /// Error power above `divergence_factor` times the capture power marks
    /// a divergent block.
    pub divergence_factor: f32,
    /// Consecutive divergent blocks before the filter is reset.
    pub divergence_blocks: usize,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            length_ms: 48,
            step_size: 0.5,
            leakage: 1.0e-4,
            regularization: 1.0e3,
            noise_gate: 2.0e7,
            max_energy: 100.0,
            divergence_factor: 1.5,
            divergence_blocks: 25,
        }
    }
}

/// Render-to-capture delay estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct Delay {
    pub max_delay_ms: usize,
    /// Samples the filter is placed before the estimated delay.
    pub headroom_samples: usize,
    /// Blocks a new lag must persist before it is reported.
    pub hysteresis_blocks: usize,
    /// Matched filter NLMS step size.
    pub step_size: f32,
    /// Minimum share of the filter energy in the peak tap.
    pub peak_ratio_threshold: f32,
}

impl Default for Delay {
    fn default() -> Self {
        Self {
            max_delay_ms: 400,
            headroom_samples: 32,
            hysteresis_blocks: 10,
            step_size: 0.7,
            peak_ratio_threshold: 0.3,
        }
    }
}

/// Echo return loss enhancement bounds, linear power ratios.
#[derive(Debug, Clone, PartialEq)]
pub struct Erle {
    pub min: f32,
    /// Upper bound in the lower half of the spectrum.
    pub max_l: f32,
    /// Upper bound in the upper half of the spectrum.
    pub max_h: f32,
    pub onset_detection: bool,
}

impl Default for Erle {
    fn default() -> Self {
        Self {
            min: 1.0,
            max_l: 4.0,
            max_h: 1.5,
            onset_detection: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoubleTalk {
    /// Error power above `nearend_ratio` times the residual echo estimate
    /// counts as near-end activity once the filter has converged.
    pub nearend_ratio: f32,
    pub hangover_blocks: usize,
}

impl Default for DoubleTalk {
    fn default() -> Self {
        Self {
            nearend_ratio: 4.0,
            hangover_blocks: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suppressor {
    /// Residual echo overestimation during far-end activity.
    pub overdrive: f32,
    /// Overestimation while the near end is talking.
    pub nearend_overdrive: f32,
    pub min_gain: f32,
    /// Per-block bound on gain increase.
    pub max_inc_factor: f32,
    /// Echo path gain assumed before the linear filter is usable.
    pub default_echo_path_gain: f32,
}

impl Default for Suppressor {
    fn default() -> Self {
        Self {
            overdrive: 2.0,
            nearend_overdrive: 1.0,
            min_gain: 0.0,
            max_inc_factor: 2.0,
            default_echo_path_gain: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComfortNoise {
    pub noise_floor_dbfs: f32,
}

impl Default for ComfortNoise {
    fn default() -> Self {
        Self {
            noise_floor_dbfs: -96.03406,
        }
    }
}

/// Low-cost variant used in mobile mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Mobile {
    pub filter_length_ms: usize,
    pub step_size: f32,
    /// Capture peak above this fraction of the render peak is double talk.
    pub geigel_threshold: f32,
    pub hangover_blocks: usize,
    /// Strongest attenuation applied by the nonlinear processor.
    pub nlp_min_gain: f32,
    pub comfort_noise: bool,
}

impl Default for Mobile {
    fn default() -> Self {
        Self {
            filter_length_ms: 32,
            step_size: 0.3,
            geigel_threshold: 0.7,
            hangover_blocks: 8,
            nlp_min_gain: 0.05,
            comfort_noise: true,
        }
    }
}

fn limit_f32(value: &mut f32, min: f32, max: f32) -> bool {
    let clamped = value.clamp(min, max);
    let clamped = if clamped.is_finite() { clamped } else { min };
    let changed = *value != clamped;
    *value = clamped;
    changed
}

fn limit_usize(value: &mut usize, min: usize, max: usize) -> bool {
    let clamped = (*value).clamp(min, max);
    let changed = *value != clamped;
    *value = clamped;
    changed
}
