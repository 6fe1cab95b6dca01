//! Per-bin residual echo suppression gain.

use crate::common::{FFT_LENGTH_BY_2_PLUS_1, Spectrum};
use crate::config::Suppressor;

/// Below this error power per bin the gain is left open.
const SILENT_BIN_POWER: f32 = 1.0;
/// Floor used as the base of the gain increase limit, so that a fully
/// closed bin can reopen.
const MIN_INCREASE_BASE: f32 = 0.001;

#[derive(Debug)]
pub(crate) struct SuppressionGain {
    config: Suppressor,
    gain: Spectrum,
}

impl SuppressionGain {
    pub(crate) fn new(config: &Suppressor) -> Self {
        Self {
            config: config.clone(),
            gain: [1.0; FFT_LENGTH_BY_2_PLUS_1],
        }
    }

    /// Wiener-like gain `(E2 - od * R2) / E2`, bounded below by the
    /// configured minimum and in its rate of increase.
    pub(crate) fn compute(&mut self, e2: &Spectrum, r2: &Spectrum, nearend: bool) -> &Spectrum {
        let overdrive = if nearend {
            self.config.nearend_overdrive
        } else {
            self.config.overdrive
        };
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            let target = if e2[k] < SILENT_BIN_POWER {
                1.0
            } else {
                ((e2[k] - overdrive * r2[k]) / e2[k]).clamp(self.config.min_gain, 1.0)
            };
            let ceiling = self.gain[k].max(MIN_INCREASE_BASE) * self.config.max_inc_factor;
            self.gain[k] = target.min(ceiling).max(self.config.min_gain);
        }
        &self.gain
    }
}
